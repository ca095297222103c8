//! Event flags shared by `plan` and `run`

use clap::{Args, ValueEnum};

use gantry_core::domain::event::{EventContext, EventKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EventArg {
    Push,
    Tag,
    PullRequest,
    Cron,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => EventKind::Push,
            EventArg::Tag => EventKind::Tag,
            EventArg::PullRequest => EventKind::PullRequest,
            EventArg::Cron => EventKind::Cron,
        }
    }
}

#[derive(Debug, Args)]
pub struct EventArgs {
    /// Event kind
    #[arg(long, value_enum, default_value = "push")]
    pub event: EventArg,

    /// Branch name
    #[arg(long)]
    pub branch: Option<String>,

    /// Full git ref (derived from --branch when omitted)
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    /// Commit SHA
    #[arg(long, default_value = "0000000000000000000000000000000000000000")]
    pub commit: String,

    /// Commit author
    #[arg(long, default_value = "unknown")]
    pub author: String,

    /// Build number
    #[arg(long, default_value = "1")]
    pub build_number: u64,

    /// Repository as owner/name
    #[arg(long, default_value = "local/local")]
    pub repo: String,

    /// Cron schedule label (cron events only)
    #[arg(long)]
    pub cron: Option<String>,
}

impl EventArgs {
    pub fn to_context(&self) -> EventContext {
        let (owner, name) = self
            .repo
            .split_once('/')
            .unwrap_or((self.repo.as_str(), ""));

        let git_ref = self.git_ref.clone().or_else(|| {
            self.branch
                .as_ref()
                .map(|branch| format!("refs/heads/{}", branch))
        });

        EventContext {
            event: self.event.into(),
            branch: self.branch.clone(),
            git_ref,
            commit_sha: self.commit.clone(),
            author: self.author.clone(),
            build_number: self.build_number,
            repo_owner: owner.to_string(),
            repo_name: name.to_string(),
            cron: self.cron.clone(),
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_derived_from_branch() {
        let args = EventArgs {
            event: EventArg::Push,
            branch: Some("master".to_string()),
            git_ref: None,
            commit: "abc".to_string(),
            author: "alice".to_string(),
            build_number: 5,
            repo: "acme/widget".to_string(),
            cron: None,
        };

        let ctx = args.to_context();
        assert_eq!(ctx.git_ref.as_deref(), Some("refs/heads/master"));
        assert_eq!(ctx.repo_owner, "acme");
        assert_eq!(ctx.repo_name, "widget");
        assert_eq!(ctx.event, EventKind::Push);
    }

    #[test]
    fn test_explicit_ref_wins() {
        let args = EventArgs {
            event: EventArg::Tag,
            branch: None,
            git_ref: Some("refs/tags/v1.0.0".to_string()),
            commit: "abc".to_string(),
            author: "alice".to_string(),
            build_number: 6,
            repo: "acme/widget".to_string(),
            cron: None,
        };

        let ctx = args.to_context();
        assert_eq!(ctx.git_ref.as_deref(), Some("refs/tags/v1.0.0"));
        assert_eq!(ctx.branch, None);
    }
}
