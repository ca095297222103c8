//! Event domain types
//!
//! An [`EventContext`] describes the external occurrence (push, tag,
//! pull request, cron tick) that a scheduling attempt is evaluated against.

use serde::{Deserialize, Serialize};

/// Kind of event that triggered a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    Tag,
    PullRequest,
    Cron,
}

impl EventKind {
    /// Wire name used in trigger/when clauses
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::Tag => "tag",
            EventKind::PullRequest => "pull_request",
            EventKind::Cron => "cron",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate outcome of upstream work, matched by `status` clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failure,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context of one incoming event
///
/// A single `EventContext` is shared by every pipeline evaluated for the
/// event. `status` starts out empty and is filled in when a downstream
/// trigger is re-evaluated against its upstream outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContext {
    pub event: EventKind,
    /// Branch name, absent for tag events
    pub branch: Option<String>,
    /// Full git ref (e.g. "refs/heads/master", "refs/tags/v1.0.0")
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub commit_sha: String,
    pub author: String,
    pub build_number: u64,
    pub repo_owner: String,
    pub repo_name: String,
    /// Cron schedule label, only present for cron events
    pub cron: Option<String>,
    /// Upstream aggregate status, only present during downstream
    /// re-evaluation
    pub status: Option<BuildStatus>,
}

impl EventContext {
    /// Returns a copy of this context carrying the given upstream status
    pub fn with_status(&self, status: BuildStatus) -> Self {
        let mut ctx = self.clone();
        ctx.status = Some(status);
        ctx
    }

    /// "owner/name" form used in notification messages
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}
