//! Message template rendering
//!
//! Templates carry `{{ key }}` placeholders filled from the run and its
//! event context. Unknown keys are an error; known keys with no value for
//! this event (e.g. `commit.branch` on a tag build) render empty.

use gantry_core::domain::event::EventContext;
use gantry_core::domain::run::Run;

use crate::error::NotifyError;

/// Renders a template against a terminal run and its event
pub fn render(template: &str, run: &Run, event: &EventContext) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(NotifyError::Template(
                "unterminated '{{' placeholder".to_string(),
            ));
        };

        let key = after[..end].trim();
        let value = lookup(key, run, event)
            .ok_or_else(|| NotifyError::Template(format!("unknown placeholder '{}'", key)))?;
        out.push_str(&value);

        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn lookup(key: &str, run: &Run, event: &EventContext) -> Option<String> {
    match key {
        "build.status" => Some(run.status.to_string()),
        "build.number" => Some(event.build_number.to_string()),
        "build.event" => Some(event.event.to_string()),
        "pipeline.name" => Some(run.pipeline.clone()),
        "commit.sha" => Some(event.commit_sha.clone()),
        "commit.author" => Some(event.author.clone()),
        "commit.branch" => Some(event.branch.clone().unwrap_or_default()),
        "commit.ref" => Some(event.git_ref.clone().unwrap_or_default()),
        "repo.owner" => Some(event.repo_owner.clone()),
        "repo.name" => Some(event.repo_name.clone()),
        "repo.slug" => Some(event.repo_slug()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::event::EventKind;
    use gantry_core::domain::run::RunStatus;

    fn fixtures() -> (Run, EventContext) {
        let mut run = Run::pending("cargo-test");
        run.status = RunStatus::Failure;

        let event = EventContext {
            event: EventKind::Push,
            branch: Some("master".to_string()),
            git_ref: Some("refs/heads/master".to_string()),
            commit_sha: "deadbeef".to_string(),
            author: "alice".to_string(),
            build_number: 99,
            repo_owner: "acme".to_string(),
            repo_name: "widget".to_string(),
            cron: None,
            status: None,
        };

        (run, event)
    }

    #[test]
    fn test_render_fills_placeholders() {
        let (run, event) = fixtures();
        let message = render(
            "{{ repo.slug }} build {{ build.number }}: {{ pipeline.name }} {{ build.status }}",
            &run,
            &event,
        )
        .unwrap();

        assert_eq!(message, "acme/widget build 99: cargo-test failure");
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let (run, event) = fixtures();
        assert_eq!(render("plain text", &run, &event).unwrap(), "plain text");
    }

    #[test]
    fn test_missing_branch_renders_empty() {
        let (run, mut event) = fixtures();
        event.branch = None;
        assert_eq!(render("[{{ commit.branch }}]", &run, &event).unwrap(), "[]");
    }

    #[test]
    fn test_unknown_placeholder_is_an_error() {
        let (run, event) = fixtures();
        let err = render("{{ no.such.key }}", &run, &event).unwrap_err();
        assert!(matches!(err, NotifyError::Template(_)));
    }

    #[test]
    fn test_unterminated_placeholder_is_an_error() {
        let (run, event) = fixtures();
        assert!(matches!(
            render("oops {{ build.status", &run, &event).unwrap_err(),
            NotifyError::Template(_)
        ));
    }
}
