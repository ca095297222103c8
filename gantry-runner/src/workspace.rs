//! Per-event workspace layout
//!
//! Each event gets one directory tree under the configured base path:
//!
//! ```text
//! <base>/<owner>-<repo>-<build_number>/
//!   <pipeline>/workspace     mounted at /workspace, one per pipeline
//!   volumes/<name>           mounted at /vol/<name>, shared per event
//! ```
//!
//! Named volume directories are shared by every pipeline of the event;
//! ordering between writers comes from `depends_on` sequencing, not from
//! locking here.

use std::path::{Path, PathBuf};

use gantry_core::domain::event::EventContext;

pub struct EventWorkspace {
    root: PathBuf,
}

impl EventWorkspace {
    /// Creates (or reuses) the event's directory tree root
    pub fn new(base: &Path, event: &EventContext) -> std::io::Result<Self> {
        let dir = format!(
            "{}-{}-{}",
            sanitize(&event.repo_owner),
            sanitize(&event.repo_name),
            event.build_number
        );
        let root = base.join(dir);
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory for one pipeline's steps
    pub fn pipeline_dir(&self, pipeline: &str) -> std::io::Result<PathBuf> {
        let dir = self.root.join(sanitize(pipeline)).join("workspace");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Backing directory for a named volume, shared across the event
    pub fn volume_dir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.root.join("volumes").join(sanitize(name));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Restricts names to filesystem- and container-safe characters
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::event::EventKind;

    fn event() -> EventContext {
        EventContext {
            event: EventKind::Push,
            branch: Some("master".to_string()),
            git_ref: Some("refs/heads/master".to_string()),
            commit_sha: "abc123".to_string(),
            author: "alice".to_string(),
            build_number: 42,
            repo_owner: "acme".to_string(),
            repo_name: "widget/extra".to_string(),
            cron: None,
            status: None,
        }
    }

    #[test]
    fn test_layout_and_sanitization() {
        let base = tempfile::tempdir().unwrap();
        let ws = EventWorkspace::new(base.path(), &event()).unwrap();

        assert!(ws.root().ends_with("acme-widget-extra-42"));

        let pipeline = ws.pipeline_dir("cargo-test").unwrap();
        assert!(pipeline.is_dir());
        assert!(pipeline.ends_with("cargo-test/workspace"));

        let volume = ws.volume_dir("rustcache").unwrap();
        assert!(volume.is_dir());
        assert!(volume.ends_with("volumes/rustcache"));
    }

    #[test]
    fn test_volume_dir_is_shared_across_pipelines() {
        let base = tempfile::tempdir().unwrap();
        let ws = EventWorkspace::new(base.path(), &event()).unwrap();

        let first = ws.volume_dir("cache").unwrap();
        let second = ws.volume_dir("cache").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize("refs/heads/master"), "refs-heads-master");
        assert_eq!(sanitize("cargo_test.v2"), "cargo_test.v2");
    }
}
