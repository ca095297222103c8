//! Trigger and `when` clause evaluation
//!
//! Pipelines gate on a `trigger` clause and steps gate on a `when` clause;
//! both share the same [`Conditions`] shape: one optional [`Constraint`]
//! per event dimension, combined with logical AND. Evaluation is pure and
//! deterministic.
//!
//! Matching rules per dimension:
//! - absent clause: always matches
//! - exclusion checked first; an exclusion hit forces false regardless of
//!   any inclusion entry
//! - inclusion entries require the context value to match one of them
//! - a context dimension without a value (e.g. cron label on a push event)
//!   fails every inclusion list and passes exclusion-only clauses; this is
//!   what keeps cron runs and push runs invisible to each other

use serde::{Deserialize, Serialize};

use crate::domain::event::{BuildStatus, EventContext};

/// Per-dimension inclusion/exclusion constraint
///
/// Accepts the three on-disk spellings: a single string, a list
/// (inclusion), or an explicit `{include, exclude}` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Single(String),
    List(Vec<String>),
    Full {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        include: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        exclude: Vec<String>,
    },
}

impl Constraint {
    /// Evaluates this constraint against an optional context value
    pub fn matches(&self, value: Option<&str>) -> bool {
        let (include, exclude): (&[String], &[String]) = match self {
            Constraint::Single(pattern) => (std::slice::from_ref(pattern), &[]),
            Constraint::List(patterns) => (patterns.as_slice(), &[]),
            Constraint::Full { include, exclude } => (include.as_slice(), exclude.as_slice()),
        };

        match value {
            Some(v) => {
                if exclude.iter().any(|p| pattern_match(p, v)) {
                    return false;
                }
                include.is_empty() || include.iter().any(|p| pattern_match(p, v))
            }
            // No value to test: inclusion lists cannot be satisfied,
            // exclusion-only clauses are.
            None => include.is_empty(),
        }
    }
}

/// Shared shape of pipeline `trigger` and step `when` clauses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Constraint>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<Constraint>,
}

impl Conditions {
    pub fn is_empty(&self) -> bool {
        self.branch.is_none()
            && self.event.is_none()
            && self.git_ref.is_none()
            && self.status.is_none()
            && self.cron.is_none()
    }

    /// True when a `status` clause is present
    ///
    /// The scheduler defers such clauses until the upstream outcome is
    /// known, then re-evaluates with [`Conditions::matches`].
    pub fn has_status_clause(&self) -> bool {
        self.status.is_some()
    }

    /// Full evaluation, including the `status` dimension
    ///
    /// An absent `ctx.status` with a status inclusion clause does not
    /// match, like any other missing dimension value.
    pub fn matches(&self, ctx: &EventContext) -> bool {
        self.matches_ignoring_status(ctx) && self.status_matches(ctx.status)
    }

    /// Evaluation of every dimension except `status`
    ///
    /// Used at submit time, before upstream pipelines have an outcome.
    pub fn matches_ignoring_status(&self, ctx: &EventContext) -> bool {
        dimension(&self.branch, ctx.branch.as_deref())
            && dimension(&self.event, Some(ctx.event.as_str()))
            && dimension(&self.git_ref, ctx.git_ref.as_deref())
            && dimension(&self.cron, ctx.cron.as_deref())
    }

    /// Evaluation of the `status` dimension alone
    pub fn status_matches(&self, status: Option<BuildStatus>) -> bool {
        dimension(&self.status, status.map(|s| s.as_str()))
    }
}

fn dimension(constraint: &Option<Constraint>, value: Option<&str>) -> bool {
    match constraint {
        None => true,
        Some(c) => c.matches(value),
    }
}

/// Wildcard match: `*` matches any (possibly empty) substring, everything
/// else is literal. Iterative with single-star backtracking.
pub fn pattern_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();

    let (mut pi, mut vi) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_vi = 0usize;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == v[vi]) {
            pi += 1;
            vi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_vi = vi;
            pi += 1;
        } else if let Some(s) = star {
            // Backtrack: let the last star absorb one more character
            pi = s + 1;
            star_vi += 1;
            vi = star_vi;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }

    pi == p.len()
}
