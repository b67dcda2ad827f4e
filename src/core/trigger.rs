//! Trigger events and the branch filters that decide whether they start a Run

use crate::core::error::ConfigError;
use glob_match::glob_match;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of activity that can start a Run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The external occurrence that may start a Run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event: EventKind,

    /// Pushed branch, or the branch a pull request targets
    pub branch: String,

    /// Clone source for the checkout step (URL or local path)
    pub repository: String,

    /// Commit to check out, if known
    #[serde(default)]
    pub sha: Option<String>,
}

impl TriggerEvent {
    pub fn push(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            event: EventKind::Push,
            branch: branch.into(),
            repository: repository.into(),
            sha: None,
        }
    }

    pub fn pull_request(repository: impl Into<String>, base_branch: impl Into<String>) -> Self {
        Self {
            event: EventKind::PullRequest,
            branch: base_branch.into(),
            repository: repository.into(),
            sha: None,
        }
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }
}

/// Branch patterns configured for one event kind (empty = every branch).
///
/// Patterns are globs: `*` stays within one `/` segment, `**` crosses
/// segments, and `?`, `[...]` and `{a,b}` work as in shell globs.
#[derive(Debug, Clone, Default)]
pub struct BranchFilter {
    patterns: Vec<String>,
}

impl BranchFilter {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let pattern = p.as_ref().trim();
                if pattern.is_empty() {
                    Err(ConfigError::BranchPattern(p.as_ref().to_string()))
                } else {
                    Ok(pattern.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, branch: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| glob_match(p, branch))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }
}

/// The set of events a workflow reacts to
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    filters: BTreeMap<EventKind, BranchFilter>,
}

impl TriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, kind: EventKind, filter: BranchFilter) -> Self {
        self.filters.insert(kind, filter);
        self
    }

    /// Whether the event should start a Run
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        self.filters
            .get(&event.event)
            .is_some_and(|filter| filter.matches(&event.branch))
    }

    pub fn filters(&self) -> impl Iterator<Item = (&EventKind, &BranchFilter)> {
        self.filters.iter()
    }
}
