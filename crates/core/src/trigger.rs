//! Trigger evaluation domain service
//!
//! Decides, from an incoming repository event and a declarative filter set,
//! whether a workflow run should start. Pure and synchronous; a rejection is
//! control flow, not an error.

use crate::event::{Event, EventKind};
use crate::{DomainError, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};

/// Declarative trigger filter set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Branch allow-list as glob patterns. Empty means every branch.
    #[serde(default)]
    pub branches: Vec<String>,

    /// Path deny-list as glob patterns.
    #[serde(default)]
    pub paths_ignore: Vec<String>,

    /// Whether manual dispatch events are accepted.
    #[serde(default)]
    pub manual_dispatch: bool,

    /// Commit-message substring that suppresses the run, e.g. "[skip ci]".
    #[serde(default)]
    pub skip_marker: Option<String>,
}

impl TriggerSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branches(mut self, branches: Vec<String>) -> Self {
        self.branches = branches;
        self
    }

    pub fn with_paths_ignore(mut self, patterns: Vec<String>) -> Self {
        self.paths_ignore = patterns;
        self
    }

    pub fn with_manual_dispatch(mut self, enabled: bool) -> Self {
        self.manual_dispatch = enabled;
        self
    }

    pub fn with_skip_marker(mut self, marker: impl Into<String>) -> Self {
        self.skip_marker = Some(marker.into());
        self
    }

    /// Reject malformed glob patterns before any run is created.
    pub fn validate(&self) -> Result<()> {
        for pattern in self.branches.iter().chain(self.paths_ignore.iter()) {
            Pattern::new(pattern).map_err(|e| {
                DomainError::Configuration(format!("invalid trigger glob '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }
}

/// Why an event was rejected - Value Object (Enum)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerRejection {
    SkipMarker,
    ManualDispatchDisabled,
    BranchNotAllowed,
    AllPathsIgnored,
}

impl TriggerRejection {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SkipMarker => "commit message carries the skip marker",
            Self::ManualDispatchDisabled => "manual dispatch is disabled",
            Self::BranchNotAllowed => "ref matches no branch filter",
            Self::AllPathsIgnored => "every changed path is ignored",
        }
    }
}

impl std::fmt::Display for TriggerRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of trigger evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Accepted,
    Rejected(TriggerRejection),
}

impl TriggerDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Trigger evaluation service
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    /// Evaluate an event against a filter set.
    ///
    /// The skip marker is checked first, case-insensitively, and
    /// short-circuits everything else. Manual dispatch bypasses branch and
    /// path filtering entirely. Push events must match a branch glob, and an
    /// event whose changed paths are all ignored is rejected.
    pub fn evaluate(spec: &TriggerSpec, event: &Event) -> TriggerDecision {
        if let Some(marker) = &spec.skip_marker {
            if !marker.is_empty()
                && event
                    .commit_message
                    .to_lowercase()
                    .contains(&marker.to_lowercase())
            {
                return TriggerDecision::Rejected(TriggerRejection::SkipMarker);
            }
        }

        if event.kind == EventKind::ManualDispatch {
            return if spec.manual_dispatch {
                TriggerDecision::Accepted
            } else {
                TriggerDecision::Rejected(TriggerRejection::ManualDispatchDisabled)
            };
        }

        if event.kind == EventKind::Push
            && !spec.branches.is_empty()
            && !matches_any(&spec.branches, event.branch())
        {
            return TriggerDecision::Rejected(TriggerRejection::BranchNotAllowed);
        }

        if !spec.paths_ignore.is_empty()
            && !event.changed_paths.is_empty()
            && event
                .changed_paths
                .iter()
                .all(|path| matches_any(&spec.paths_ignore, path))
        {
            return TriggerDecision::Rejected(TriggerRejection::AllPathsIgnored);
        }

        TriggerDecision::Accepted
    }
}

fn matches_any(patterns: &[String], candidate: &str) -> bool {
    patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .any(|p| p.matches(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn spec() -> TriggerSpec {
        TriggerSpec::new()
            .with_branches(vec!["main".to_string(), "feature/*".to_string()])
            .with_paths_ignore(vec!["README.md".to_string()])
            .with_skip_marker("[skip ci]")
    }

    #[test]
    fn test_push_to_allowed_branch_is_accepted() {
        let event = Event::new(EventKind::Push, "acme/site", "main")
            .with_changed_paths(vec!["src/app.js".to_string()]);

        assert_eq!(
            TriggerEvaluator::evaluate(&spec(), &event),
            TriggerDecision::Accepted
        );
    }

    #[test]
    fn test_push_with_only_ignored_paths_is_rejected() {
        let event = Event::new(EventKind::Push, "acme/site", "feature/x")
            .with_changed_paths(vec!["README.md".to_string()]);

        assert_eq!(
            TriggerEvaluator::evaluate(&spec(), &event),
            TriggerDecision::Rejected(TriggerRejection::AllPathsIgnored)
        );
    }

    #[test]
    fn test_one_surviving_path_accepts() {
        let event = Event::new(EventKind::Push, "acme/site", "main")
            .with_changed_paths(vec!["README.md".to_string(), "src/app.js".to_string()]);

        assert!(TriggerEvaluator::evaluate(&spec(), &event).is_accepted());
    }

    #[test]
    fn test_skip_marker_short_circuits() {
        let event = Event::new(EventKind::Push, "acme/site", "main")
            .with_changed_paths(vec!["src/app.js".to_string()])
            .with_commit_message("fix typo [skip ci]");

        assert_eq!(
            TriggerEvaluator::evaluate(&spec(), &event),
            TriggerDecision::Rejected(TriggerRejection::SkipMarker)
        );
    }

    #[test]
    fn test_skip_marker_is_case_insensitive() {
        let event = Event::new(EventKind::Push, "acme/site", "main")
            .with_commit_message("chore [SKIP CI] bump");

        assert_eq!(
            TriggerEvaluator::evaluate(&spec(), &event),
            TriggerDecision::Rejected(TriggerRejection::SkipMarker)
        );
    }

    #[test]
    fn test_branch_mismatch_rejects_push() {
        let event = Event::new(EventKind::Push, "acme/site", "wip")
            .with_changed_paths(vec!["src/app.js".to_string()]);

        assert_eq!(
            TriggerEvaluator::evaluate(&spec(), &event),
            TriggerDecision::Rejected(TriggerRejection::BranchNotAllowed)
        );
    }

    #[test]
    fn test_manual_dispatch_bypasses_filters() {
        let event = Event::new(EventKind::ManualDispatch, "acme/site", "anything")
            .with_changed_paths(vec!["README.md".to_string()]);

        let enabled = spec().with_manual_dispatch(true);
        assert!(TriggerEvaluator::evaluate(&enabled, &event).is_accepted());

        assert_eq!(
            TriggerEvaluator::evaluate(&spec(), &event),
            TriggerDecision::Rejected(TriggerRejection::ManualDispatchDisabled)
        );
    }

    #[test]
    fn test_pull_request_ignores_branch_filter() {
        let event = Event::new(EventKind::PullRequestOpened, "acme/site", "topic")
            .with_changed_paths(vec!["src/app.js".to_string()]);

        assert!(TriggerEvaluator::evaluate(&spec(), &event).is_accepted());
    }

    #[test]
    fn test_empty_branch_list_allows_every_branch() {
        let open = TriggerSpec::new();
        let event = Event::new(EventKind::Push, "acme/site", "anything");

        assert!(TriggerEvaluator::evaluate(&open, &event).is_accepted());
    }

    #[test]
    fn test_validate_rejects_malformed_glob() {
        let bad = TriggerSpec::new().with_branches(vec!["[".to_string()]);
        assert!(bad.validate().is_err());
    }
}
