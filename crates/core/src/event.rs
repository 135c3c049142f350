//! Repository events consumed from the hosting platform's event bus
//!
//! The core only consumes kind, ref, changed-path set and commit message;
//! everything else about the platform payload is ignored upstream.

use serde::{Deserialize, Serialize};

/// Kind of inbound repository event - Value Object (Enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Push,
    PullRequestOpened,
    PullRequestSynchronized,
    ManualDispatch,
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Push => "push",
            Self::PullRequestOpened => "pull-request-opened",
            Self::PullRequestSynchronized => "pull-request-synchronized",
            Self::ManualDispatch => "manual-dispatch",
        }
    }

    pub fn is_pull_request(&self) -> bool {
        matches!(self, Self::PullRequestOpened | Self::PullRequestSynchronized)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Change request number on the hosting platform - Value Object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRequestId(pub u64);

impl std::fmt::Display for ChangeRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inbound repository event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub repository: String,
    /// Git ref, either fully qualified ("refs/heads/main") or a bare branch name.
    pub ref_name: String,
    pub changed_paths: Vec<String>,
    pub commit_message: String,
    pub change_request: Option<ChangeRequestId>,
}

impl Event {
    pub fn new(kind: EventKind, repository: impl Into<String>, ref_name: impl Into<String>) -> Self {
        Self {
            kind,
            repository: repository.into(),
            ref_name: ref_name.into(),
            changed_paths: vec![],
            commit_message: String::new(),
            change_request: None,
        }
    }

    pub fn with_changed_paths(mut self, paths: Vec<String>) -> Self {
        self.changed_paths = paths;
        self
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    pub fn with_change_request(mut self, id: ChangeRequestId) -> Self {
        self.change_request = Some(id);
        self
    }

    /// Branch name with any "refs/heads/" qualifier stripped.
    pub fn branch(&self) -> &str {
        self.ref_name
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.ref_name)
    }
}
