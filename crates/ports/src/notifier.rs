//! Change Request Notifier Port
//!
//! Posts quality gate verdicts back to the originating change request as a
//! visible status plus inline annotations.

use async_trait::async_trait;
use ibai_core::{ChangeRequestId, Finding, GateStatus};

/// Notifier error types
#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("notifier unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Change request notifier port
#[async_trait]
pub trait ChangeRequestNotifier: Send + Sync {
    async fn post_status(
        &self,
        change_request: &ChangeRequestId,
        status: GateStatus,
        summary: &str,
    ) -> Result<(), NotifyError>;

    async fn post_annotations(
        &self,
        change_request: &ChangeRequestId,
        findings: &[Finding],
    ) -> Result<(), NotifyError>;
}
