//! External Analysis Service Port
//!
//! Receives a code tree plus project identifiers and returns a quality gate
//! report. Unavailability is distinguished from a failed gate: policy on
//! indeterminate results is external.

use async_trait::async_trait;
use ibai_core::{Blob, ContentHash, Report};

/// Analysis service error types
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    /// The service could not be reached; the report becomes indeterminate.
    #[error("analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("analysis protocol error: {0}")]
    Protocol(String),
}

/// Analysis service port
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyze a code tree against an optional baseline tree hash.
    async fn analyze(
        &self,
        project: &str,
        tree: &Blob,
        baseline: Option<&ContentHash>,
    ) -> Result<Report, AnalysisError>;
}
