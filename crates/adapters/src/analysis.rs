//! Analysis service and change-request notifier adapters
//!
//! Deterministic stand-ins for the external analysis product and the hosting
//! platform's review surface, used by embedding hosts and tests.

use async_trait::async_trait;
use ibai_core::{Blob, ChangeRequestId, ContentHash, Finding, GateStatus, Report};
use ibai_ports::{AnalysisError, AnalysisService, ChangeRequestNotifier, NotifyError};
use std::sync::Arc;
use tokio::sync::RwLock;

enum StubBehavior {
    Respond(Report),
    Unavailable(String),
}

/// Analysis service returning a configured report (or unavailability)
pub struct StaticAnalysisStub {
    behavior: StubBehavior,
}

impl StaticAnalysisStub {
    pub fn passing() -> Self {
        Self {
            behavior: StubBehavior::Respond(Report::passed(vec![])),
        }
    }

    pub fn failing(findings: Vec<Finding>) -> Self {
        Self {
            behavior: StubBehavior::Respond(Report::failed(findings)),
        }
    }

    pub fn with_report(report: Report) -> Self {
        Self {
            behavior: StubBehavior::Respond(report),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            behavior: StubBehavior::Unavailable(reason.into()),
        }
    }
}

#[async_trait]
impl AnalysisService for StaticAnalysisStub {
    async fn analyze(
        &self,
        _project: &str,
        _tree: &Blob,
        _baseline: Option<&ContentHash>,
    ) -> Result<Report, AnalysisError> {
        match &self.behavior {
            StubBehavior::Respond(report) => Ok(report.clone()),
            StubBehavior::Unavailable(reason) => Err(AnalysisError::Unavailable(reason.clone())),
        }
    }
}

/// Posted status entry recorded by the notifier
#[derive(Debug, Clone)]
pub struct PostedStatus {
    pub change_request: ChangeRequestId,
    pub status: GateStatus,
    pub summary: String,
}

/// Notifier that records every posted status and annotation
pub struct RecordingChangeRequestNotifier {
    statuses: Arc<RwLock<Vec<PostedStatus>>>,
    annotations: Arc<RwLock<Vec<(ChangeRequestId, Finding)>>>,
}

impl RecordingChangeRequestNotifier {
    pub fn new() -> Self {
        Self {
            statuses: Arc::new(RwLock::new(Vec::new())),
            annotations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn statuses(&self) -> Vec<PostedStatus> {
        self.statuses.read().await.clone()
    }

    pub async fn annotations(&self) -> Vec<(ChangeRequestId, Finding)> {
        self.annotations.read().await.clone()
    }
}

impl Default for RecordingChangeRequestNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeRequestNotifier for RecordingChangeRequestNotifier {
    async fn post_status(
        &self,
        change_request: &ChangeRequestId,
        status: GateStatus,
        summary: &str,
    ) -> Result<(), NotifyError> {
        self.statuses.write().await.push(PostedStatus {
            change_request: *change_request,
            status,
            summary: summary.to_string(),
        });
        Ok(())
    }

    async fn post_annotations(
        &self,
        change_request: &ChangeRequestId,
        findings: &[Finding],
    ) -> Result<(), NotifyError> {
        let mut annotations = self.annotations.write().await;
        for finding in findings {
            annotations.push((*change_request, finding.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibai_core::Severity;

    #[tokio::test]
    async fn test_stub_modes() {
        let passing = StaticAnalysisStub::passing();
        let report = passing.analyze("proj", &Blob::new(), None).await.unwrap();
        assert!(report.is_passed());

        let down = StaticAnalysisStub::unavailable("maintenance window");
        assert!(matches!(
            down.analyze("proj", &Blob::new(), None).await,
            Err(AnalysisError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_notifier_records_posts() {
        let notifier = RecordingChangeRequestNotifier::new();
        let cr = ChangeRequestId(7);

        notifier
            .post_status(&cr, GateStatus::Failed, "quality gate failed")
            .await
            .unwrap();
        notifier
            .post_annotations(
                &cr,
                &[Finding::new("S100", "naming", "src/app.js", Severity::Minor).at_line(3)],
            )
            .await
            .unwrap();

        assert_eq!(notifier.statuses().await.len(), 1);
        assert_eq!(notifier.annotations().await.len(), 1);
    }
}
