//! Quality Gate Reporter
//!
//! Runs the external static-analysis pass over a code tree and posts the
//! verdict back to the originating change request as a visible status plus
//! inline annotations. An unavailable analysis service yields an
//! indeterminate report rather than a failed one; the engine itself never
//! blocks on a gate.

use ibai_core::{Blob, ChangeRequestId, ContentHash, DomainError, Report, Result};
use ibai_ports::{
    AnalysisError, AnalysisService, ChangeRequestNotifier, EventPublisher, SystemEvent,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Quality Gate Reporter service
pub struct QualityGateReporter<A, N, E>
where
    A: AnalysisService + Send + Sync,
    N: ChangeRequestNotifier + Send + Sync,
    E: EventPublisher + Send + Sync,
{
    analysis: Arc<A>,
    notifier: Arc<N>,
    event_bus: Arc<E>,
}

impl<A, N, E> QualityGateReporter<A, N, E>
where
    A: AnalysisService + Send + Sync,
    N: ChangeRequestNotifier + Send + Sync,
    E: EventPublisher + Send + Sync,
{
    pub fn new(analysis: Arc<A>, notifier: Arc<N>, event_bus: Arc<E>) -> Self {
        Self {
            analysis,
            notifier,
            event_bus,
        }
    }

    /// Analyze a code tree and report the verdict to the change request.
    pub async fn report(
        &self,
        change_request: &ChangeRequestId,
        project: &str,
        tree: &Blob,
        baseline: Option<&ContentHash>,
    ) -> Result<Report> {
        let report = match self.analysis.analyze(project, tree, baseline).await {
            Ok(report) => report,
            Err(AnalysisError::Unavailable(reason)) => {
                warn!(
                    "analysis service unavailable for {}: {}",
                    change_request, reason
                );
                Report::indeterminate()
            }
            Err(e) => {
                return Err(DomainError::Infrastructure(format!(
                    "analysis service: {}",
                    e
                )));
            }
        };

        self.notifier
            .post_status(change_request, report.status, &report.summary())
            .await
            .map_err(|e| DomainError::Infrastructure(format!("notifier: {}", e)))?;

        if !report.findings.is_empty() {
            self.notifier
                .post_annotations(change_request, &report.findings)
                .await
                .map_err(|e| DomainError::Infrastructure(format!("notifier: {}", e)))?;
        }

        if let Err(e) = self
            .event_bus
            .publish(SystemEvent::QualityGateReported {
                change_request: change_request.0,
                status: report.status,
            })
            .await
        {
            warn!("failed to publish quality gate event: {}", e);
        }

        info!(
            "quality gate for {}: {} ({} findings)",
            change_request,
            report.status,
            report.findings.len()
        );
        Ok(report)
    }
}
