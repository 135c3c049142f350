//! Quality gate reports
//!
//! The verdict of a static-analysis pass over a code tree, reported back to
//! the originating change request. An unavailable analysis service yields an
//! indeterminate verdict rather than a failure.

use serde::{Deserialize, Serialize};

/// Gate verdict - Value Object (Enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    Passed,
    Failed,
    Indeterminate,
}

impl GateStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Indeterminate => "INDETERMINATE",
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

/// One analysis finding, rendered as an inline annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: String,
    pub message: String,
    pub path: String,
    pub line: Option<u32>,
    pub severity: Severity,
}

impl Finding {
    pub fn new(
        rule: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            path: path.into(),
            line: None,
            severity,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Analysis report posted against a change request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub status: GateStatus,
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn passed(findings: Vec<Finding>) -> Self {
        Self {
            status: GateStatus::Passed,
            findings,
        }
    }

    pub fn failed(findings: Vec<Finding>) -> Self {
        Self {
            status: GateStatus::Failed,
            findings,
        }
    }

    /// The analysis service could not be reached; policy on indeterminate
    /// results is external.
    pub fn indeterminate() -> Self {
        Self {
            status: GateStatus::Indeterminate,
            findings: vec![],
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == GateStatus::Passed
    }

    pub fn summary(&self) -> String {
        match self.status {
            GateStatus::Passed => format!("quality gate passed ({} findings)", self.findings.len()),
            GateStatus::Failed => format!("quality gate failed ({} findings)", self.findings.len()),
            GateStatus::Indeterminate => "quality gate indeterminate: analysis unavailable".to_string(),
        }
    }
}
