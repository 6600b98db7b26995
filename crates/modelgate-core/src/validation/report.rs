use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { check_name: name.into(), passed: true, message: message.into() }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { check_name: name.into(), passed: false, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Data,
    Model,
}

/// Named checks and their verdicts. The overall verdict is the AND of all checks.
///
/// Fields are private: a report is complete when constructed and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    kind: ReportKind,
    passed: bool,
    checks: Vec<CheckResult>,
    created_at: DateTime<Utc>,
}

impl ValidationReport {
    #[must_use]
    pub fn new(kind: ReportKind, checks: Vec<CheckResult>) -> Self {
        let passed = checks.iter().all(|c| c.passed);
        Self { kind, passed, checks, created_at: Utc::now() }
    }

    #[must_use]
    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check_name == name)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// One-line description, e.g. `2 of 4 checks failed: valid_price, minimum_row_count`.
    #[must_use]
    pub fn summary(&self) -> String {
        let failed: Vec<&str> = self.failed_checks().map(|c| c.check_name.as_str()).collect();
        if failed.is_empty() {
            format!("all {} checks passed", self.checks.len())
        } else {
            format!("{} of {} checks failed: {}", failed.len(), self.checks.len(), failed.join(", "))
        }
    }
}
