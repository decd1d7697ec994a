//! In-memory batch results and the operator-facing report.

use serde::Serialize;

use super::batch::ItemOutcome;

/// Number of individual errors listed after a batch.
pub const ERROR_PREVIEW_LIMIT: usize = 5;
/// Number of skipped uploads listed before a batch.
pub const REJECTION_PREVIEW_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendFailure {
    pub identity: String,
    pub address: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<SendFailure>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    AllSucceeded,
    AllFailed,
    Partial,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome.error_message() {
            None => self.successful += 1,
            Some(message) => {
                self.failed += 1;
                self.errors.push(SendFailure {
                    identity: outcome.log_identity().to_string(),
                    address: outcome.address.clone(),
                    message,
                });
            }
        }
    }

    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }

    pub fn outcome(&self) -> BatchOutcome {
        if self.failed == 0 {
            BatchOutcome::AllSucceeded
        } else if self.successful == 0 {
            BatchOutcome::AllFailed
        } else {
            BatchOutcome::Partial
        }
    }

    pub fn headline(&self) -> String {
        match self.outcome() {
            BatchOutcome::AllSucceeded => format!(
                "✓ Success! All {} certificates were sent successfully.",
                self.successful
            ),
            BatchOutcome::AllFailed => format!(
                "✗ Failed! All {} certificates failed to send.",
                self.failed
            ),
            BatchOutcome::Partial => format!(
                "⚠ Partial Success: {} out of {} sent. {} failed.",
                self.successful, self.total, self.failed
            ),
        }
    }

    /// First few errors, one per line, or `None` when nothing failed.
    pub fn error_report(&self) -> Option<String> {
        let lines: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("• {}: {}", e.identity, e.message))
            .collect();
        bounded_report("Error Details:", &lines, ERROR_PREVIEW_LIMIT)
    }
}

/// Report of uploads skipped by the pre-filter, or `None` when none were.
pub fn rejection_report(rejected: &[String]) -> Option<String> {
    let lines: Vec<String> = rejected.iter().map(|r| format!("• {r}")).collect();
    bounded_report("File Validation Errors:", &lines, REJECTION_PREVIEW_LIMIT)
}

/// Operator notice after screening, or `None` when nothing was skipped.
pub fn screening_notice(accepted: usize, rejected: usize) -> Option<String> {
    if accepted == 0 {
        Some("No valid certificate files to process.".to_string())
    } else if rejected > 0 {
        Some(format!(
            "⚠ Processing {accepted} valid file(s). Skipped {rejected} invalid file(s)."
        ))
    } else {
        None
    }
}

fn bounded_report(title: &str, lines: &[String], limit: usize) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let mut report = vec![title.to_string()];
    report.extend(lines.iter().take(limit).cloned());
    if lines.len() > limit {
        report.push(format!("... and {} more errors", lines.len() - limit));
    }
    Some(report.join("\n"))
}
