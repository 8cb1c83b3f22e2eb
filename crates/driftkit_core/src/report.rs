//! Accumulated error statistics with remediation hints.

use chrono::{DateTime, Utc};
use driftkit_spi::{DriftError, ErrorKind};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// Statistics for one error kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindStats {
    /// How many errors of this kind were recorded
    pub count: u64,
    /// First occurrence
    pub first_seen: DateTime<Utc>,
    /// Most recent occurrence
    pub last_seen: DateTime<Utc>,
    /// Occurrences per `provider/region/service` context
    pub by_context: HashMap<String, u64>,
}

/// One row of a rendered report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Error kind identifier (e.g. `rate-limit`)
    pub kind: String,
    /// Statistics for the kind
    pub stats: KindStats,
    /// Remediation suggestion, when one is known
    pub remediation: Option<String>,
}

/// Accumulates discovery and automation errors for operator reporting.
pub struct ErrorReporter {
    stats: RwLock<HashMap<ErrorKind, KindStats>>,
}

impl ErrorReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// Record one error.
    pub fn record(&self, error: &DriftError) {
        let now = Utc::now();
        let context = error
            .context()
            .map(|(p, r, s)| format!("{}/{}/{}", p, r, s))
            .unwrap_or_else(|| "unattributed".to_string());

        let mut stats = self.stats.write();
        let entry = stats.entry(error.kind()).or_insert_with(|| KindStats {
            count: 0,
            first_seen: now,
            last_seen: now,
            by_context: HashMap::new(),
        });
        entry.count += 1;
        entry.last_seen = now;
        *entry.by_context.entry(context).or_insert(0) += 1;
    }

    /// Total errors recorded across all kinds.
    pub fn total(&self) -> u64 {
        self.stats.read().values().map(|s| s.count).sum()
    }

    /// Errors recorded for one kind.
    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.stats.read().get(&kind).map(|s| s.count).unwrap_or(0)
    }

    /// Render the accumulated statistics, most frequent kind first.
    pub fn report(&self) -> Vec<ReportEntry> {
        let stats = self.stats.read();
        let mut entries: Vec<ReportEntry> = stats
            .iter()
            .map(|(kind, stats)| ReportEntry {
                kind: kind.to_string(),
                stats: stats.clone(),
                remediation: kind.remediation().map(|s| s.to_string()),
            })
            .collect();
        entries.sort_by(|a, b| b.stats.count.cmp(&a.stats.count));
        entries
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftkit_spi::NetworkError;

    #[test]
    fn test_record_and_count() {
        let reporter = ErrorReporter::new();
        reporter.record(&DriftError::RateLimited { retry_after: None });
        reporter.record(&DriftError::RateLimited { retry_after: None });
        reporter.record(&DriftError::Validation("bad".into()));

        assert_eq!(reporter.total(), 3);
        assert_eq!(reporter.count(ErrorKind::RateLimit), 2);
        assert_eq!(reporter.count(ErrorKind::Validation), 1);
        assert_eq!(reporter.count(ErrorKind::Network), 0);
    }

    #[test]
    fn test_context_distribution() {
        let reporter = ErrorReporter::new();
        let err = DriftError::Network(NetworkError::Connection("down".into())).with_context(
            "aws",
            "us-east-1",
            "ec2",
        );
        reporter.record(&err);
        reporter.record(&err);

        let report = reporter.report();
        assert_eq!(report[0].kind, "network");
        assert_eq!(report[0].stats.by_context["aws/us-east-1/ec2"], 2);
    }

    #[test]
    fn test_remediation_attached() {
        let reporter = ErrorReporter::new();
        reporter.record(&DriftError::Authentication {
            provider: "azure".into(),
            message: "no subscription".into(),
        });

        let report = reporter.report();
        assert!(report[0].remediation.as_deref().unwrap().contains("credential chain"));
    }

    #[test]
    fn test_report_sorted_by_frequency() {
        let reporter = ErrorReporter::new();
        for _ in 0..3 {
            reporter.record(&DriftError::RateLimited { retry_after: None });
        }
        reporter.record(&DriftError::Cancelled);

        let report = reporter.report();
        assert_eq!(report[0].kind, "rate-limit");
        assert_eq!(report[1].kind, "cancelled");
    }
}
