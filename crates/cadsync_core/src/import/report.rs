//! Structured progress and diagnostics channel.

use std::fmt;

/// Report severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Receives user-visible import messages.
///
/// `depth` is the traversal depth of the node the message concerns.
pub trait ReportSink {
    fn report(&mut self, severity: Severity, message: &str, depth: usize);
}

/// Forwards reports to the `log` facade, indented by depth.
#[derive(Debug, Default)]
pub struct LogReport {
    pub warnings: usize,
    pub errors: usize,
}

impl ReportSink for LogReport {
    fn report(&mut self, severity: Severity, message: &str, depth: usize) {
        let indent = "  ".repeat(depth);
        match severity {
            Severity::Info => log::info!("{}{}", indent, message),
            Severity::Warning => {
                self.warnings += 1;
                log::warn!("{}{}", indent, message);
            }
            Severity::Error => {
                self.errors += 1;
                log::error!("{}{}", indent, message);
            }
        }
    }
}

/// One stored report.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportEntry {
    pub severity: Severity,
    pub message: String,
    pub depth: usize,
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct CollectingReport {
    pub entries: Vec<ReportEntry>,
}

impl CollectingReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    /// Messages with the given severity, in order.
    pub fn messages(&self, severity: Severity) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.as_str())
            .collect()
    }
}

impl ReportSink for CollectingReport {
    fn report(&mut self, severity: Severity, message: &str, depth: usize) {
        self.entries.push(ReportEntry {
            severity,
            message: message.to_string(),
            depth,
        });
    }
}

impl<R: ReportSink + ?Sized> ReportSink for &mut R {
    fn report(&mut self, severity: Severity, message: &str, depth: usize) {
        (**self).report(severity, message, depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_report_counts() {
        let mut report = LogReport::default();
        report.report(Severity::Info, "importing", 0);
        report.report(Severity::Warning, "skipped", 1);
        report.report(Severity::Error, "failed", 2);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.errors, 1);
    }

    #[test]
    fn test_collecting_report() {
        let mut report = CollectingReport::new();
        report.report(Severity::Warning, "a", 0);
        report.report(Severity::Info, "b", 1);
        report.report(Severity::Warning, "c", 2);

        assert_eq!(report.count(Severity::Warning), 2);
        assert_eq!(report.messages(Severity::Warning), vec!["a", "c"]);
        assert_eq!(report.entries[1].depth, 1);
        assert_eq!(Severity::Warning.to_string(), "WARNING");
    }
}
