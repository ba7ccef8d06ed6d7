use std::path::PathBuf;
use std::time::Duration;

use crate::core::job::InvocationResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<InvocationResult>,
    /// Files never started because the batch was stopped.
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
}

impl BatchReport {
    /// True iff every invocation exited 0 and nothing was skipped.
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.results.iter().all(|r| r.status.success())
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.status.success()).count()
    }

    pub fn elapsed(&self) -> Duration {
        self.results.iter().map(|r| r.elapsed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::InvocationStatus;

    fn result(path: &str, status: InvocationStatus) -> InvocationResult {
        InvocationResult {
            path: PathBuf::from(path),
            status,
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn any_failure_fails_the_batch() {
        let report = BatchReport {
            results: vec![
                result("/a.psd", InvocationStatus::Exited(0)),
                result("/b.psd", InvocationStatus::Exited(1)),
            ],
            ..Default::default()
        };
        assert!(!report.all_succeeded());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.elapsed(), Duration::from_millis(20));
    }

    #[test]
    fn skipped_files_fail_the_batch() {
        let report = BatchReport {
            results: vec![result("/a.psd", InvocationStatus::Exited(0))],
            skipped: vec![PathBuf::from("/b.psd")],
            cancelled: true,
        };
        assert!(!report.all_succeeded());
    }
}
