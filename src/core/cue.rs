use std::io::Write;

use crate::core::summary::BatchReport;

/// Side effect fired once a batch has finished, after `is_running` is false.
pub trait CompletionCue: Send + Sync {
    fn notify(&self, report: &BatchReport);
}

impl<C: CompletionCue + ?Sized> CompletionCue for Box<C> {
    fn notify(&self, report: &BatchReport) {
        (**self).notify(report);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl CompletionCue for Silent {
    fn notify(&self, _report: &BatchReport) {}
}

/// Rings the terminal bell: once on success, three times on failure.
///
/// The bell goes to stderr so piped stdout stays free of control bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl TerminalBell {
    pub fn pattern(report: &BatchReport) -> &'static str {
        if report.all_succeeded() {
            "\x07"
        } else {
            "\x07\x07\x07"
        }
    }

    pub fn ring(out: &mut impl Write, report: &BatchReport) -> std::io::Result<()> {
        out.write_all(Self::pattern(report).as_bytes())?;
        out.flush()
    }
}

impl CompletionCue for TerminalBell {
    fn notify(&self, report: &BatchReport) {
        if let Err(err) = Self::ring(&mut std::io::stderr(), report) {
            tracing::debug!(err = %err, "failed to ring bell");
        }
    }
}
