use std::path::PathBuf;

use crate::core::job::InvocationStatus;
use crate::core::summary::BatchReport;

/// Notifications published by the batch worker, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// `output` was reset and `is_running` became true.
    Started { total: usize },
    /// Invocation `index` (zero-based) is about to spawn.
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    /// Text appended to `output`.
    Output(String),
    FileFinished {
        index: usize,
        status: InvocationStatus,
    },
    /// `is_running` became false and the completion line was appended.
    Finished(BatchReport),
}

/// Caller-visible state of the runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub output: String,
    pub is_running: bool,
}
