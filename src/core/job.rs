use std::path::PathBuf;
use std::time::Duration;

/// Integer status reported for invocations that never produced a real exit code.
pub const SPAWN_FAILED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
    Exited(i32),
    /// Killed by a signal the engine did not send.
    Signaled,
    SpawnFailed(String),
    /// Killed after `stop()`.
    Terminated,
    TimedOut,
}

impl InvocationStatus {
    pub fn code(&self) -> i32 {
        match self {
            InvocationStatus::Exited(code) => *code,
            _ => SPAWN_FAILED,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, InvocationStatus::Exited(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub path: PathBuf,
    pub status: InvocationStatus,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exit_zero_is_success() {
        assert!(InvocationStatus::Exited(0).success());
        assert!(!InvocationStatus::Exited(1).success());
        assert!(!InvocationStatus::Terminated.success());
        assert!(!InvocationStatus::TimedOut.success());
        assert!(!InvocationStatus::SpawnFailed("nope".to_string()).success());
    }

    #[test]
    fn non_exit_statuses_map_to_sentinel() {
        assert_eq!(InvocationStatus::Exited(3).code(), 3);
        assert_eq!(InvocationStatus::Signaled.code(), SPAWN_FAILED);
        assert_eq!(
            InvocationStatus::SpawnFailed("missing".to_string()).code(),
            SPAWN_FAILED
        );
    }
}
