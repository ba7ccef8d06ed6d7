use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::cue::{CompletionCue, Silent};
use crate::core::error::RazorError;
use crate::core::event::{RunEvent, RunState};
use crate::core::formatter::{
    format_header, format_skipped_line, format_start_line, format_status_line,
    COMPLETED_LINE, NO_EXECUTABLE_LINE, NO_INPUT_LINE,
};
use crate::core::job::InvocationResult;
use crate::core::permissions;
use crate::core::process::Invocation;
use crate::core::summary::BatchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Kill an invocation that runs longer than this. `None` waits forever.
    pub timeout: Option<Duration>,
    /// How often the worker checks for `stop()` and the timeout.
    pub poll_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<RunState>,
    cancel: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.lock().is_running
    }
}

/// The only writer of `RunState::output`; every append is mirrored as an event.
#[derive(Clone)]
struct Publisher {
    shared: Arc<Shared>,
    events: Sender<RunEvent>,
}

impl Publisher {
    fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.shared.lock().output.push_str(text);
        let _ = self.events.send(RunEvent::Output(text.to_string()));
    }

    fn start(&self, total: usize) {
        {
            let mut state = self.shared.lock();
            state.output.clear();
            state.is_running = true;
        }
        let _ = self.events.send(RunEvent::Started { total });
    }

    fn notify(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }

    fn finish(&self, report: &BatchReport) {
        {
            let mut state = self.shared.lock();
            state.is_running = false;
            state.output.push_str(COMPLETED_LINE);
        }
        let _ = self.events.send(RunEvent::Output(COMPLETED_LINE.to_string()));
        let _ = self.events.send(RunEvent::Finished(report.clone()));
    }
}

/// Requests cancellation of a running batch from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Kill the in-flight invocation and abandon the rest of the batch.
    ///
    /// Returns false when no batch is running.
    pub fn stop(&self) -> bool {
        if !self.shared.is_running() {
            return false;
        }
        info!("stop requested");
        self.shared.cancel.store(true, Ordering::SeqCst);
        true
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

/// Runs the tool once per input file on a background worker and publishes the
/// combined output.
pub struct BatchRunner {
    config: RunnerConfig,
    publisher: Publisher,
    cue: Arc<dyn CompletionCue>,
    worker: Option<thread::JoinHandle<BatchReport>>,
}

impl BatchRunner {
    pub fn new(config: RunnerConfig) -> (Self, Receiver<RunEvent>) {
        let (events, rx) = mpsc::channel();
        let runner = Self {
            config,
            publisher: Publisher {
                shared: Arc::new(Shared::default()),
                events,
            },
            cue: Arc::new(Silent),
            worker: None,
        };
        (runner, rx)
    }

    pub fn with_cue(mut self, cue: impl CompletionCue + 'static) -> Self {
        self.cue = Arc::new(cue);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Start a batch. Returns once the worker has been spawned.
    ///
    /// Precondition failures are appended to `output` and returned; the batch
    /// never starts and `is_running` is untouched. A run requested while a
    /// batch is active is only returned as an error, since the worker owns
    /// `output` until it finishes.
    pub fn run(
        &mut self,
        executable: impl AsRef<Path>,
        inputs: &[PathBuf],
    ) -> Result<(), RazorError> {
        let executable = executable.as_ref();

        if self.is_running() {
            return Err(RazorError::RunAlreadyActive);
        }
        if executable.as_os_str().is_empty() {
            self.publisher.append(NO_EXECUTABLE_LINE);
            return Err(RazorError::MissingExecutable);
        }
        if inputs.is_empty() {
            self.publisher.append(NO_INPUT_LINE);
            return Err(RazorError::NoInputFiles);
        }

        if let Some(previous) = self.worker.take() {
            let _ = previous.join();
        }

        self.publisher.shared.cancel.store(false, Ordering::SeqCst);
        self.publisher.start(inputs.len());
        info!(
            executable = %executable.display(),
            files = inputs.len(),
            "batch started"
        );

        let worker = Worker {
            executable: executable.to_path_buf(),
            inputs: inputs.to_vec(),
            config: self.config,
            publisher: self.publisher.clone(),
            cue: Arc::clone(&self.cue),
        };
        self.worker = Some(thread::spawn(move || worker.execute()));
        Ok(())
    }

    pub fn stop(&self) -> bool {
        self.stop_handle().stop()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.publisher.shared),
        }
    }

    /// Block until the most recent batch finishes.
    pub fn wait(&mut self) -> Option<BatchReport> {
        let handle = self.worker.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                warn!("batch worker panicked");
                None
            }
        }
    }

    pub fn snapshot(&self) -> RunState {
        self.publisher.shared.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.publisher.shared.is_running()
    }

    /// Empty the output log. Ignored while a batch is running.
    pub fn clear(&self) -> bool {
        let mut state = self.publisher.shared.lock();
        if state.is_running {
            return false;
        }
        state.output.clear();
        true
    }
}

impl Drop for BatchRunner {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
            let _ = self.wait();
        }
    }
}

struct Worker {
    executable: PathBuf,
    inputs: Vec<PathBuf>,
    config: RunnerConfig,
    publisher: Publisher,
    cue: Arc<dyn CompletionCue>,
}

impl Worker {
    fn cancelled(&self) -> bool {
        self.publisher.shared.cancel.load(Ordering::SeqCst)
    }

    fn execute(self) -> BatchReport {
        for line in permissions::repair(&self.executable) {
            self.publisher.append(&line);
        }

        let total = self.inputs.len();
        let mut report = BatchReport::default();

        for (index, input) in self.inputs.iter().enumerate() {
            if self.cancelled() {
                report.skipped = self.inputs[index..].to_vec();
                self.publisher.append(&format_skipped_line(report.skipped.len()));
                info!(skipped = report.skipped.len(), "batch cancelled");
                break;
            }

            self.publisher.append(&format_header(index, total, input));
            self.publisher.notify(RunEvent::FileStarted {
                index,
                total,
                path: input.clone(),
            });
            self.publisher.append(&format_start_line(input));

            let started = Instant::now();
            let request = Invocation {
                executable: &self.executable,
                argument: input,
                timeout: self.config.timeout,
                poll_interval: self.config.poll_interval,
                cancel: &self.publisher.shared.cancel,
            };
            let status = request.run(|_, text| self.publisher.append(&text));
            self.publisher
                .append(&format_status_line(&status, self.config.timeout));

            debug!(file = %input.display(), code = status.code(), "invocation done");
            self.publisher.notify(RunEvent::FileFinished {
                index,
                status: status.clone(),
            });
            report.results.push(InvocationResult {
                path: input.clone(),
                status,
                elapsed: started.elapsed(),
            });
        }

        report.cancelled = self.cancelled();
        info!(
            succeeded = report.all_succeeded(),
            failed = report.failed_count(),
            "batch finished"
        );

        self.publisher.finish(&report);
        self.cue.notify(&report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_rejected_without_starting() {
        let (mut runner, rx) = BatchRunner::new(RunnerConfig::default());

        let err = runner.run("/tmp/tool", &[]).unwrap_err();

        assert!(matches!(err, RazorError::NoInputFiles));
        let state = runner.snapshot();
        assert!(!state.is_running);
        assert_eq!(state.output, NO_INPUT_LINE);
        assert_eq!(rx.try_recv(), Ok(RunEvent::Output(NO_INPUT_LINE.to_string())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_executable_is_rejected() {
        let (mut runner, _rx) = BatchRunner::new(RunnerConfig::default());

        let err = runner
            .run("", &[PathBuf::from("/tmp/a.psd")])
            .unwrap_err();

        assert!(matches!(err, RazorError::MissingExecutable));
        assert_eq!(runner.snapshot().output, NO_EXECUTABLE_LINE);
        assert!(!runner.is_running());
    }

    #[test]
    fn stop_without_batch_is_a_no_op() {
        let (runner, _rx) = BatchRunner::new(RunnerConfig::default());
        assert!(!runner.stop());
        assert!(runner.snapshot().output.is_empty());
    }

    #[test]
    fn wait_without_batch_returns_none() {
        let (mut runner, _rx) = BatchRunner::new(RunnerConfig::default());
        assert!(runner.wait().is_none());
        assert!(runner.clear());
    }
}
