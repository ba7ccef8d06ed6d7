use std::path::{Path, PathBuf};

pub mod batch;
pub mod cue;
pub mod decode;
pub mod error;
pub mod event;
pub mod formatter;
pub mod job;
pub mod locate;
pub mod permissions;
pub mod picker;
pub mod process;
pub mod progress;
pub mod runner;
pub mod summary;

use cue::CompletionCue;
use error::RazorError;
use event::RunEvent;
use runner::{BatchRunner, RunnerConfig};
use summary::BatchReport;

/// Run a whole batch on the calling thread, handing each event to `on_event`
/// as it arrives.
pub fn run_batch(
    executable: &Path,
    inputs: &[PathBuf],
    config: RunnerConfig,
    cue: impl CompletionCue + 'static,
    mut on_event: impl FnMut(&RunEvent),
) -> Result<BatchReport, RazorError> {
    let (runner, events) = BatchRunner::new(config);
    let mut runner = runner.with_cue(cue);
    runner.run(executable, inputs)?;

    for event in events.iter() {
        on_event(&event);
        if let RunEvent::Finished(report) = event {
            let _ = runner.wait();
            return Ok(report);
        }
    }

    Ok(runner.wait().unwrap_or_default())
}
