use std::path::PathBuf;

use crate::core::event::RunEvent;

/// Running tally of a batch, folded from `RunEvent`s on the observer side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub current: Option<PathBuf>,
    pub finished: bool,
}

impl BatchProgress {
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Started { total } => {
                *self = Self {
                    total: *total,
                    ..Self::default()
                };
            }
            RunEvent::FileStarted { path, .. } => {
                self.current = Some(path.clone());
            }
            RunEvent::FileFinished { status, .. } => {
                self.completed += 1;
                if !status.success() {
                    self.failed += 1;
                }
                self.current = None;
            }
            RunEvent::Finished(_) => {
                self.current = None;
                self.finished = true;
            }
            RunEvent::Output(_) => {}
        }
    }

    /// Fraction of files done, in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}
