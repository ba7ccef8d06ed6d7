//! Developer diagnostics via `RUST_LOG`.
//!
//! Separate from the batch output log that users see: nothing here reaches
//! `RunState::output`.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::error::RazorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
    /// Used while the TUI owns the terminal.
    Discard,
}

/// Install the global subscriber. Defaults to `warn` when `RUST_LOG` is unset.
pub fn init(target: LogTarget<'_>) -> Result<(), RazorError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let writer = match target {
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| RazorError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        LogTarget::Discard => BoxMakeWriter::new(std::io::sink),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
        .try_init();
    Ok(())
}
