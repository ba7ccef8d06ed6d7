use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RazorError {
    #[error("executable path is empty")]
    MissingExecutable,
    #[error("no input files selected")]
    NoInputFiles,
    #[error("a batch is already running")]
    RunAlreadyActive,
    #[error("psd_ockham not found (looked in {searched:?})")]
    ToolNotFound { searched: Vec<PathBuf> },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid batch list line {line}: {message}")]
    InvalidListLine { line: usize, message: String },
    #[error("terminal error: {message}")]
    Terminal { message: String },
}
