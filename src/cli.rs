use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use psdrazor::core::batch::parse_list_file;
use psdrazor::core::error::RazorError;
use psdrazor::core::runner::RunnerConfig;

#[derive(Debug, Parser)]
#[command(name = "psdrazor", version, about = "Shrink PSD files with psd_ockham, one file at a time")]
pub struct Cli {
    /// Files to process, in order
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Read more input paths from a list file (one per line)
    #[arg(long = "list", value_name = "LIST")]
    pub list: Option<PathBuf>,

    /// Path to the psd_ockham executable
    #[arg(long = "tool", env = "PSD_OCKHAM", value_name = "PATH")]
    pub tool: Option<PathBuf>,

    /// Kill an invocation after this many seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stream output to stdout instead of opening the terminal UI
    #[arg(long = "plain")]
    pub plain: bool,

    /// Do not ring the terminal bell when a batch finishes
    #[arg(long = "no-bell")]
    pub no_bell: bool,

    /// Write diagnostics (filtered by RUST_LOG) to this file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            timeout: self.timeout.map(Duration::from_secs),
            ..RunnerConfig::default()
        }
    }

    /// Positional files followed by the list file's entries.
    pub fn inputs(&self) -> Result<Vec<PathBuf>, RazorError> {
        let mut inputs = self.files.clone();
        if let Some(list) = &self.list {
            inputs.extend(parse_list_file(list)?);
        }
        Ok(inputs)
    }

    /// The bell is only rung at a terminal; redirected runs stay byte-clean.
    pub fn wants_bell(&self, stderr_is_terminal: bool) -> bool {
        !self.no_bell && stderr_is_terminal
    }
}
