mod cli;
mod tui;

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use clap::Parser;

use psdrazor::core::cue::{CompletionCue, Silent, TerminalBell};
use psdrazor::core::error::RazorError;
use psdrazor::core::event::RunEvent;
use psdrazor::core::formatter::format_verdict;
use psdrazor::core::locate::locate_tool;
use psdrazor::core::run_batch;
use psdrazor::logging::{self, LogTarget};

use crate::cli::Cli;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

/// Returns whether every file was processed successfully.
fn run() -> Result<bool, RazorError> {
    let cli = Cli::parse();
    let plain = cli.plain || !std::io::stdout().is_terminal();

    let log_target = match (&cli.log_file, plain) {
        (Some(path), _) => LogTarget::File(path),
        (None, true) => LogTarget::Stderr,
        (None, false) => LogTarget::Discard,
    };
    logging::init(log_target)?;

    let inputs = cli.inputs()?;
    let tool = locate_tool(cli.tool.as_deref());

    if plain {
        return run_plain(&cli, tool?, &inputs);
    }

    tui::run(tui::Options {
        tool,
        inputs,
        config: cli.runner_config(),
        bell: cli.wants_bell(std::io::stderr().is_terminal()),
    })?;
    Ok(true)
}

fn run_plain(cli: &Cli, tool: PathBuf, inputs: &[PathBuf]) -> Result<bool, RazorError> {
    let cue: Box<dyn CompletionCue> = if cli.wants_bell(std::io::stderr().is_terminal()) {
        Box::new(TerminalBell)
    } else {
        Box::new(Silent)
    };

    let mut stdout = std::io::stdout();
    let report = run_batch(&tool, inputs, cli.runner_config(), cue, |event| {
        if let RunEvent::Output(text) = event {
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    })?;

    eprintln!("{}", format_verdict(&report));
    Ok(report.all_succeeded())
}
