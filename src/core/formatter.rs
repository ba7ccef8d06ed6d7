use std::path::Path;
use std::time::Duration;

use crate::core::job::InvocationStatus;
use crate::core::summary::BatchReport;

pub const COMPLETED_LINE: &str = "\nAll operations completed\n";
pub const TERMINATED_LINE: &str = "\nProcess terminated by user.\n";
pub const NO_EXECUTABLE_LINE: &str =
    "Error: Executable path not found. Please ensure psd_ockham is next to psdrazor or pass --tool.\n";
pub const NO_INPUT_LINE: &str = "Error: No input files selected.\n";
pub const ALREADY_RUNNING_LINE: &str = "Error: A batch is already running.\n";

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn format_header(index: usize, total: usize, path: &Path) -> String {
    format!(
        "\n--- Processing file {} of {}: {} ---\n",
        index + 1,
        total,
        file_name(path)
    )
}

pub fn format_start_line(path: &Path) -> String {
    format!("Starting process for: {}\n", path.display())
}

/// Trailer written after an invocation ends.
pub fn format_status_line(status: &InvocationStatus, timeout: Option<Duration>) -> String {
    match status {
        InvocationStatus::Exited(code) => {
            format!("\nProcess finished with exit code: {code}\n")
        }
        InvocationStatus::Signaled => "\nProcess killed by signal\n".to_string(),
        InvocationStatus::SpawnFailed(reason) => format!("\nError running process: {reason}\n"),
        InvocationStatus::Terminated => TERMINATED_LINE.to_string(),
        InvocationStatus::TimedOut => {
            let secs = timeout.map(|t| t.as_secs()).unwrap_or(0);
            format!("\nProcess timed out after {secs}s\n")
        }
    }
}

pub fn format_skipped_line(count: usize) -> String {
    format!("\nSkipped {count} remaining file(s)\n")
}

/// One-line verdict for front-ends; not part of the engine's output log.
pub fn format_verdict(report: &BatchReport) -> String {
    let total = report.results.len() + report.skipped.len();
    if report.all_succeeded() {
        format!("{total} file(s) processed successfully")
    } else if report.cancelled {
        format!(
            "stopped: {} of {total} file(s) ran, {} failed",
            report.results.len(),
            report.failed_count()
        )
    } else {
        format!("{} of {total} file(s) failed", report.failed_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn header_is_one_based_and_uses_file_name() {
        let line = format_header(1, 2, Path::new("/tmp/b.psd"));
        assert_eq!(line, "\n--- Processing file 2 of 2: b.psd ---\n");
    }

    #[test]
    fn status_lines() {
        assert_eq!(
            format_status_line(&InvocationStatus::Exited(2), None),
            "\nProcess finished with exit code: 2\n"
        );
        assert_eq!(
            format_status_line(&InvocationStatus::Terminated, None),
            TERMINATED_LINE
        );
        assert_eq!(
            format_status_line(
                &InvocationStatus::TimedOut,
                Some(Duration::from_secs(30))
            ),
            "\nProcess timed out after 30s\n"
        );
    }

    #[test]
    fn file_name_falls_back_to_display() {
        assert_eq!(file_name(Path::new("/")), "/");
        assert_eq!(file_name(&PathBuf::from("dir/x.psb")), "x.psb");
    }
}
