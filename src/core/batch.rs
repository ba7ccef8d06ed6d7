use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::core::error::RazorError;

/// Read a batch list: one input path per line, `#` comments and blank lines
/// ignored, shell quoting allowed. Relative entries are resolved against the
/// list file's directory.
pub fn parse_list_file(path: &Path) -> Result<Vec<PathBuf>, RazorError> {
    let io_err = |source| RazorError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let reader = BufReader::new(file);
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let mut inputs = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let entry = parse_entry(trimmed).map_err(|message| RazorError::InvalidListLine {
            line: number + 1,
            message,
        })?;
        inputs.push(base.join(entry));
    }

    Ok(inputs)
}

fn parse_entry(line: &str) -> Result<PathBuf, String> {
    let mut words = shell_words::split(line).map_err(|err| err.to_string())?;
    match words.len() {
        1 => Ok(PathBuf::from(words.remove(0))),
        0 => Err("empty entry".to_string()),
        n => Err(format!("expected one path, found {n}")),
    }
}

/// Split pasted or typed text into paths, honouring shell quoting.
///
/// Terminals paste dropped files as space-separated, quoted paths.
pub fn split_paths(text: &str) -> Result<Vec<PathBuf>, String> {
    let words = shell_words::split(text.trim()).map_err(|err| err.to_string())?;
    Ok(words.into_iter().map(PathBuf::from).collect())
}
