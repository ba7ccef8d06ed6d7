use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::RazorError;

pub const TOOL_NAME: &str = "psd_ockham";

/// Find the tool: an explicit path, then next to the running binary, then `PATH`.
pub fn locate_tool(explicit: Option<&Path>) -> Result<PathBuf, RazorError> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    locate_in(explicit, exe_dir.as_deref(), std::env::var_os("PATH"))
}

fn locate_in(
    explicit: Option<&Path>,
    exe_dir: Option<&Path>,
    path_var: Option<OsString>,
) -> Result<PathBuf, RazorError> {
    let candidates: Vec<PathBuf> = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => exe_dir
            .map(|dir| dir.join(TOOL_NAME))
            .into_iter()
            .chain(
                path_var
                    .iter()
                    .flat_map(|var| std::env::split_paths(var))
                    .map(|dir| dir.join(TOOL_NAME)),
            )
            .collect(),
    };

    match candidates.iter().find(|candidate| candidate.is_file()) {
        Some(found) => {
            debug!(path = %found.display(), "located tool");
            Ok(found.clone())
        }
        None => Err(RazorError::ToolNotFound {
            searched: candidates,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_binary_directory_over_path() {
        let bundle = tempfile::tempdir().expect("tempdir");
        let elsewhere = tempfile::tempdir().expect("tempdir");
        std::fs::write(bundle.path().join(TOOL_NAME), b"").expect("write");
        std::fs::write(elsewhere.path().join(TOOL_NAME), b"").expect("write");

        let found = locate_in(
            None,
            Some(bundle.path()),
            Some(elsewhere.path().as_os_str().to_os_string()),
        )
        .expect("locate");

        assert_eq!(found, bundle.path().join(TOOL_NAME));
    }

    #[test]
    fn falls_back_to_path() {
        let empty = tempfile::tempdir().expect("tempdir");
        let bin = tempfile::tempdir().expect("tempdir");
        std::fs::write(bin.path().join(TOOL_NAME), b"").expect("write");

        let found = locate_in(
            None,
            Some(empty.path()),
            Some(bin.path().as_os_str().to_os_string()),
        )
        .expect("locate");

        assert_eq!(found, bin.path().join(TOOL_NAME));
    }

    #[test]
    fn missing_explicit_path_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let explicit = dir.path().join("nope");

        let err = locate_in(Some(&explicit), None, None).unwrap_err();

        match err {
            RazorError::ToolNotFound { searched } => assert_eq!(searched, vec![explicit]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
