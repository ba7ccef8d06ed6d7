//! Best-effort repair of the bundled executable before a batch.
//!
//! Neither step can fail the batch; each returns the line to append to the
//! output log.

use std::path::Path;

use tracing::{debug, warn};

pub fn repair(executable: &Path) -> Vec<String> {
    vec![
        format!("Fixing permissions for: {}\n", executable.display()),
        mark_executable(executable),
        clear_quarantine(executable),
        "Permissions fixed.\n\n".to_string(),
    ]
}

/// Equivalent of `chmod +x`.
#[cfg(unix)]
pub fn mark_executable(executable: &Path) -> String {
    use std::os::unix::fs::PermissionsExt;

    let result = std::fs::metadata(executable).and_then(|meta| {
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(executable, perms)
    });

    match result {
        Ok(()) => {
            debug!(path = %executable.display(), "marked executable");
            "  ✓ chmod +x success\n".to_string()
        }
        Err(err) => {
            warn!(path = %executable.display(), err = %err, "chmod +x failed");
            format!("  ⚠ chmod +x failed: {err}\n")
        }
    }
}

#[cfg(not(unix))]
pub fn mark_executable(_executable: &Path) -> String {
    "  ℹ chmod +x not needed on this platform\n".to_string()
}

#[cfg(target_os = "macos")]
pub fn clear_quarantine(executable: &Path) -> String {
    use std::process::{Command, Stdio};

    let status = Command::new("/usr/bin/xattr")
        .args(["-d", "com.apple.quarantine"])
        .arg(executable)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => {
            debug!(path = %executable.display(), "quarantine attribute removed");
            "  ✓ Quarantine removed\n".to_string()
        }
        // xattr exits non-zero when the attribute is absent.
        Ok(status) => format!(
            "  ℹ Quarantine check done (status: {})\n",
            status.code().unwrap_or(-1)
        ),
        Err(err) => {
            warn!(err = %err, "xattr could not be run");
            format!("  ℹ xattr check error: {err}\n")
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn clear_quarantine(_executable: &Path) -> String {
    "  ℹ No quarantine attribute on this platform\n".to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn sets_execute_bits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tool");
        std::fs::write(&path, "#!/bin/sh\n").expect("write");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).expect("chmod");

        let line = mark_executable(&path);

        assert!(line.contains("success"), "{line}");
        let mode = std::fs::metadata(&path).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn missing_file_is_advisory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lines = repair(&dir.path().join("absent"));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("failed"));
        assert_eq!(lines[3], "Permissions fixed.\n\n");
    }
}
