use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::RazorError;

static RE_IMAGE_EXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(psd|psb|png|jpe?g|tiff?|gif|bmp|heic|webp)$").unwrap()
});

pub fn is_image(path: &Path) -> bool {
    path.file_name()
        .map(|name| RE_IMAGE_EXT.is_match(&name.to_string_lossy()))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by name. Not recursive.
pub fn pick_images(dir: &Path) -> Result<Vec<PathBuf>, RazorError> {
    let io_err = |source| RazorError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut picked = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_image(&path) {
            picked.push(path);
        }
    }

    picked.sort();
    Ok(picked)
}
