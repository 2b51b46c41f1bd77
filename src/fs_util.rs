use std::fs;
use std::path::Path;

use crate::error::KiraError;

pub fn ensure_dir(dir: &Path) -> Result<(), KiraError> {
    fs::create_dir_all(dir)
        .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", dir.display())))
}

pub fn ensure_parent(path: &Path) -> Result<(), KiraError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// True when `path` is a regular file with at least one byte.
pub fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
