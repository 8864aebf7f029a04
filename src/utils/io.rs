//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
///
/// Non-UTF-8 content is reported as an I/O error naming the path.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Create a directory and all missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create {}", path.display())))
    })
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// Readers always see either no file or the complete content, never a
/// truncated write. Parent directories are created as needed.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    ensure_dir(parent)?;

    let tmp_path = parent.join(format!(".{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation))))?;

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::internal_io(
            e.to_string(),
            Some(format!("{} (rename)", operation)),
        ));
    }

    Ok(())
}

/// Copy a file verbatim, creating parent directories of the destination.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }

    fs::copy(from, to).map(|_| ()).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("copy {} -> {}", from.display(), to.display())),
        )
    })
}

/// True when the directory is missing or has no entries.
pub fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }

    let mut entries = fs::read_dir(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    Ok(entries.next().is_none())
}

pub fn remove_dir_all(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("remove {}", path.display())))
    })
}
