//! Input validation primitives for run roots.
//!
//! Paths are compared in absolute, normalized form so `./site` and
//! `site/../site` name the same directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Require `path` to be an existing directory; returns its canonical form.
pub fn require_dir(path: &Path, field: &str) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(Error::validation_invalid_argument(
            field,
            format!("Not a directory: {}", path.display()),
            None,
            None,
        ));
    }

    path.canonicalize().map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("resolve {}", path.display())))
    })
}

/// Absolute form of a path that may not exist yet.
///
/// The longest existing ancestor is canonicalized; the rest is appended
/// lexically with `.` and `..` resolved.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::internal_io(e.to_string(), Some("read current directory".to_string())))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }

    let mut resolved = existing.canonicalize().map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("resolve {}", existing.display())))
    })?;
    for name in rest.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Reject an output root that would overwrite or contain the input.
///
/// An output nested inside the input is allowed; the walker skips it.
pub fn require_disjoint_output(input: &Path, output: &Path) -> Result<()> {
    if input == output {
        return Err(Error::validation_invalid_argument(
            "output",
            "Output directory must differ from the input directory",
            None,
            None,
        ));
    }

    if input.starts_with(output) {
        return Err(Error::validation_invalid_argument(
            "output",
            format!(
                "Output directory {} contains the input directory {}",
                output.display(),
                input.display()
            ),
            None,
            None,
        ));
    }

    Ok(())
}
