//! Path checks for attachments read from disk.
//!
//! Two layers: a lexical pass over the caller's relative path, then a
//! containment check on the canonical path (after symlinks are resolved).
//! Containment is component-wise, so `/data/attachments-evil` is never
//! inside `/data/attachments`.

use std::path::{Component, Path, PathBuf};

use crate::errors::{ConnectorError, ConnectorResult};

/// Normalizes a caller-supplied relative path.
///
/// Rejects empty, absolute and drive/UNC paths, and any `..` segment:
/// one that climbs above the root is a traversal attempt, any other is
/// merely invalid input.
pub fn normalize_relative(raw: &str) -> ConnectorResult<PathBuf> {
    if raw.trim().is_empty() {
        return Err(ConnectorError::validation(
            "Attachment 'path' must be a non-empty string",
        ));
    }

    if raw.contains('\0') {
        return Err(ConnectorError::validation(
            "Attachment 'path' must not contain NUL bytes",
        ));
    }

    if is_windows_style_absolute(raw) {
        return Err(ConnectorError::validation(format!(
            "Windows drive or UNC paths are not allowed: {:?}",
            raw
        )));
    }

    let path = Path::new(raw);
    if path.has_root() {
        return Err(ConnectorError::validation(format!(
            "Attachment path must be relative to the attachments folder, got {:?}",
            raw
        )));
    }

    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    let mut saw_parent = false;

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(segment) => {
                normalized.push(segment);
                depth += 1;
            }
            Component::ParentDir => {
                if depth == 0 {
                    return Err(ConnectorError::path_traversal(format!(
                        "Attachment path escapes the attachments folder: {:?}",
                        raw
                    )));
                }
                normalized.pop();
                depth -= 1;
                saw_parent = true;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ConnectorError::validation(format!(
                    "Attachment path must be relative to the attachments folder, got {:?}",
                    raw
                )));
            }
        }
    }

    if saw_parent {
        return Err(ConnectorError::validation(format!(
            "Attachment path must not contain '..' segments: {:?}",
            raw
        )));
    }

    if normalized.as_os_str().is_empty() {
        return Err(ConnectorError::validation(format!(
            "Attachment path does not name a file: {:?}",
            raw
        )));
    }

    Ok(normalized)
}

/// Fails unless `candidate` lies inside `root`. Both must be canonical.
pub fn ensure_within(root: &Path, candidate: &Path) -> ConnectorResult<()> {
    if candidate.starts_with(root) {
        Ok(())
    } else {
        Err(ConnectorError::path_traversal(format!(
            "Attachment resolves outside the attachments folder '{}'",
            root.display()
        )))
    }
}

fn is_windows_style_absolute(raw: &str) -> bool {
    let head: String = raw.chars().take(3).collect();
    head.contains(':') || raw.starts_with("\\\\")
}
