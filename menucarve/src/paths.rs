//! Output-path hygiene.
//!
//! Every path the stage writes must stay under the stage output directory;
//! anything else is an invariant violation, not a recoverable error.

use std::path::{Component, Path, PathBuf};

use crate::errors::InvariantViolation;

/// Strip characters that are unsafe in filenames and collapse whitespace to
/// underscores.  Empty results become `"untitled"`.
pub fn sanitize_filename(label: &str) -> String {
    let mut cleaned = String::with_capacity(label.len());
    for ch in label.chars() {
        match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => {}
            c if c.is_whitespace() => {
                if !cleaned.ends_with('_') {
                    cleaned.push('_');
                }
            }
            c if c.is_control() => {}
            c => cleaned.push(c),
        }
    }
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lexically normalize a path, resolving `.` and `..` components without
/// touching the filesystem.  Returns `None` when `..` escapes the root.
fn lexical_normalize(path: &Path) -> Option<PathBuf> {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normal.pop() {
                    return None;
                }
            }
            other => normal.push(other),
        }
    }
    Some(normal)
}

/// Verify that `path` stays inside `base` after lexical normalization and
/// return its normalized form.  `path` is expected to have been built by
/// joining onto `base`; both may be relative or absolute, but must agree.
pub fn ensure_inside(path: &Path, base: &Path) -> Result<PathBuf, InvariantViolation> {
    let base = lexical_normalize(base)
        .ok_or_else(|| InvariantViolation::new(format!("bad base directory: {}", base.display())))?;
    let normal = lexical_normalize(path).ok_or_else(|| {
        InvariantViolation::new(format!("path escapes output directory: {}", path.display()))
    })?;
    if normal == base || normal.starts_with(&base) {
        Ok(normal)
    } else {
        Err(InvariantViolation::new(format!(
            "path escapes output directory: {}",
            path.display()
        )))
    }
}
