//! Path canonicalization helpers

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::error::FsError;

/// Prefix that lifts the `MAX_PATH` limit on Windows
const LONG_PATH_PREFIX: &str = r"\\?\";

/// Path convention used by [`normalize_path_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// Forward slashes, `/` root
    Unix,
    /// Backslashes with the long-path prefix
    Windows,
}

impl PathStyle {
    /// Convention of the running platform
    #[must_use]
    pub fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Unix
        }
    }
}

/// Strip leading `..` segments from a path
///
/// A leading separator is kept, so absolute paths stay absolute. Traversal
/// segments further into the path are not touched.
#[must_use]
pub fn sanitize_path(path: &str) -> String {
    let (root, mut rest) = match path.strip_prefix(['/', '\\']) {
        Some(rest) => (&path[..1], rest),
        None => ("", path),
    };

    while let Some(after) = rest.strip_prefix("..") {
        if after.is_empty() {
            rest = after;
            break;
        }
        match after.strip_prefix(['/', '\\']) {
            Some(after) => rest = after,
            None => break,
        }
    }

    format!("{root}{rest}")
}

/// Resolve `path` into an absolute, cleaned path
///
/// Relative inputs are resolved against the current working directory.
///
/// # Errors
/// Returns `FsError::WorkingDir` if a relative path is given and the working
/// directory cannot be read.
pub fn normalize_path(path: impl AsRef<Path>) -> Result<PathBuf, FsError> {
    let path = path.as_ref();
    let style = PathStyle::native();

    let cwd = if is_absolute(&path.to_string_lossy(), style) {
        PathBuf::new()
    } else {
        env::current_dir().map_err(FsError::WorkingDir)?
    };

    Ok(normalize_path_with(&path.to_string_lossy(), &cwd, style))
}

/// Pure form of [`normalize_path`] with an explicit working directory
#[must_use]
pub fn normalize_path_with(path: &str, cwd: &Path, style: PathStyle) -> PathBuf {
    match style {
        PathStyle::Unix => {
            let joined = if is_absolute(path, style) {
                PathBuf::from(path)
            } else {
                cwd.join(path)
            };
            clean(&joined)
        }
        PathStyle::Windows => {
            if path.starts_with(LONG_PATH_PREFIX) {
                return PathBuf::from(path);
            }

            let absolute = if is_absolute(path, style) {
                path.to_string()
            } else {
                let cwd = cwd.to_string_lossy();
                format!("{}/{}", cwd.trim_end_matches(['/', '\\']), path)
            };

            PathBuf::from(format!(
                "{LONG_PATH_PREFIX}{}",
                absolute.replace('/', "\\")
            ))
        }
    }
}

/// Whether a non-blank path names an existing filesystem entry
#[must_use]
pub fn exists(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if path.to_string_lossy().trim().is_empty() {
        return false;
    }
    path.exists()
}

fn is_absolute(path: &str, style: PathStyle) -> bool {
    match style {
        PathStyle::Unix => path.starts_with('/'),
        PathStyle::Windows => {
            let bytes = path.as_bytes();
            path.starts_with(['\\', '/'])
                || (bytes.len() >= 3
                    && bytes[0].is_ascii_alphabetic()
                    && bytes[1] == b':'
                    && matches!(bytes[2], b'\\' | b'/'))
        }
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
