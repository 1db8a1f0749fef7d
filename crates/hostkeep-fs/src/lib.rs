//! hostkeep-fs: path normalization and crash-safe file writes
//!
//! Everything here is synchronous and dependency-free apart from logging, so it
//! can be used from the task worker as well as from blocking contexts.

pub mod atomic;
pub mod error;
pub mod path;

pub use atomic::{TempFile, atomic_write, create_temp_file};
pub use error::{FsError, safe_error_string};
pub use path::{PathStyle, exists, normalize_path, normalize_path_with, sanitize_path};
