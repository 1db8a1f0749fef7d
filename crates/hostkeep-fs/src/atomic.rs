//! Temp files and atomic (temp + rename) writes

use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::FsError;

/// Attempts before giving up on finding a free temp name
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Suffix appended to every temp file
const TEMP_SUFFIX: &str = ".tmp";

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An open, uniquely named temp file
#[derive(Debug)]
pub struct TempFile {
    file: File,
    path: PathBuf,
}

impl TempFile {
    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Split into the handle and its path
    #[must_use]
    pub fn into_parts(self) -> (File, PathBuf) {
        (self.file, self.path)
    }
}

/// Create `<dir>/<pattern><digits>.tmp` exclusively
///
/// `mode` is applied at creation on Unix (subject to the umask).
///
/// # Errors
/// Returns `FsError::Open` if the directory does not exist or is not writable,
/// and `FsError::NamesExhausted` if every candidate name collided.
pub fn create_temp_file(dir: &Path, pattern: &str, mode: u32) -> Result<TempFile, FsError> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(format!("{pattern}{}{TEMP_SUFFIX}", random_digits()));

        match open_exclusive(&path, mode) {
            Ok(file) => return Ok(TempFile { file, path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(FsError::Open { path, source }),
        }
    }

    Err(FsError::NamesExhausted {
        dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
    })
}

/// Replace the contents of `path` so readers never see a partial file
///
/// The new content goes to a temp file in the same directory, which is then
/// renamed over `path`. Concurrent writers to one path each stay atomic; the
/// last rename wins.
///
/// # Errors
/// Returns the first failing step's error. The temp file is removed on
/// failure and `path` keeps its previous content.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8], mode: u32) -> Result<(), FsError> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let pattern = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let temp =
        create_temp_file(dir, &pattern, mode).map_err(|e| FsError::CreateTemp(Box::new(e)))?;
    let (mut file, temp_path) = temp.into_parts();
    let guard = RemoveOnDrop::new(&temp_path);

    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|source| FsError::Write {
            path: temp_path.clone(),
            source,
        })?;
    drop(file);

    set_mode(&temp_path, mode).map_err(|source| FsError::Permissions {
        path: temp_path.clone(),
        source,
    })?;

    fs::rename(&temp_path, path).map_err(|source| FsError::Rename {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;
    guard.disarm();

    debug!(path = %path.display(), bytes = content.len(), "atomically wrote file");

    Ok(())
}

fn random_digits() -> String {
    let mut hasher = DefaultHasher::new();
    std::process::id().hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);
    NAME_COUNTER.fetch_add(1, Ordering::Relaxed).hash(&mut hasher);
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
        .hash(&mut hasher);

    format!("{:09}", hasher.finish() % 1_000_000_000)
}

#[cfg(unix)]
fn open_exclusive(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn open_exclusive(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions)
}

/// Deletes a temp file unless the write it belongs to succeeded
struct RemoveOnDrop<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> RemoveOnDrop<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = fs::remove_file(self.path)
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
        }
    }
}
