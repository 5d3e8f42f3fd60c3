//! Exclusive lock files.
//!
//! A lock is the presence of a file created with `O_CREAT | O_EXCL`; a hit
//! on an existing file maps to [`Error::Lock`], everything else to
//! [`Error::Io`]. Release is by unlink, or (for the list-file lock) by
//! promoting the written contents onto the target with `rename`, which is
//! the linearisation point of every stack mutation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::Error;

/// Appends `.lock` to a path, keeping any existing extension
/// (`a-b.ref` → `a-b.ref.lock`).
pub fn lock_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".lock");
    PathBuf::from(s)
}

/// An exclusively created lock file.
///
/// Dropping an uncommitted lock unlinks it, so every early return and error
/// path releases the lock. [`commit`](LockFile::commit) consumes the lock by
/// renaming it onto its target; after that, drop touches nothing (the path
/// may legitimately be re-created by the next mutator).
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl LockFile {
    /// Acquires the lock, keeping the fd open for writing.
    pub fn acquire(path: PathBuf) -> Result<Self, Error> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => Ok(Self {
                path,
                file: Some(file),
                committed: false,
            }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::Lock),
            Err(e) => Err(e.into()),
        }
    }

    /// Acquires the lock and closes the fd immediately: the file's presence
    /// alone is the reservation. Used for the per-table locks taken during
    /// compaction.
    pub fn reserve(path: PathBuf) -> Result<Self, Error> {
        let mut lock = Self::acquire(path)?;
        lock.file = None;
        Ok(lock)
    }

    /// Writes `contents` into the lock file, closes it, and promotes it onto
    /// `dest` by rename. The fd is closed *before* the rename so it cannot
    /// outlive the promotion.
    pub fn commit(mut self, contents: &[u8], dest: &Path) -> Result<(), Error> {
        let mut file = match self.file.take() {
            Some(f) => f,
            None => {
                return Err(Error::Api(
                    "cannot commit a reservation-only lock".to_string(),
                ))
            }
        };
        file.write_all(contents)?;
        drop(file);
        fs::rename(&self.path, dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            // Close before unlink; removal is best effort.
            self.file.take();
            let _ = fs::remove_file(&self.path);
        }
    }
}
