// Query result caches: a directory of JSON entry files with write locking, and an in-memory map.
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use libc::{EACCES, EPERM};

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Payload;

pub const DEFAULT_PERMISSIONS: u32 = 0o764;

/// Payload storage keyed by derived cache keys.
///
/// Read failures are reported as misses; write and clear failures are errors.
pub trait CacheStore {
    fn get(&self, key: &str) -> Option<Payload>;
    fn set(&mut self, key: &str, payload: &Payload) -> Result<(), Error>;
    fn has(&self, key: &str) -> bool;
    fn clear(&mut self) -> Result<(), Error>;
}

/// One file per key under `dir`.
///
/// Writers hold an exclusive lock on the entry file while writing; readers take
/// no lock, so a read racing a write can observe a stale or partial entry. A
/// partial entry fails to decode and is treated as a miss.
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
    permissions: u32,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            permissions: DEFAULT_PERMISSIONS,
        }
    }

    pub fn with_permissions(mut self, mode: u32) -> Self {
        self.permissions = mode;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn ensure_dir(&self) -> Result<(), Error> {
        if self.dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)
            .map_err(|err| io_error(err, &self.dir, "failed to create cache directory"))?;
        apply_permissions(&self.dir, self.permissions)
            .map_err(|err| io_error(err, &self.dir, "failed to set cache directory permissions"))
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<Payload> {
        let path = self.entry_path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(payload) => Some(payload),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cache entry undecodable");
                None
            }
        }
    }

    fn set(&mut self, key: &str, payload: &Payload) -> Result<(), Error> {
        self.ensure_dir()?;
        let path = self.entry_path(key);
        let encoded = serde_json::to_vec(payload).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode cache entry")
                .with_path(&path)
                .with_source(err)
        })?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| io_error(err, &path, "unable to open cache file"))?;
        {
            let _lock = write_lock(&file, &path)?;
            file.set_len(0)
                .map_err(|err| io_error(err, &path, "failed to truncate cache file"))?;
            let mut writer = &file;
            writer
                .write_all(&encoded)
                .map_err(|err| io_error(err, &path, "error writing to cache"))?;
            writer
                .flush()
                .map_err(|err| io_error(err, &path, "error writing to cache"))?;
        }
        apply_permissions(&path, self.permissions)
            .map_err(|err| io_error(err, &path, "failed to set cache file permissions"))?;
        tracing::debug!(path = %path.display(), bytes = encoded.len(), "cache entry written");
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.entry_path(key).is_file()
    }

    fn clear(&mut self) -> Result<(), Error> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(io_error(err, &self.dir, "error clearing cache")),
        };
        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|err| io_error(err, &self.dir, "error clearing cache"))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            fs::remove_file(&path).map_err(|err| io_error(err, &path, "error clearing cache"))?;
            removed += 1;
        }
        tracing::debug!(dir = %self.dir.display(), removed, "cache cleared");
        Ok(())
    }
}

struct WriteLock<'a> {
    file: &'a File,
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}

fn write_lock<'a>(file: &'a File, path: &Path) -> Result<WriteLock<'a>, Error> {
    file.lock_exclusive().map_err(|err| {
        Error::new(lock_error_kind(&err))
            .with_message("failed to lock cache file")
            .with_path(path)
            .with_source(err)
    })?;
    Ok(WriteLock { file })
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::CacheIo,
    }
}

fn io_error(err: io::Error, path: &Path, message: &str) -> Error {
    let kind = match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::CacheIo,
    };
    Error::new(kind)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Payload>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Payload> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, payload: &Payload) -> Result<(), Error> {
        self.entries.insert(key.to_string(), payload.clone());
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.entries.clear();
        Ok(())
    }
}
