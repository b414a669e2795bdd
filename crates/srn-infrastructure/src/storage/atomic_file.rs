//! Atomic file operations with ACID guarantees.
//!
//! Provides a thin layer for safe concurrent access to TOML and JSON files
//! used by the job repository, the configuration loader and the file-backed
//! storage adapters.

use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use srn_core::error::{Result, ScopeError};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// On-disk encoding of an [`AtomicFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
}

impl FileFormat {
    fn name(&self) -> &'static str {
        match self {
            FileFormat::Toml => "TOML",
            FileFormat::Json => "JSON",
        }
    }
}

/// Writes `bytes` to `path` atomically: tmp file in the same directory,
/// fsync, then rename over the destination.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                ScopeError::io(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut tmp_file = File::create(&tmp_path).map_err(|e| {
        ScopeError::io(format!(
            "Failed to create temp file '{}': {}",
            tmp_path.display(),
            e
        ))
    })?;
    tmp_file.write_all(bytes)?;

    // Ensure data is written to disk
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path).map_err(|e| {
        ScopeError::io(format!(
            "Failed to rename temp file '{}' to '{}': {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })?;
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| ScopeError::io(format!("Path '{}' has no parent", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| ScopeError::io(format!("Path '{}' has no file name", path.display())))?;
    Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
}

/// A handle to an atomically replaced, serde-encoded file.
///
/// Provides:
/// - **Atomicity**: Updates are all-or-nothing via tmp file + atomic rename
/// - **Isolation**: `update` holds an exclusive lock for read-modify-write
/// - **Durability**: Explicit fsync before rename
pub struct AtomicFile<T> {
    path: PathBuf,
    format: FileFormat,
    _phantom: PhantomData<T>,
}

impl<T> AtomicFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf, format: FileFormat) -> Self {
        Self {
            path,
            format,
            _phantom: PhantomData,
        }
    }

    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, FileFormat::Toml)
    }

    pub fn json(path: PathBuf) -> Self {
        Self::new(path, FileFormat::Json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ScopeError::io(format!("Failed to read '{}': {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let data = match self.format {
            FileFormat::Toml => toml::from_str(&content).map_err(|e| self.parse_error(e))?,
            FileFormat::Json => serde_json::from_str(&content).map_err(|e| self.parse_error(e))?,
        };
        Ok(Some(data))
    }

    /// Serializes and writes the file atomically.
    pub fn save(&self, data: &T) -> Result<()> {
        let content = match self.format {
            FileFormat::Toml => toml::to_string_pretty(data)?,
            FileFormat::Json => serde_json::to_string_pretty(data)?,
        };
        write_atomic(&self.path, content.as_bytes())
    }

    /// Performs a transactional update under an exclusive file lock.
    ///
    /// The closure receives the current data (or `default_value` when the
    /// file doesn't exist). If it returns `Ok`, the changes are written back
    /// atomically and the closure's value is returned.
    pub fn update<F, R>(&self, default_value: T, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut data = self.load()?.unwrap_or(default_value);
        let result = f(&mut data)?;
        self.save(&data)?;

        Ok(result)
    }

    fn parse_error(&self, e: impl std::fmt::Display) -> ScopeError {
        ScopeError::serialization(
            self.format.name(),
            format!("Failed to parse '{}': {}", self.path.display(), e),
        )
    }
}

/// An exclusive file lock released when dropped.
///
/// The lock file (`<path>.lock`) is left in place; removing it while another
/// process waits on the same inode would let two holders coexist.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn open(path: &Path) -> Result<(File, PathBuf)> {
        let lock_path = lock_path_for(path);
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                ScopeError::io(format!(
                    "Failed to open lock file '{}': {}",
                    lock_path.display(),
                    e
                ))
            })?;
        Ok((file, lock_path))
    }

    /// Blocks until the exclusive lock for `path` is held.
    pub fn acquire(path: &Path) -> Result<Self> {
        let (file, lock_path) = Self::open(path)?;
        file.lock_exclusive().map_err(|e| {
            ScopeError::io(format!(
                "Failed to acquire lock '{}': {}",
                lock_path.display(),
                e
            ))
        })?;
        Ok(Self { file, lock_path })
    }

    /// Acquires the lock without waiting; `Ok(None)` if someone else holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let (file, lock_path) = Self::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, lock_path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(ScopeError::io(format!(
                "Failed to lock '{}': {}",
                lock_path.display(),
                e
            ))),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".lock");
    path.with_file_name(name)
}
