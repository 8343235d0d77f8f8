//! JSON file backend with a short-TTL read cache.
//!
//! Writes go to `<file>.tmp` and are renamed over the target, so readers
//! never observe a partially written document. An absent file is replaced by
//! defaults on first load; a present but malformed file is an error.
//!
//! Read-modify-write mutations are serialized within one process. Separate
//! processes writing the same file are not coordinated; use
//! [`JsonFileStore::save_if_version`] to detect a concurrent writer.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use antislot_core::ruleset::{now_millis, Metadata, Versioned};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{Result, StorageError};

/// Writes `bytes` to `path` via a sibling temp file and rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

struct CachedDocument<D> {
    data: D,
    cached_at: Instant,
}

/// A versioned document persisted as one JSON file.
pub struct JsonFileStore<D> {
    path: PathBuf,
    auto_version_bump: bool,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedDocument<D>>>,
    write_lock: Mutex<()>,
}

impl<D: Versioned> JsonFileStore<D> {
    /// Creates a store for `path`. Nothing is read until the first load.
    pub fn new(path: impl Into<PathBuf>, auto_version_bump: bool, cache_ttl: Duration) -> Self {
        Self {
            path: path.into(),
            auto_version_bump,
            cache_ttl,
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the document, from cache if fresh.
    pub fn load(&self) -> Result<D> {
        if let Some(cached) = self.cache.read().as_ref() {
            if cached.cached_at.elapsed() < self.cache_ttl {
                return Ok(cached.data.clone());
            }
        }

        // A miss may create the default file; keep that out of a writer's way.
        let _guard = self.write_lock.lock();
        let data = self.read_or_create()?;
        self.set_cache(data.clone());
        Ok(data)
    }

    /// Validates and atomically writes the document, then refreshes the cache.
    pub fn save(&self, data: &D) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write(data)
    }

    /// Saves only if the on-disk version still equals `expected`.
    pub fn save_if_version(&self, data: &D, expected: u64) -> Result<()> {
        let _guard = self.write_lock.lock();
        let found = self.read_or_create()?.metadata().version;
        if found != expected {
            return Err(StorageError::VersionConflict { expected, found });
        }
        self.write(data)
    }

    /// Version and timestamp.
    pub fn metadata(&self) -> Result<Metadata> {
        Ok(self.load()?.metadata())
    }

    /// Unconditionally increments the version.
    pub fn bump_version(&self) -> Result<u64> {
        self.update(|data, now| {
            let version = data.bump(now);
            info!(kind = D::KIND, version, "Version bumped");
            (version, Change::AlreadyVersioned)
        })
    }

    /// Drops the cached copy so the next load reads the file.
    pub fn invalidate_cache(&self) {
        *self.cache.write() = None;
    }

    /// Runs a read-modify-write under the write lock.
    ///
    /// The closure reports whether it changed the document. Changed documents
    /// get a version bump (if enabled) or a fresh timestamp and are saved.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut D, i64) -> (R, Change)) -> Result<R> {
        let _guard = self.write_lock.lock();
        let mut data = self.read_or_create()?;
        let now = now_millis();

        let (result, change) = f(&mut data, now);
        match change {
            Change::None => return Ok(result),
            Change::Modified if self.auto_version_bump => {
                data.bump(now);
            }
            Change::Modified => data.touch(now),
            Change::AlreadyVersioned => {}
        }

        self.write(&data)?;
        Ok(result)
    }

    fn write(&self, data: &D) -> Result<()> {
        data.validate()?;
        let json = serde_json::to_vec_pretty(data)?;
        atomic_write(&self.path, &json)?;
        debug!(kind = D::KIND, path = %self.path.display(), version = data.metadata().version, "Saved");
        self.set_cache(data.clone());
        Ok(())
    }

    fn read_or_create(&self) -> Result<D> {
        match fs::read(&self.path) {
            Ok(bytes) => self.parse(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let data = D::defaults(now_millis());
                info!(kind = D::KIND, path = %self.path.display(), "Creating default file");
                self.write(&data)?;
                Ok(data)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<D> {
        let data: D = serde_json::from_slice(bytes).map_err(|e| {
            StorageError::Validation(format!(
                "{} file {} is malformed: {e}",
                D::KIND,
                self.path.display()
            ))
        })?;
        data.validate()?;
        Ok(data)
    }

    fn set_cache(&self, data: D) {
        *self.cache.write() = Some(CachedDocument {
            data,
            cached_at: Instant::now(),
        });
    }
}

/// What a mutation did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    /// Nothing changed; skip the write.
    None,
    /// Content changed; apply the version policy.
    Modified,
    /// The closure already set the version.
    AlreadyVersioned,
}
