//! Housekeeping for the response cache directory.
//!
//! Entries are `*.json` files written by the provider client; only their
//! count, size and age matter here.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::CacheSettings;
use crate::error::ConfigError;

const ENTRY_EXTENSION: &str = "json";
const PROBE_FILE_NAME: &str = ".aicli-write-probe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub directory: PathBuf,
    pub enabled: bool,
    pub exists: bool,
    pub entries: usize,
    pub total_bytes: u64,
    pub ttl_seconds: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub struct CacheDir<'a> {
    settings: &'a CacheSettings,
    path: PathBuf,
}

struct Entry {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

impl<'a> CacheDir<'a> {
    /// Relative directories resolve against `base` (normally the working
    /// directory).
    pub fn new(settings: &'a CacheSettings, base: &Path) -> Self {
        let path = if settings.directory.is_absolute() {
            settings.directory.clone()
        } else {
            base.join(&settings.directory)
        };
        Self { settings, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::CacheIo {
            path: self.path.clone(),
            source,
        }
    }

    /// Creates the directory if needed and checks that files can be written.
    pub fn ensure_writable(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.path).map_err(|err| self.io_error(err))?;
        let probe = self.path.join(PROBE_FILE_NAME);
        fs::write(&probe, b"probe").map_err(|err| self.io_error(err))?;
        fs::remove_file(&probe).map_err(|err| self.io_error(err))
    }

    fn entries(&self) -> Result<Vec<Entry>, ConfigError> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.path).map_err(|err| self.io_error(err))? {
            let dir_entry = dir_entry.map_err(|err| self.io_error(err))?;
            let path = dir_entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let metadata = dir_entry.metadata().map_err(|err| self.io_error(err))?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(Entry {
                path,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }

    pub fn info(&self) -> Result<CacheInfo, ConfigError> {
        let entries = self.entries()?;
        let oldest = entries.iter().map(|entry| entry.modified).min();
        let newest = entries.iter().map(|entry| entry.modified).max();

        Ok(CacheInfo {
            directory: self.path.clone(),
            enabled: self.settings.enabled,
            exists: self.path.is_dir(),
            entries: entries.len(),
            total_bytes: entries.iter().map(|entry| entry.size).sum(),
            ttl_seconds: self.settings.ttl_seconds,
            oldest: oldest.map(DateTime::<Utc>::from),
            newest: newest.map(DateTime::<Utc>::from),
        })
    }

    /// Deletes every cache entry. Returns the number removed.
    pub fn clear(&self) -> Result<usize, ConfigError> {
        let entries = self.entries()?;
        for entry in &entries {
            fs::remove_file(&entry.path).map_err(|err| self.io_error(err))?;
        }
        debug!(directory = %self.path.display(), removed = entries.len(), "cleared cache");
        Ok(entries.len())
    }

    /// Deletes entries older than the configured TTL as of `now`.
    pub fn purge_expired(&self, now: SystemTime) -> Result<usize, ConfigError> {
        let ttl = Duration::from_secs(self.settings.ttl_seconds);
        let mut removed = 0;
        for entry in self.entries()? {
            let age = now.duration_since(entry.modified).unwrap_or(Duration::ZERO);
            if age > ttl {
                fs::remove_file(&entry.path).map_err(|err| self.io_error(err))?;
                removed += 1;
            }
        }
        debug!(directory = %self.path.display(), removed, "purged expired cache entries");
        Ok(removed)
    }
}
