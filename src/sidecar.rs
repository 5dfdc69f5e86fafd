/*!
 * Key-value sidecar for small auxiliary state.
 *
 * The sidecar holds activity progress and the first-run flag. It lives
 * beside the structured store, is not part of its transactions, and is
 * persisted as one flat JSON object of string keys to string values.
 */

use anyhow::{Context, Result};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::activities::{self, Progress};

/// Key holding the progress map as JSON
pub const PROGRESS_KEY: &str = "minasbate-app-progress";

/// Key set once the first-run seed has been attempted
pub const INITIALIZED_KEY: &str = "minasbate-app-initialized";

/// Default sidecar filename
pub const DEFAULT_SIDECAR_FILENAME: &str = "minasbate-app-storage.json";

/// Persistent string map with atomic file writes
#[derive(Debug)]
pub struct Sidecar {
    /// Backing file, `None` for an in-memory sidecar
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl Sidecar {
    /// Open the sidecar file, starting empty when it is missing or unreadable
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read sidecar: {:?}", path))?;
            match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring unreadable sidecar {:?}: {}", path, e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!("Opened sidecar {:?} with {} keys", path, entries.len());
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Create a sidecar that is never written to disk (for testing)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Backing file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Store a value and persist the whole map
    ///
    /// On a failed write the previous value is put back.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Remove a key and persist the whole map
    ///
    /// On a failed write the key keeps its value.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Stored progress, empty when absent or unparsable
    pub fn progress(&self) -> Progress {
        let Some(raw) = self.get(PROGRESS_KEY) else {
            return Progress::new();
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => activities::progress_from_value(&value),
            Err(e) => {
                error!("Failed to parse stored progress: {}", e);
                Progress::new()
            }
        }
    }

    pub fn set_progress(&self, progress: &Progress) -> Result<()> {
        let raw = serde_json::to_string(progress).context("Failed to encode progress")?;
        self.set(PROGRESS_KEY, &raw)?;
        debug!("Saved progress for {} activities", progress.len());
        Ok(())
    }

    pub fn clear_progress(&self) -> Result<()> {
        self.remove(PROGRESS_KEY)
    }

    // =========================================================================
    // First-run flag
    // =========================================================================

    pub fn is_initialized(&self) -> bool {
        self.get(INITIALIZED_KEY).as_deref() == Some("true")
    }

    pub fn mark_initialized(&self) -> Result<()> {
        self.set(INITIALIZED_KEY, "true")
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create sidecar directory: {:?}", parent))?;

        let content = serde_json::to_string_pretty(entries)?;
        let mut temp_file = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp_file.write_all(content.as_bytes())?;
        temp_file
            .persist(path)
            .with_context(|| format!("Failed to write sidecar: {:?}", path))?;

        Ok(())
    }
}
