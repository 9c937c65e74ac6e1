//! Persisted host state
//!
//! Small string key/value stores. Values that fail to decode fall back to
//! defaults; a bad value never prevents startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Storage keys
pub mod keys {
    /// Id of the last selected item
    pub const LAST_VIDEO_ID: &str = "lastVideoId";
    /// JSON map of item id to `{t, d}`
    pub const WATCH_POSITIONS: &str = "vh_watchpos_v1";
    pub const THEME: &str = "vh_theme_v1";
    pub const VOLUME: &str = "vh_volume_v1";
    pub const AUTOPLAY_NEXT: &str = "vh_autoplay_next_v1";
}

/// String key/value store the host persists into
pub trait PersistedState: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove a key
    fn clear(&mut self, key: &str) -> Result<()>;
}

// =============================================================================
// Stores
// =============================================================================

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistedState for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk, replaced atomically on every change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl FileStore {
    /// Open a store. A missing file starts empty; an unreadable one is
    /// replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt state file");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = values.len(), "State file opened");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write-temp then rename, so the file on disk is always a whole snapshot
    fn flush(&self) -> Result<()> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let content = serde_json::to_vec_pretty(&self.values)?;
        let storage_err = |e: std::io::Error| Error::Storage(format!("{}: {}", self.path.display(), e));

        let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
        tmp.write_all(&content).map_err(storage_err)?;
        tmp.persist(&self.path).map_err(|e| storage_err(e.error))?;
        Ok(())
    }
}

impl PersistedState for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn clear(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

// =============================================================================
// Values
// =============================================================================

/// Last known position and duration of an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchPosition {
    /// Position (seconds)
    #[serde(default)]
    pub t: f64,
    /// Duration (seconds)
    #[serde(default)]
    pub d: f64,
}

impl WatchPosition {
    pub fn new(t: f64, d: f64) -> Self {
        Self { t, d }
    }

    /// Watched share in [0, 1]; 0 when the duration is unknown
    pub fn fraction(&self) -> f64 {
        if self.d > 0.0 {
            (self.t / self.d).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Decode the watch position map, defaulting to empty
pub fn decode_watch_positions(raw: Option<&str>) -> HashMap<String, WatchPosition> {
    let Some(raw) = raw else {
        return HashMap::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring corrupt watch positions");
        HashMap::new()
    })
}

/// Color theme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Neon,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Neon => "neon",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Neon,
            Theme::Neon => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "neon" => Ok(Theme::Neon),
            other => Err(Error::InvalidConfig(format!("unknown theme '{}'", other))),
        }
    }
}
