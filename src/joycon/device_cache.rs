//! Known controller cache
//!
//! This module keeps a local record of previously negotiated controllers,
//! keyed by hardware serial, so later sessions can log a friendly name
//! before negotiation completes.

use crate::joycon::types::ControllerKind;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Cache file name
const CACHE_FILENAME: &str = "joycon_cache.json";

/// Get the cache file path (next to the executable, or the current dir)
pub fn default_cache_path() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join(CACHE_FILENAME);
        }
    }

    PathBuf::from(CACHE_FILENAME)
}

/// Cached controller information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedController {
    /// Hardware serial (the Bluetooth address for Joy-Cons)
    pub serial: String,

    pub kind: ControllerKind,

    /// Body colour name, if it was read
    #[serde(default)]
    pub color: Option<String>,

    /// Last seen timestamp (Unix seconds)
    #[serde(default)]
    pub last_seen: u64,
}

impl CachedController {
    /// "Neon Blue Joy-Con (L)" or just the kind when the colour is unknown
    pub fn display_name(&self) -> String {
        match &self.color {
            Some(color) => format!("{} {}", color, self.kind),
            None => self.kind.to_string(),
        }
    }
}

/// Controller cache storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerCache {
    /// Map of serial -> controller info
    pub controllers: HashMap<String, CachedController>,
}

impl ControllerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache from the default location
    pub fn load() -> Self {
        Self::load_from(&default_cache_path())
    }

    /// Load the cache from `path`. A missing or corrupt file yields an
    /// empty cache.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cache) => {
                    debug!("Loaded controller cache from: {}", path.display());
                    cache
                }
                Err(e) => {
                    warn!("Failed to parse cache file: {}", e);
                    Self::new()
                }
            },
            Err(_) => {
                debug!("No existing cache file found at: {}", path.display());
                Self::new()
            }
        }
    }

    /// Save the cache to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&default_cache_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved controller cache to: {}", path.display());
        Ok(())
    }

    /// Add or update a controller
    pub fn add_controller(&mut self, serial: &str, kind: ControllerKind, color: Option<String>) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let cached = CachedController {
            serial: serial.to_string(),
            kind,
            color,
            last_seen: timestamp,
        };

        if !self.controllers.contains_key(serial) {
            info!("Caching controller: {} ({})", serial, cached.display_name());
        }
        self.controllers.insert(serial.to_string(), cached);
    }

    pub fn get_controller(&self, serial: &str) -> Option<&CachedController> {
        self.controllers.get(serial)
    }

    /// All cached controllers of one kind
    pub fn get_by_kind(&self, kind: ControllerKind) -> Vec<&CachedController> {
        self.controllers.values().filter(|c| c.kind == kind).collect()
    }

    pub fn remove_controller(&mut self, serial: &str) -> Option<CachedController> {
        self.controllers.remove(serial)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
