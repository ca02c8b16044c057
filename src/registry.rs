//! Profile registry.
//!
//! Tracks which profile is active and which profile names are known,
//! persisted as a small JSON file so the choice survives restart. Writes go
//! to a temp file first and are renamed into place, so a crash mid-save
//! leaves the previous registry intact.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Profile used when no profile was ever set.
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    active: String,
    known: BTreeSet<String>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        RegistryFile {
            active: DEFAULT_PROFILE.to_string(),
            known: BTreeSet::from([DEFAULT_PROFILE.to_string()]),
        }
    }
}

pub struct Registry {
    path: PathBuf,
    state: RegistryFile,
}

impl Registry {
    /// Load the registry from disk, starting from defaults if the file does
    /// not exist yet. A corrupt file is replaced with defaults rather than
    /// blocking every operation behind it.
    pub fn open(path: &Path) -> Result<Self> {
        let state = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("registry file {} unreadable ({e}), resetting", path.display());
                RegistryFile::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryFile::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Registry {
            path: path.to_path_buf(),
            state,
        })
    }

    /// Switch the active profile, creating it implicitly if unknown.
    /// Always succeeds (modulo disk errors) and persists immediately.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.state.active = name.to_string();
        self.state.known.insert(name.to_string());
        self.save()?;
        debug!("active profile -> {name}");
        Ok(())
    }

    pub fn get_active(&self) -> &str {
        &self.state.active
    }

    /// Known profile names. Callers union this with the store's profiles to
    /// also pick up names that only exist as stored snapshots.
    pub fn list(&self) -> Vec<String> {
        self.state.known.iter().cloned().collect()
    }

    /// Forget a profile. If it was active, fall back to the default profile.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.state.known.remove(name);
        if self.state.active == name {
            self.state.active = DEFAULT_PROFILE.to_string();
            self.state.known.insert(DEFAULT_PROFILE.to_string());
        }
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&self.state)?.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
