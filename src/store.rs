//! On-disk persistence of the session objective.
//!
//! One string under one path, surviving restarts, no expiry. The browser
//! original keeps this in localStorage under a fixed key.

use std::fs;
use std::path::{Path, PathBuf};

use crate::api::BridgeError;

/// Default store location, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = ".aibridge_objective";

/// Get/set of the persisted objective string.
#[derive(Debug, Clone)]
pub struct ObjectiveStore {
    path: PathBuf,
}

impl ObjectiveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ObjectiveStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored objective. `Ok(None)` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<String>, BridgeError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Store {
                path: self.path.display().to_string(),
                detail: e.to_string(),
            }),
        }
    }

    /// Persist `objective`, creating parent directories as needed.
    pub fn save(&self, objective: &str) -> Result<(), BridgeError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| BridgeError::Store {
                    path: self.path.display().to_string(),
                    detail: e.to_string(),
                })?;
            }
        }
        fs::write(&self.path, objective).map_err(|e| BridgeError::Store {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })
    }
}
