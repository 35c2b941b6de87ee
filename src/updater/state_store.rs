//! Persisted record of which bundle hashes have been extracted.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::models::DownloadState;

/// JSON file mapping bundle name to the hash last extracted.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state. A missing file is created as `{}`; a corrupt one is treated as empty.
    pub async fn load(&self) -> std::io::Result<DownloadState> {
        if !tokio::fs::try_exists(&self.path).await? {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&self.path, b"{}").await?;
            debug!("Created empty state file at {:?}", self.path);
            return Ok(DownloadState::new());
        }

        let data = tokio::fs::read(&self.path).await?;
        match serde_json::from_slice::<DownloadState>(&data) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(
                    "State file {:?} is corrupt ({}), starting from an empty state",
                    self.path, e
                );
                Ok(DownloadState::new())
            }
        }
    }

    /// Overwrite the state file wholesale. Writes go to a temp file that replaces the target.
    pub async fn save(&self, state: &DownloadState) -> std::io::Result<()> {
        let sorted: BTreeMap<&String, &String> = state.iter().collect();
        let data = serde_json::to_vec(&sorted)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)?;
            let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)?
    }
}
