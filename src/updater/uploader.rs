//! Pushes exported files to remote storages through an external copy program.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::errors::UploadError;
use crate::extraction::{CommandTemplate, DST_PLACEHOLDER, SRC_PLACEHOLDER};

pub const DEFAULT_CONCURRENT_UPLOADS: usize = 4;

/// One destination, e.g. an rclone remote. `command` gets `src` and `dst` substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStorage {
    pub kind: String,
    pub base: String,
    pub command: CommandTemplate,
}

/// Storages plus the upload permits shared by every region.
#[derive(Debug, Clone)]
pub struct UploadTargets {
    storages: Arc<Vec<RemoteStorage>>,
    permits: Arc<Semaphore>,
}

impl UploadTargets {
    pub fn new(storages: Vec<RemoteStorage>, concurrent_uploads: usize) -> Self {
        Self {
            storages: Arc::new(storages),
            permits: Arc::new(Semaphore::new(concurrent_uploads.max(1))),
        }
    }

    pub fn storages(&self) -> &[RemoteStorage] {
        &self.storages
    }
}

pub struct CloudUploader {
    targets: UploadTargets,
    local_root: PathBuf,
    remove_local: bool,
}

impl CloudUploader {
    /// Remote paths mirror each file's location under `local_root`.
    pub fn new(targets: UploadTargets, local_root: impl Into<PathBuf>) -> Self {
        Self {
            targets,
            local_root: local_root.into(),
            remove_local: false,
        }
    }

    /// Delete each local file once every storage has it.
    pub fn with_remove_local(mut self, remove_local: bool) -> Self {
        self.remove_local = remove_local;
        self
    }

    pub fn remote_path(&self, base: &str, file: &Path) -> Result<String, UploadError> {
        let relative = file
            .strip_prefix(&self.local_root)
            .map_err(|_| UploadError::OutsideRoot {
                file: file.to_path_buf(),
                root: self.local_root.clone(),
            })?;
        let parts: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Ok(format!("{}/{}", base.trim_end_matches('/'), parts.join("/")))
    }

    /// Upload every file to every storage. Returns one error per file that did not make it.
    pub async fn upload(&self, files: &[PathBuf]) -> Vec<UploadError> {
        let results = join_all(files.iter().map(|file| self.upload_file(file))).await;
        let errors: Vec<UploadError> = results.into_iter().filter_map(Result::err).collect();
        info!(
            "Uploaded {}/{} files to {} storages",
            files.len() - errors.len(),
            files.len(),
            self.targets.storages.len()
        );
        errors
    }

    async fn upload_file(&self, file: &Path) -> Result<(), UploadError> {
        let local = file.to_string_lossy().into_owned();
        for storage in self.targets.storages.iter() {
            let remote = self.remote_path(&storage.base, file)?;
            let _permit = self.targets.permits.acquire().await.ok();
            storage
                .command
                .run(&[
                    (SRC_PLACEHOLDER, local.as_str()),
                    (DST_PLACEHOLDER, remote.as_str()),
                ])
                .await
                .map_err(|source| UploadError::Command {
                    file: file.to_path_buf(),
                    remote: remote.clone(),
                    source,
                })?;
            debug!("Uploaded {:?} to {} ({})", file, remote, storage.kind);
        }

        if self.remove_local {
            tokio::fs::remove_file(file)
                .await
                .map_err(|source| UploadError::RemoveLocal {
                    file: file.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }
}
