use axum::extract::FromRef;

use crate::updater::{AssetUpdater, RunCoordinator};
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type SharedUpdater = Arc<AssetUpdater>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub updater: SharedUpdater,
    pub coordinator: RunCoordinator,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, updater: SharedUpdater, coordinator: RunCoordinator) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            updater,
            coordinator,
            hash: format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")),
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for SharedUpdater {
    fn from_ref(input: &ServerState) -> Self {
        input.updater.clone()
    }
}

impl FromRef<ServerState> for RunCoordinator {
    fn from_ref(input: &ServerState) -> Self {
        input.coordinator.clone()
    }
}
