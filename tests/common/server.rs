//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own asset directory, pointed at
//! an `AssetFixture` for its remote data.

use super::constants::*;
use super::fixtures::AssetFixture;
use sekai_asset_updater::config::{AppConfig, AuthConfig, CliConfig, FileConfig, RegionFileConfig};
use sekai_asset_updater::server::{server::make_app, RequestsLoggingLevel, ServerConfig};
use sekai_asset_updater::updater::{
    AssetUpdater, ProxyFailoverTransport, RetryPolicy, RunCoordinator,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated asset directory
///
/// `en` is enabled against the fixture, `cn` is configured but disabled.
/// When dropped, the server shuts down and the asset directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Shared with the server, so tests can hold the run lock themselves
    pub coordinator: RunCoordinator,

    _asset_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if config resolution, port binding or server startup fails.
    pub async fn spawn(fixture: &AssetFixture) -> Self {
        let asset_dir = TempDir::new().expect("Failed to create asset dir");

        let file_config = FileConfig {
            auth: Some(AuthConfig {
                enabled: Some(true),
                user_agent_prefix: None,
                token: Some(TEST_TOKEN.to_string()),
            }),
            servers: Some(HashMap::from([
                (
                    "en".to_string(),
                    en_region(&fixture.base_url, asset_dir.path()),
                ),
                (
                    "cn".to_string(),
                    RegionFileConfig {
                        enabled: Some(false),
                        ..Default::default()
                    },
                ),
            ])),
            ..Default::default()
        };
        let config = AppConfig::resolve(&CliConfig::default(), Some(file_config))
            .expect("Failed to resolve test config");

        let transport = ProxyFailoverTransport::new(&[], Duration::from_secs(5))
            .expect("Failed to build transport");
        let updater = Arc::new(
            AssetUpdater::new(
                Arc::new(transport),
                config.regions,
                config.disabled_regions,
            )
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10))),
        );
        let coordinator = RunCoordinator::new();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let server_config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            host: "127.0.0.1".to_string(),
            port,
            auth: config.auth,
        };
        let app = make_app(server_config, updater, coordinator.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            coordinator,
            _asset_dir: asset_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn asset_dir(&self) -> &Path {
        self._asset_dir.path()
    }

    pub fn state_file(&self) -> PathBuf {
        self.asset_dir().join("downloaded_assets.json")
    }

    /// Waits for the server to become ready by polling the status endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn en_region(fixture_url: &str, asset_dir: &Path) -> RegionFileConfig {
    RegionFileConfig {
        asset_info_url_template: Some(format!(
            "{}/info/{{asset_version}}/{{asset_hash}}",
            fixture_url
        )),
        asset_url_template: Some(format!(
            "{}{}{{bundle_path}}",
            fixture_url, BUNDLE_PATH_PREFIX
        )),
        aes_key_hex: Some(AES_KEY_HEX.to_string()),
        aes_iv_hex: Some(AES_IV_HEX.to_string()),
        ondemand_prefixes: Some(vec!["music".to_string()]),
        skip_patterns: Some(vec!["^music/skip".to_string()]),
        asset_save_dir: Some(asset_dir.to_string_lossy().into_owned()),
        ..Default::default()
    }
}
