//! Fake remote asset server
//!
//! Serves an encrypted manifest and obfuscated bundles from a tiny axum router
//! bound to a random local port.

use super::constants::*;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use sekai_asset_updater::updater::{
    obfuscate, BundleEntry, BundleManifest, Cryptor, CATEGORY_ONDEMAND,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

struct FixtureState {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
    delay: Duration,
}

/// Remote asset server double. Shuts down when dropped.
pub struct AssetFixture {
    /// Base URL, e.g. "http://127.0.0.1:12345"
    pub base_url: String,
    state: Arc<FixtureState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl AssetFixture {
    /// Serve `manifest` at MANIFEST_PATH and each (name, plain contents) bundle,
    /// obfuscated, under BUNDLE_PATH_PREFIX.
    pub async fn spawn(manifest: &BundleManifest, bundles: &[(&str, &str)]) -> Self {
        Self::spawn_with_delay(manifest, bundles, Duration::ZERO).await
    }

    /// Like `spawn`, but every response is held back for `delay`.
    pub async fn spawn_with_delay(
        manifest: &BundleManifest,
        bundles: &[(&str, &str)],
        delay: Duration,
    ) -> Self {
        let mut bodies = HashMap::new();
        bodies.insert(MANIFEST_PATH.to_string(), encrypt_manifest(manifest));
        for (name, data) in bundles {
            bodies.insert(format!("{}{}", BUNDLE_PATH_PREFIX, name), obfuscate(data.as_bytes()));
        }

        let state = Arc::new(FixtureState {
            bodies,
            requests: Mutex::new(Vec::new()),
            delay,
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fixture to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get fixture address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = Router::new()
            .fallback(serve_fixture)
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fixture server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Paths requested so far, in order.
    pub fn requested_paths(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for AssetFixture {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve_fixture(State(state): State<Arc<FixtureState>>, uri: Uri) -> Response {
    state.requests.lock().unwrap().push(uri.path().to_string());
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    match state.bodies.get(uri.path()) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A manifest with every bundle in the OnDemand category.
pub fn ondemand_manifest(entries: &[(&str, &str)]) -> BundleManifest {
    let bundles: BTreeMap<String, BundleEntry> = entries
        .iter()
        .map(|(name, hash)| {
            (
                name.to_string(),
                BundleEntry {
                    category: CATEGORY_ONDEMAND.to_string(),
                    hash: hash.to_string(),
                    download_path: None,
                },
            )
        })
        .collect();
    BundleManifest { bundles }
}

pub fn test_cryptor() -> Cryptor {
    Cryptor::from_hex(AES_KEY_HEX, AES_IV_HEX).expect("Invalid test key")
}

fn encrypt_manifest(manifest: &BundleManifest) -> Vec<u8> {
    test_cryptor()
        .pack(manifest)
        .expect("Failed to encrypt test manifest")
}
