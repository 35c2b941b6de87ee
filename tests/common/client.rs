//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per updater endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    token: Option<String>,
}

impl TestClient {
    /// Creates a client that sends no Authorization header
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client carrying the test server's bearer token
    pub fn authorized(base_url: String) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(TEST_TOKEN.to_string());
        client
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// POST /update_asset
    pub async fn update_asset(
        &self,
        server: &str,
        asset_version: &str,
        asset_hash: Option<&str>,
    ) -> Response {
        let mut body = json!({
            "server": server,
            "assetVersion": asset_version,
        });
        if let Some(hash) = asset_hash {
            body["assetHash"] = json!(hash);
        }
        self.update_asset_raw(body.to_string()).await
    }

    /// POST /update_asset with an arbitrary body
    pub async fn update_asset_raw(&self, body: String) -> Response {
        let mut request = self
            .client
            .post(format!("{}/update_asset", self.base_url))
            .header("content-type", "application/json")
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Update request failed")
    }

    /// GET /
    pub async fn status(&self) -> Value {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Status request failed")
            .json()
            .await
            .expect("Status response is not JSON")
    }

    /// Polls the status endpoint until no run is active.
    ///
    /// # Panics
    ///
    /// Panics if the run does not finish within RUN_FINISH_TIMEOUT_MS.
    pub async fn wait_until_idle(&self) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(RUN_FINISH_TIMEOUT_MS);

        while self.status().await["running"] == json!(true) {
            if start.elapsed() > timeout {
                panic!("Run did not finish within {}ms", RUN_FINISH_TIMEOUT_MS);
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }
}
