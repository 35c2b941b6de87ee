//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{ondemand_manifest, AssetFixture, TestClient, TestServer, ASSET_VERSION};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_trigger() {
//!     let fixture = AssetFixture::spawn(&ondemand_manifest(&[]), &[]).await;
//!     let server = TestServer::spawn(&fixture).await;
//!     let client = TestClient::authorized(server.base_url.clone());
//!
//!     let response = client.update_asset("en", ASSET_VERSION, None).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use fixtures::{ondemand_manifest, test_cryptor, AssetFixture};
pub use server::TestServer;
