//! Shared constants for end-to-end tests
//!
//! When test data changes (tokens, versions, keys), update only this file.

// ============================================================================
// Trigger Authorization
// ============================================================================

/// Bearer token accepted by the test server
pub const TEST_TOKEN: &str = "test-token";

// ============================================================================
// Asset Server Data
// ============================================================================

/// AES-128 key and IV the fixture manifest is encrypted with
pub const AES_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f";
pub const AES_IV_HEX: &str = "f0e0d0c0b0a090807060504030201000";

/// Asset version requested by the tests
pub const ASSET_VERSION: &str = "4.1.0";

/// Asset hash requested by the tests
pub const ASSET_HASH: &str = "abc123";

/// Path the fixture serves the manifest at for ASSET_VERSION/ASSET_HASH
pub const MANIFEST_PATH: &str = "/info/4.1.0/abc123";

/// Prefix of bundle download paths on the fixture
pub const BUNDLE_PATH_PREFIX: &str = "/bundles/";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for a server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness / idleness polls (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Maximum time to wait for a run to finish (milliseconds)
pub const RUN_FINISH_TIMEOUT_MS: u64 = 10000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
