//! Per-region server profile.

use std::collections::HashMap;

use reqwest::header::HeaderMap;

use super::cryptor::Cryptor;
use super::models::ServerRegion;

pub const DEFAULT_CP_PROFILE: &str = "production";
pub const DEFAULT_COOKIE_SIGNATURE_URL: &str = "https://issue.sekai.colorfulpalette.org/api/signature";
pub const DEFAULT_UNITY_VERSION: &str = "2022.3.21f1";

/// Everything needed to talk to one region's asset servers.
///
/// A profile is immutable for the duration of a run. Runs clone `headers`
/// before injecting session cookies.
#[derive(Debug, Clone)]
pub struct ServerProfile {
    pub region: ServerRegion,
    /// Manifest URL template.
    pub asset_info_url_template: String,
    /// Bundle download URL template. `{bundle_path}` marks where the task key goes.
    pub asset_url_template: String,
    /// Remote asset version endpoint, required for remote-version regions.
    pub version_url_template: Option<String>,
    pub fallback_app_version: Option<String>,
    /// Environment profile name looked up in `environment_hashes`.
    pub cp_asset_profile: String,
    pub environment_hashes: HashMap<String, String>,
    pub cryptor: Cryptor,
    pub required_cookies: bool,
    pub cookie_signature_url: String,
    pub headers: HeaderMap,
    /// Sent as `X-Unity-Version` when negotiating cookies.
    pub unity_version: String,
}

impl ServerProfile {
    /// A profile with empty templates, mostly useful as a base in tests.
    pub fn new(region: ServerRegion, cryptor: Cryptor) -> Self {
        Self {
            region,
            asset_info_url_template: String::new(),
            asset_url_template: String::new(),
            version_url_template: None,
            fallback_app_version: None,
            cp_asset_profile: DEFAULT_CP_PROFILE.to_string(),
            environment_hashes: HashMap::new(),
            cryptor,
            required_cookies: false,
            cookie_signature_url: DEFAULT_COOKIE_SIGNATURE_URL.to_string(),
            headers: HeaderMap::new(),
            unity_version: DEFAULT_UNITY_VERSION.to_string(),
        }
    }
}
