//! Data models for the asset updater.
//!
//! Defines regions, manifest entries, download tasks and run summaries.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Game server region an updater run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerRegion {
    Jp,
    En,
    Tw,
    Kr,
    Cn,
}

impl ServerRegion {
    pub const ALL: [ServerRegion; 5] = [
        ServerRegion::Jp,
        ServerRegion::En,
        ServerRegion::Tw,
        ServerRegion::Kr,
        ServerRegion::Cn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerRegion::Jp => "jp",
            ServerRegion::En => "en",
            ServerRegion::Tw => "tw",
            ServerRegion::Kr => "kr",
            ServerRegion::Cn => "cn",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "jp" => Some(ServerRegion::Jp),
            "en" => Some(ServerRegion::En),
            "tw" => Some(ServerRegion::Tw),
            "kr" => Some(ServerRegion::Kr),
            "cn" => Some(ServerRegion::Cn),
            _ => None,
        }
    }

    /// How this region's manifest/download URLs get their version tokens.
    pub fn version_variant(&self) -> VersionVariant {
        match self {
            ServerRegion::En => VersionVariant::HashEmbedded,
            ServerRegion::Jp => VersionVariant::ProfileKeyed,
            ServerRegion::Tw | ServerRegion::Kr | ServerRegion::Cn => {
                VersionVariant::RemoteVersion
            }
        }
    }

    /// How download task keys are built for this region.
    pub fn key_layout(&self) -> KeyLayout {
        match self {
            ServerRegion::Jp | ServerRegion::En => KeyLayout::BundleName,
            ServerRegion::Tw | ServerRegion::Kr | ServerRegion::Cn => KeyLayout::DownloadPath,
        }
    }

    /// Whether the manifest URL carries the cache-busting time argument.
    pub fn timestamps_manifest_url(&self) -> bool {
        matches!(self, ServerRegion::Jp | ServerRegion::En)
    }
}

impl std::fmt::Display for ServerRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Version resolution protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionVariant {
    /// Version and hash go straight into the URL templates.
    HashEmbedded,
    /// An environment hash is looked up by profile name.
    ProfileKeyed,
    /// The asset version is fetched from a remote endpoint.
    RemoteVersion,
}

/// Layout of download task keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    /// The key is the bundle name.
    BundleName,
    /// The key is `downloadPath/bundleName`.
    DownloadPath,
}

/// Manifest category of a bundle.
pub const CATEGORY_STARTAPP: &str = "StartApp";
pub const CATEGORY_ONDEMAND: &str = "OnDemand";

/// One bundle entry in the decrypted manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub category: String,
    pub hash: String,
    #[serde(
        rename = "downloadPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_path: Option<String>,
}

/// The decrypted asset bundle manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundles: BTreeMap<String, BundleEntry>,
}

/// Persisted bundle name -> hash mapping of fully extracted bundles.
pub type DownloadState = HashMap<String, String>;

/// Category name -> allowed bundle name prefixes.
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    prefixes: HashMap<String, Vec<String>>,
}

impl CategoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: &str, prefixes: &[&str]) -> Self {
        self.insert(
            category.to_string(),
            prefixes.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn insert(&mut self, category: String, prefixes: Vec<String>) {
        self.prefixes.insert(category, prefixes);
    }

    /// Returns the prefixes for a category, or None if the category is not recognized.
    pub fn prefixes_for(&self, category: &str) -> Option<&[String]> {
        self.prefixes.get(category).map(|p| p.as_slice())
    }

    /// Returns true if a bundle of this category and name may be downloaded.
    pub fn allows(&self, category: &str, bundle_name: &str) -> bool {
        match self.prefixes_for(category) {
            Some(prefixes) => prefixes.iter().any(|p| bundle_name.starts_with(p.as_str())),
            None => false,
        }
    }
}

/// A single bundle queued for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Key used to build the download URL.
    pub key: String,
    /// Bare bundle name, used for persisted state.
    pub bundle_name: String,
    /// Hash expected at the time the task was created.
    pub expected_hash: String,
    pub category: String,
}

/// Trigger payload for an updater run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub server: ServerRegion,
    #[serde(rename = "assetVersion")]
    pub asset_version: String,
    #[serde(rename = "assetHash", default)]
    pub asset_hash: Option<String>,
}

/// Outcome of a completed updater run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub selected: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub elapsed: Duration,
}
