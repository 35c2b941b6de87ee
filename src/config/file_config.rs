use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub host: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    // Outgoing requests
    pub proxies: Option<Vec<String>>,
    pub request_timeout_sec: Option<u64>,

    pub auth: Option<AuthConfig>,

    // Media post-processing programs
    pub tools: Option<ToolsConfig>,

    // Cloud upload
    pub concurrent_uploads: Option<usize>,
    pub remote_storages: Option<Vec<RemoteStorageConfig>>,

    /// Region -> environment profile name -> environment hash.
    pub profiles: Option<HashMap<String, HashMap<String, String>>>,
    /// Region -> updater settings.
    pub servers: Option<HashMap<String, RegionFileConfig>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: Option<bool>,
    pub user_agent_prefix: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<String>,
    /// Splits an audio container: `src` is the container, `dst` the output directory.
    pub acb_extractor: Option<CommandConfig>,
    /// Decodes one stream to WAV: `src`, `dst` and `key`.
    pub hca_decoder: Option<CommandConfig>,
    /// Demuxes a movie container: `src` is the container, `dst` the output directory.
    pub usm_extractor: Option<CommandConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteStorageConfig {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub base: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RegionFileConfig {
    pub enabled: Option<bool>,
    pub asset_info_url_template: Option<String>,
    pub asset_url_template: Option<String>,
    pub version_url_template: Option<String>,
    pub fallback_app_version: Option<String>,
    pub cp_asset_profile: Option<String>,
    pub required_cookies: Option<bool>,
    pub cookie_signature_url: Option<String>,
    pub aes_key_hex: Option<String>,
    pub aes_iv_hex: Option<String>,
    pub unity_version: Option<String>,
    pub headers: Option<HashMap<String, String>>,

    // Selection
    pub startapp_prefixes: Option<Vec<String>>,
    pub ondemand_prefixes: Option<Vec<String>>,
    pub skip_patterns: Option<Vec<String>>,
    pub download_priority: Option<Vec<String>>,

    // Output
    pub asset_save_dir: Option<String>,
    pub downloaded_asset_record_file: Option<String>,
    pub export_by_category: Option<bool>,

    // Audio
    pub decode_acb_files: Option<bool>,
    pub decode_hca_files: Option<bool>,
    pub convert_audio_to_mp3: Option<bool>,
    pub convert_wav_to_flac: Option<bool>,
    pub remove_wav: Option<bool>,

    // Video
    pub decode_usm_files: Option<bool>,
    pub convert_video_to_mp4: Option<bool>,
    pub remove_m2v: Option<bool>,

    // Images
    pub convert_photo_to_webp: Option<bool>,
    pub remove_png: Option<bool>,

    // Upload
    pub upload_to_cloud: Option<bool>,
    pub remove_local_after_upload: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
