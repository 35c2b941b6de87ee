mod file_config;

pub use file_config::{
    AuthConfig, CommandConfig, FileConfig, RegionFileConfig, RemoteStorageConfig, ToolsConfig,
};

use crate::extraction::{
    AudioFormat, AudioOptions, CommandTemplate, ImageOptions, ToolSettings, VideoOptions,
};
use crate::server::RequestsLoggingLevel;
use crate::updater::{
    CategoryFilter, Cryptor, RemoteStorage, ServerProfile, ServerRegion, UploadTargets,
    VersionVariant, CATEGORY_ONDEMAND, CATEGORY_STARTAPP, DEFAULT_CONCURRENT_UPLOADS,
    DEFAULT_COOKIE_SIGNATURE_URL, DEFAULT_CP_PROFILE, DEFAULT_UNITY_VERSION,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Name of the state file inside a region's save directory.
pub const DEFAULT_RECORD_FILE_NAME: &str = "downloaded_assets.json";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 12345,
            logging_level: RequestsLoggingLevel::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,

    // Outgoing requests
    pub proxies: Vec<String>,
    pub request_timeout_sec: u64,

    pub auth: AuthSettings,

    /// External media programs shared by all regions.
    pub tools: ToolSettings,
    /// Present when at least one remote storage is configured.
    pub uploads: Option<UploadTargets>,

    /// Enabled regions with their resolved settings.
    pub regions: HashMap<ServerRegion, RegionSettings>,
    /// Regions present in the config but switched off.
    pub disabled_regions: HashSet<ServerRegion>,
}

/// Trigger endpoint authorization.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub enabled: bool,
    pub user_agent_prefix: Option<String>,
    pub token: Option<String>,
}

/// Everything the updater needs for one region.
#[derive(Debug, Clone)]
pub struct RegionSettings {
    pub profile: ServerProfile,
    pub filter: CategoryFilter,
    pub skip_patterns: Vec<Regex>,
    pub download_priority: Vec<Regex>,
    pub asset_save_dir: PathBuf,
    pub record_file: PathBuf,
    pub export_by_category: bool,
    pub media: MediaSettings,
    pub upload: UploadSettings,
}

/// Post-processing of extracted media. `None` leaves containers as raw files.
#[derive(Debug, Clone, Default)]
pub struct MediaSettings {
    pub audio: Option<AudioOptions>,
    pub video: Option<VideoOptions>,
    pub images: ImageOptions,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadSettings {
    pub enabled: bool,
    pub remove_local: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);
        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let proxies = file.proxies.unwrap_or_default();
        let request_timeout_sec = file.request_timeout_sec.unwrap_or(300);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be greater than zero");
        }

        let auth_file = file.auth.unwrap_or_default();
        let auth = AuthSettings {
            enabled: auth_file.enabled.unwrap_or(false),
            user_agent_prefix: auth_file.user_agent_prefix.filter(|s| !s.is_empty()),
            token: auth_file.token.filter(|s| !s.is_empty()),
        };

        let tools = resolve_tools(file.tools.unwrap_or_default());

        let concurrent_uploads = file
            .concurrent_uploads
            .unwrap_or(DEFAULT_CONCURRENT_UPLOADS);
        if concurrent_uploads == 0 {
            bail!("concurrent_uploads must be greater than zero");
        }
        let storages: Vec<RemoteStorage> = file
            .remote_storages
            .unwrap_or_default()
            .into_iter()
            .map(|storage| RemoteStorage {
                kind: storage.kind,
                base: storage.base,
                command: CommandTemplate::new(storage.program, storage.args),
            })
            .collect();
        let uploads = if storages.is_empty() {
            None
        } else {
            Some(UploadTargets::new(storages, concurrent_uploads))
        };

        let mut profiles = HashMap::new();
        for (name, hashes) in file.profiles.unwrap_or_default() {
            profiles.insert(parse_region(&name)?, hashes);
        }

        let mut regions = HashMap::new();
        let mut disabled_regions = HashSet::new();
        for (name, server) in file.servers.unwrap_or_default() {
            let region = parse_region(&name)?;
            if !server.enabled.unwrap_or(true) {
                disabled_regions.insert(region);
                continue;
            }
            let environment_hashes = profiles.get(&region).cloned().unwrap_or_default();
            let settings = resolve_region(region, server, environment_hashes)
                .and_then(|settings| validate_region(settings, &tools, uploads.is_some()))
                .with_context(|| format!("Invalid configuration for server region {}", name))?;
            regions.insert(region, settings);
        }

        Ok(Self {
            host,
            port,
            logging_level,
            proxies,
            request_timeout_sec,
            auth,
            tools,
            uploads,
            regions,
            disabled_regions,
        })
    }
}

fn resolve_tools(tools: ToolsConfig) -> ToolSettings {
    let command = |config: CommandConfig| CommandTemplate::new(config.program, config.args);
    ToolSettings {
        ffmpeg_path: tools.ffmpeg_path.filter(|s| !s.is_empty()).map(PathBuf::from),
        acb_extractor: tools.acb_extractor.map(command),
        hca_decoder: tools.hca_decoder.map(command),
        usm_extractor: tools.usm_extractor.map(command),
    }
}

fn resolve_media(server: &RegionFileConfig) -> MediaSettings {
    let audio = server.decode_acb_files.unwrap_or(false).then(|| {
        // MP3 wins when both encodings are switched on
        let format = if server.convert_audio_to_mp3.unwrap_or(true) {
            Some(AudioFormat::Mp3)
        } else if server.convert_wav_to_flac.unwrap_or(false) {
            Some(AudioFormat::Flac)
        } else {
            None
        };
        AudioOptions {
            decode_streams: server.decode_hca_files.unwrap_or(true),
            format,
            keep_wav: !server.remove_wav.unwrap_or(true),
        }
    });
    let video = server.decode_usm_files.unwrap_or(false).then(|| VideoOptions {
        convert_to_mp4: server.convert_video_to_mp4.unwrap_or(false),
        keep_m2v: !server.remove_m2v.unwrap_or(false),
    });
    MediaSettings {
        audio,
        video,
        images: ImageOptions {
            convert_to_webp: server.convert_photo_to_webp.unwrap_or(false),
            keep_png: !server.remove_png.unwrap_or(false),
        },
    }
}

/// Every enabled post-processing step needs its program to be configured.
fn validate_region(
    settings: RegionSettings,
    tools: &ToolSettings,
    has_storages: bool,
) -> Result<RegionSettings> {
    if let Some(audio) = &settings.media.audio {
        if tools.acb_extractor.is_none() {
            bail!("decode_acb_files requires tools.acb_extractor");
        }
        if audio.decode_streams {
            if tools.hca_decoder.is_none() {
                bail!("decode_hca_files requires tools.hca_decoder");
            }
            if audio.format.is_some() && tools.ffmpeg_path.is_none() {
                bail!("Audio transcoding requires tools.ffmpeg_path");
            }
        }
    }
    if let Some(video) = &settings.media.video {
        if tools.usm_extractor.is_none() {
            bail!("decode_usm_files requires tools.usm_extractor");
        }
        if video.convert_to_mp4 && tools.ffmpeg_path.is_none() {
            bail!("convert_video_to_mp4 requires tools.ffmpeg_path");
        }
    }
    if settings.upload.enabled && !has_storages {
        bail!("upload_to_cloud requires at least one remote_storages entry");
    }
    Ok(settings)
}

fn parse_region(name: &str) -> Result<ServerRegion> {
    ServerRegion::from_str(&name.to_lowercase())
        .ok_or_else(|| anyhow!("Unknown server region in config: {}", name))
}

fn resolve_region(
    region: ServerRegion,
    server: RegionFileConfig,
    environment_hashes: HashMap<String, String>,
) -> Result<RegionSettings> {
    let media = resolve_media(&server);
    let upload = UploadSettings {
        enabled: server.upload_to_cloud.unwrap_or(false),
        remove_local: server.remove_local_after_upload.unwrap_or(false),
    };

    let asset_info_url_template = server
        .asset_info_url_template
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("asset_info_url_template must be specified"))?;
    let asset_url_template = server
        .asset_url_template
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("asset_url_template must be specified"))?;

    let version_url_template = server.version_url_template.filter(|s| !s.is_empty());
    if region.version_variant() == VersionVariant::RemoteVersion && version_url_template.is_none()
    {
        bail!("version_url_template must be specified for this region");
    }

    let key_hex = server
        .aes_key_hex
        .ok_or_else(|| anyhow!("aes_key_hex must be specified"))?;
    let iv_hex = server
        .aes_iv_hex
        .ok_or_else(|| anyhow!("aes_iv_hex must be specified"))?;
    let cryptor = Cryptor::from_hex(&key_hex, &iv_hex).context("Invalid AES key or IV")?;

    let asset_save_dir = server
        .asset_save_dir
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("asset_save_dir must be specified"))?;
    let record_file = server
        .downloaded_asset_record_file
        .map(PathBuf::from)
        .unwrap_or_else(|| asset_save_dir.join(DEFAULT_RECORD_FILE_NAME));

    let profile = ServerProfile {
        region,
        asset_info_url_template,
        asset_url_template,
        version_url_template,
        fallback_app_version: server.fallback_app_version.filter(|s| !s.is_empty()),
        cp_asset_profile: server
            .cp_asset_profile
            .unwrap_or_else(|| DEFAULT_CP_PROFILE.to_string()),
        environment_hashes,
        cryptor,
        required_cookies: server.required_cookies.unwrap_or(false),
        cookie_signature_url: server
            .cookie_signature_url
            .unwrap_or_else(|| DEFAULT_COOKIE_SIGNATURE_URL.to_string()),
        headers: parse_headers(server.headers.unwrap_or_default())?,
        unity_version: server
            .unity_version
            .unwrap_or_else(|| DEFAULT_UNITY_VERSION.to_string()),
    };

    let mut filter = CategoryFilter::new();
    filter.insert(
        CATEGORY_STARTAPP.to_string(),
        server.startapp_prefixes.unwrap_or_default(),
    );
    filter.insert(
        CATEGORY_ONDEMAND.to_string(),
        server.ondemand_prefixes.unwrap_or_default(),
    );

    Ok(RegionSettings {
        profile,
        filter,
        skip_patterns: compile_patterns(server.skip_patterns.unwrap_or_default())
            .context("Invalid skip pattern")?,
        download_priority: compile_patterns(server.download_priority.unwrap_or_default())
            .context("Invalid download priority pattern")?,
        asset_save_dir,
        record_file,
        export_by_category: server.export_by_category.unwrap_or(false),
        media,
        upload,
    })
}

fn parse_headers(raw: HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in raw {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name: {}", name))?;
        let header_value = HeaderValue::from_str(&value)
            .with_context(|| format!("Invalid value for header {}", name))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn compile_patterns(patterns: Vec<String>) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("Failed to compile pattern: {}", p)))
        .collect()
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "00112233445566778899aabbccddeeff";

    fn region_config() -> RegionFileConfig {
        RegionFileConfig {
            asset_info_url_template: Some("https://info/{asset_version}".to_string()),
            asset_url_template: Some("https://cdn/{bundle_path}".to_string()),
            aes_key_hex: Some(KEY_HEX.to_string()),
            aes_iv_hex: Some(KEY_HEX.to_string()),
            asset_save_dir: Some("/data/assets".to_string()),
            ..Default::default()
        }
    }

    fn file_with_servers(servers: &[(&str, RegionFileConfig)]) -> FileConfig {
        FileConfig {
            servers: Some(
                servers
                    .iter()
                    .map(|(name, config)| (name.to_string(), config.clone()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("path"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("headers"),
            Some(RequestsLoggingLevel::Headers)
        ));
        assert!(matches!(
            parse_logging_level("body"),
            Some(RequestsLoggingLevel::Body)
        ));
        // Case insensitive
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        // Invalid
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let cli = CliConfig {
            host: "127.0.0.1".to_string(),
            port: 3001,
            logging_level: RequestsLoggingLevel::Headers,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3001);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert!(config.proxies.is_empty());
        assert_eq!(config.request_timeout_sec, 300);
        assert!(!config.auth.enabled);
        assert!(config.regions.is_empty());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig {
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            ..Default::default()
        };

        let file_config = FileConfig {
            port: Some(4000),
            logging_level: Some("body".to_string()),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_resolve_region_defaults() {
        let config = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("en", region_config())])),
        )
        .unwrap();

        let en = &config.regions[&ServerRegion::En];
        assert_eq!(en.profile.region, ServerRegion::En);
        assert_eq!(en.profile.cp_asset_profile, "production");
        assert!(!en.profile.required_cookies);
        assert_eq!(
            en.record_file,
            PathBuf::from("/data/assets/downloaded_assets.json")
        );
        assert!(!en.export_by_category);
        assert!(en.filter.prefixes_for(CATEGORY_STARTAPP).is_some());
        assert!(en.filter.prefixes_for(CATEGORY_ONDEMAND).is_some());
    }

    #[test]
    fn test_resolve_profiles_and_headers() {
        let mut jp = region_config();
        jp.headers = Some(HashMap::from([(
            "X-Unity-Version".to_string(),
            "2022.3.21f1".to_string(),
        )]));
        jp.startapp_prefixes = Some(vec!["honor".to_string()]);
        jp.skip_patterns = Some(vec!["^live_pv".to_string()]);
        let mut file = file_with_servers(&[("JP", jp)]);
        file.profiles = Some(HashMap::from([(
            "jp".to_string(),
            HashMap::from([("production".to_string(), "envhash".to_string())]),
        )]));

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();

        let jp = &config.regions[&ServerRegion::Jp];
        assert_eq!(jp.profile.environment_hashes["production"], "envhash");
        assert_eq!(
            jp.profile.headers.get("x-unity-version").unwrap(),
            "2022.3.21f1"
        );
        assert!(jp.filter.allows(CATEGORY_STARTAPP, "honor/a"));
        assert!(jp.skip_patterns[0].is_match("live_pv/x"));
    }

    #[test]
    fn test_resolve_disabled_region() {
        let disabled = RegionFileConfig {
            enabled: Some(false),
            ..Default::default()
        };
        let config = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("cn", disabled)])),
        )
        .unwrap();

        assert!(config.regions.is_empty());
        assert!(config.disabled_regions.contains(&ServerRegion::Cn));
    }

    #[test]
    fn test_resolve_unknown_region_error() {
        let result = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("us", region_config())])),
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown server region"));
    }

    #[test]
    fn test_resolve_remote_version_requires_template() {
        let result = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("tw", region_config())])),
        );
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("version_url_template"));
    }

    #[test]
    fn test_resolve_invalid_key_error() {
        let mut en = region_config();
        en.aes_key_hex = Some("abcd".to_string());
        let result = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("en", en)])),
        );
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Invalid AES key or IV"));
    }

    #[test]
    fn test_resolve_invalid_pattern_error() {
        let mut en = region_config();
        en.download_priority = Some(vec!["(unclosed".to_string()]);
        let result = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("en", en)])),
        );
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Invalid download priority pattern"));
    }

    #[test]
    fn test_resolve_missing_save_dir_error() {
        let mut en = region_config();
        en.asset_save_dir = None;
        let result = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("en", en)])),
        );
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("asset_save_dir must be specified"));
    }

    #[test]
    fn test_resolve_auth() {
        let file = FileConfig {
            auth: Some(AuthConfig {
                enabled: Some(true),
                user_agent_prefix: Some("".to_string()),
                token: Some("secret".to_string()),
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();
        assert!(config.auth.enabled);
        // Empty strings mean "not configured"
        assert!(config.auth.user_agent_prefix.is_none());
        assert_eq!(config.auth.token.as_deref(), Some("secret"));
    }

    fn tools() -> ToolsConfig {
        let command = |program: &str| CommandConfig {
            program: program.to_string(),
            args: vec!["src".to_string(), "dst".to_string()],
        };
        ToolsConfig {
            ffmpeg_path: Some("/usr/bin/ffmpeg".to_string()),
            acb_extractor: Some(command("acb-extract")),
            hca_decoder: Some(command("hca-decode")),
            usm_extractor: Some(command("usm-extract")),
        }
    }

    #[test]
    fn test_resolve_media_defaults_off() {
        let config = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_with_servers(&[("en", region_config())])),
        )
        .unwrap();

        let en = &config.regions[&ServerRegion::En];
        assert!(en.media.audio.is_none());
        assert!(en.media.video.is_none());
        assert_eq!(en.media.images, ImageOptions::default());
        assert!(!en.upload.enabled);
        assert_eq!(config.tools, ToolSettings::default());
        assert!(config.uploads.is_none());
    }

    #[test]
    fn test_resolve_media_flags() {
        let mut en = region_config();
        en.decode_acb_files = Some(true);
        en.convert_audio_to_mp3 = Some(false);
        en.convert_wav_to_flac = Some(true);
        en.remove_wav = Some(false);
        en.decode_usm_files = Some(true);
        en.convert_video_to_mp4 = Some(true);
        en.remove_m2v = Some(true);
        en.convert_photo_to_webp = Some(true);
        en.remove_png = Some(true);
        let mut file = file_with_servers(&[("en", en)]);
        file.tools = Some(tools());

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();

        let media = &config.regions[&ServerRegion::En].media;
        assert_eq!(
            media.audio,
            Some(AudioOptions {
                decode_streams: true,
                format: Some(AudioFormat::Flac),
                keep_wav: true,
            })
        );
        assert_eq!(
            media.video,
            Some(VideoOptions {
                convert_to_mp4: true,
                keep_m2v: false,
            })
        );
        assert_eq!(
            media.images,
            ImageOptions {
                convert_to_webp: true,
                keep_png: false,
            }
        );
        assert_eq!(
            config.tools.ffmpeg_path,
            Some(PathBuf::from("/usr/bin/ffmpeg"))
        );
    }

    #[test]
    fn test_mp3_wins_over_flac() {
        let mut en = region_config();
        en.decode_acb_files = Some(true);
        en.convert_wav_to_flac = Some(true);
        let mut file = file_with_servers(&[("en", en)]);
        file.tools = Some(tools());

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();

        let audio = config.regions[&ServerRegion::En].media.audio.unwrap();
        assert_eq!(audio.format, Some(AudioFormat::Mp3));
        assert!(!audio.keep_wav);
    }

    #[test]
    fn test_media_flags_require_tools() {
        let cases: [(fn(&mut RegionFileConfig), &str); 3] = [
            (|c| c.decode_acb_files = Some(true), "tools.acb_extractor"),
            (|c| c.decode_usm_files = Some(true), "tools.usm_extractor"),
            (|c| c.upload_to_cloud = Some(true), "remote_storages"),
        ];
        for (configure, expected) in cases {
            let mut en = region_config();
            configure(&mut en);
            let result = AppConfig::resolve(
                &CliConfig::default(),
                Some(file_with_servers(&[("en", en)])),
            );
            let message = format!("{:#}", result.unwrap_err());
            assert!(message.contains(expected), "{}", message);
        }
    }

    #[test]
    fn test_transcoding_requires_ffmpeg() {
        let mut en = region_config();
        en.decode_acb_files = Some(true);
        let mut file = file_with_servers(&[("en", en)]);
        file.tools = Some(ToolsConfig {
            ffmpeg_path: None,
            ..tools()
        });

        let result = AppConfig::resolve(&CliConfig::default(), Some(file));
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("tools.ffmpeg_path"));
    }

    #[test]
    fn test_resolve_uploads() {
        let mut en = region_config();
        en.upload_to_cloud = Some(true);
        en.remove_local_after_upload = Some(true);
        let mut file = file_with_servers(&[("en", en)]);
        file.concurrent_uploads = Some(3);
        file.remote_storages = Some(vec![RemoteStorageConfig {
            kind: "rclone".to_string(),
            base: "r2:sekai/en".to_string(),
            program: "rclone".to_string(),
            args: vec!["copyto".to_string(), "src".to_string(), "dst".to_string()],
        }]);

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();

        let upload = config.regions[&ServerRegion::En].upload;
        assert!(upload.enabled);
        assert!(upload.remove_local);
        let storages = config.uploads.unwrap();
        assert_eq!(storages.storages()[0].base, "r2:sekai/en");
        assert_eq!(
            storages.storages()[0].command.program,
            PathBuf::from("rclone")
        );
    }

    #[test]
    fn test_zero_concurrent_uploads_rejected() {
        let file = FileConfig {
            concurrent_uploads: Some(0),
            ..Default::default()
        };
        let result = AppConfig::resolve(&CliConfig::default(), Some(file));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("concurrent_uploads"));
    }
}
