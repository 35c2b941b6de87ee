//! Resolves version tokens into concrete manifest and bundle URLs.
//!
//! Three protocol families exist:
//! - hash-embedded: version and hash go straight into the templates
//! - profile-keyed: an environment hash is looked up by profile name
//! - remote-version: the asset version is fetched from a version endpoint,
//!   retrying once with a fallback app version

use reqwest::header::HeaderMap;
use tracing::{info, warn};

use super::errors::VersionResolutionError;
use super::models::VersionVariant;
use super::profile::ServerProfile;
use super::request::{fill_template, headers_for};
use super::transport::AssetTransport;

/// Concrete URLs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    pub manifest_url: String,
    pub bundle_url_template: String,
}

impl ResolvedEndpoints {
    /// Build the download URL for a task key (without the time argument).
    pub fn bundle_url(&self, key: &str) -> String {
        if self.bundle_url_template.contains("{bundle_path}") {
            self.bundle_url_template.replace("{bundle_path}", key)
        } else {
            format!("{}{}", self.bundle_url_template, key)
        }
    }
}

/// Steps of the remote version lookup.
#[derive(Debug)]
enum LookupStep {
    Primary,
    Fallback { primary_error: String },
}

/// Remote version lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RemoteVersion {
    app_version: String,
    asset_version: String,
}

pub struct VersionResolver<'a> {
    transport: &'a dyn AssetTransport,
    profile: &'a ServerProfile,
}

impl<'a> VersionResolver<'a> {
    pub fn new(transport: &'a dyn AssetTransport, profile: &'a ServerProfile) -> Self {
        Self { transport, profile }
    }

    /// Resolve the manifest URL and bundle URL template for a requested version.
    ///
    /// `headers` is the run's header template; it is only used by the remote-version lookup.
    pub async fn resolve(
        &self,
        asset_version: &str,
        asset_hash: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<ResolvedEndpoints, VersionResolutionError> {
        let profile = self.profile;
        let hash = asset_hash.unwrap_or_default();

        let endpoints = match profile.region.version_variant() {
            VersionVariant::HashEmbedded => {
                if asset_hash.is_none() && self.templates_use("{asset_hash}") {
                    return Err(VersionResolutionError::MissingAssetHash);
                }
                let values = [("asset_version", asset_version), ("asset_hash", hash)];
                self.fill_both(&values)
            }
            VersionVariant::ProfileKeyed => {
                let env = profile.cp_asset_profile.as_str();
                let env_hash = profile
                    .environment_hashes
                    .get(env)
                    .ok_or_else(|| VersionResolutionError::MissingProfile(env.to_string()))?;
                let values = [
                    ("env", env),
                    ("hash", env_hash.as_str()),
                    ("asset_version", asset_version),
                    ("asset_hash", hash),
                ];
                self.fill_both(&values)
            }
            VersionVariant::RemoteVersion => {
                let remote = self.lookup_remote_version(asset_version, headers).await?;
                let values = [
                    ("app_version", remote.app_version.as_str()),
                    ("asset_version", remote.asset_version.as_str()),
                    ("asset_hash", hash),
                ];
                self.fill_both(&values)
            }
        };

        info!(
            "{} server resolved manifest URL {}",
            profile.region, endpoints.manifest_url
        );
        Ok(endpoints)
    }

    fn templates_use(&self, placeholder: &str) -> bool {
        self.profile.asset_info_url_template.contains(placeholder)
            || self.profile.asset_url_template.contains(placeholder)
    }

    fn fill_both(&self, values: &[(&str, &str)]) -> ResolvedEndpoints {
        ResolvedEndpoints {
            manifest_url: fill_template(&self.profile.asset_info_url_template, values),
            bundle_url_template: fill_template(&self.profile.asset_url_template, values),
        }
    }

    async fn lookup_remote_version(
        &self,
        requested: &str,
        headers: &HeaderMap,
    ) -> Result<RemoteVersion, VersionResolutionError> {
        let template = self
            .profile
            .version_url_template
            .as_deref()
            .ok_or(VersionResolutionError::MissingTemplate("version_url_template"))?;

        let mut step = LookupStep::Primary;
        loop {
            step = match step {
                LookupStep::Primary => match self.fetch_version(template, requested, headers).await
                {
                    Ok(version) => return Ok(version),
                    Err(e) => {
                        warn!(
                            "{} server asset version lookup failed for app version {}: {}",
                            self.profile.region, requested, e
                        );
                        LookupStep::Fallback { primary_error: e }
                    }
                },
                LookupStep::Fallback { primary_error } => {
                    let fallback = match self.profile.fallback_app_version.as_deref() {
                        Some(fallback) => fallback,
                        None => {
                            return Err(VersionResolutionError::Unreachable {
                                primary: primary_error,
                                fallback: "no fallback app version configured".to_string(),
                            })
                        }
                    };
                    info!(
                        "{} server retrying asset version lookup with fallback app version {}",
                        self.profile.region, fallback
                    );
                    return self
                        .fetch_version(template, fallback, headers)
                        .await
                        .map_err(|fallback_error| VersionResolutionError::Unreachable {
                            primary: primary_error,
                            fallback: fallback_error,
                        });
                }
            };
        }
    }

    async fn fetch_version(
        &self,
        template: &str,
        app_version: &str,
        headers: &HeaderMap,
    ) -> Result<RemoteVersion, String> {
        let url = fill_template(template, &[("app_version", app_version)]);
        let body = self
            .transport
            .fetch(&url, &headers_for(headers, &url))
            .await
            .map_err(|e| e.to_string())?;
        let asset_version = String::from_utf8(body)
            .map_err(|_| VersionResolutionError::InvalidResponse.to_string())?
            .trim()
            .to_string();

        Ok(RemoteVersion {
            app_version: app_version.to_string(),
            asset_version,
        })
    }
}
