//! Fetches and decrypts the asset bundle manifest.

use reqwest::header::HeaderMap;
use tracing::info;

use super::errors::SyncError;
use super::models::BundleManifest;
use super::profile::ServerProfile;
use super::request::{headers_for, tokyo_now, with_time_arg};
use super::retry_policy::RetryPolicy;
use super::transport::AssetTransport;

pub struct ManifestFetcher<'a> {
    transport: &'a dyn AssetTransport,
    profile: &'a ServerProfile,
    retry_policy: &'a RetryPolicy,
}

impl<'a> ManifestFetcher<'a> {
    pub fn new(
        transport: &'a dyn AssetTransport,
        profile: &'a ServerProfile,
        retry_policy: &'a RetryPolicy,
    ) -> Self {
        Self {
            transport,
            profile,
            retry_policy,
        }
    }

    /// GET the encrypted manifest and decode it.
    pub async fn fetch(
        &self,
        manifest_url: &str,
        headers: &HeaderMap,
    ) -> Result<BundleManifest, SyncError> {
        let url = if self.profile.region.timestamps_manifest_url() {
            with_time_arg(manifest_url, tokyo_now())
        } else {
            manifest_url.to_string()
        };
        let request_headers = headers_for(headers, &url);

        info!("{} server fetching asset bundle manifest...", self.profile.region);
        let data = self
            .retry_policy
            .run(|_| self.transport.fetch(&url, &request_headers))
            .await
            .map_err(SyncError::ManifestUnavailable)?;

        let manifest: BundleManifest = self.profile.cryptor.unpack(&data)?;
        info!(
            "{} server fetched asset bundle manifest with {} bundles",
            self.profile.region,
            manifest.bundles.len()
        );
        Ok(manifest)
    }
}
