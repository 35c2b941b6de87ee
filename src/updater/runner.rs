//! The updater run: negotiate, resolve, fetch, diff, download, persist.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::credentials::CredentialNegotiator;
use super::diff::DiffEngine;
use super::errors::SyncError;
use super::manifest::ManifestFetcher;
use super::models::{RunSummary, ServerRegion};
use super::orchestrator::DownloadOrchestrator;
use super::retry_policy::RetryPolicy;
use super::state_store::StateStore;
use super::transport::AssetTransport;
use super::uploader::{CloudUploader, UploadTargets};
use super::version_resolver::VersionResolver;
use crate::config::RegionSettings;
use crate::extraction::{
    BundlePipeline, ContainerParser, ExtractionRouter, MediaTools, PassthroughParser,
};

/// Whether a trigger for a region can start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStatus {
    Enabled,
    Disabled,
    NotConfigured,
}

/// Entry point of an updater run for any configured region.
pub struct AssetUpdater {
    transport: Arc<dyn AssetTransport>,
    regions: HashMap<ServerRegion, RegionSettings>,
    disabled: HashSet<ServerRegion>,
    parser: Arc<dyn ContainerParser>,
    media: MediaTools,
    uploads: Option<UploadTargets>,
    retry_policy: RetryPolicy,
}

impl AssetUpdater {
    pub fn new(
        transport: Arc<dyn AssetTransport>,
        regions: HashMap<ServerRegion, RegionSettings>,
        disabled: HashSet<ServerRegion>,
    ) -> Self {
        Self {
            transport,
            regions,
            disabled,
            parser: Arc::new(PassthroughParser),
            media: MediaTools::default(),
            uploads: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Container parser used for every bundle. Defaults to [`PassthroughParser`].
    pub fn with_parser(mut self, parser: Arc<dyn ContainerParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Media programs used by regions that enable audio or video post-processing.
    pub fn with_media_tools(mut self, media: MediaTools) -> Self {
        self.media = media;
        self
    }

    pub fn with_uploads(mut self, uploads: UploadTargets) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn region_status(&self, region: ServerRegion) -> RegionStatus {
        if self.regions.contains_key(&region) {
            RegionStatus::Enabled
        } else if self.disabled.contains(&region) {
            RegionStatus::Disabled
        } else {
            RegionStatus::NotConfigured
        }
    }

    pub fn enabled_regions(&self) -> Vec<ServerRegion> {
        let mut regions: Vec<ServerRegion> = self.regions.keys().copied().collect();
        regions.sort();
        regions
    }

    /// Run the whole update for one region.
    ///
    /// Version resolution and manifest failures abort the run. Individual bundle
    /// failures are only reported in the summary, and their state entries are left
    /// untouched so the next run picks them up again.
    pub async fn run(
        &self,
        region: ServerRegion,
        asset_version: &str,
        asset_hash: Option<&str>,
    ) -> Result<RunSummary, SyncError> {
        let settings = self
            .regions
            .get(&region)
            .ok_or_else(|| SyncError::RegionNotConfigured(region.to_string()))?;
        let profile = &settings.profile;
        let started = Instant::now();
        info!(
            "{} server asset updater started for asset version {}",
            region, asset_version
        );

        let headers = CredentialNegotiator::new(self.transport.as_ref(), profile)
            .negotiate()
            .await;

        let endpoints = VersionResolver::new(self.transport.as_ref(), profile)
            .resolve(asset_version, asset_hash, &headers)
            .await?;

        let manifest = ManifestFetcher::new(self.transport.as_ref(), profile, &self.retry_policy)
            .fetch(&endpoints.manifest_url, &headers)
            .await?;

        let store = StateStore::new(&settings.record_file);
        let mut state = store.load().await?;

        let diff = DiffEngine::new(settings.filter.clone(), region.key_layout())
            .with_skip_patterns(settings.skip_patterns.clone())
            .with_priority_patterns(settings.download_priority.clone())
            .compute(&manifest, &state);
        if diff.is_empty() {
            info!("{} server has no new assets", region);
            return Ok(RunSummary {
                elapsed: started.elapsed(),
                ..Default::default()
            });
        }
        info!("{} server found {} new assets", region, diff.len());

        let mut orchestrator = DownloadOrchestrator::new(
            region,
            self.transport.clone(),
            Arc::new(self.pipeline_for(region, settings)),
            self.retry_policy.clone(),
        );
        if let Some(uploader) = self.uploader_for(region, settings) {
            orchestrator = orchestrator.with_uploader(uploader);
        }
        let outcome = orchestrator.run(&diff, &endpoints, &headers).await;

        let succeeded = outcome.succeeded.len();
        state.extend(outcome.succeeded);
        store.save(&state).await?;

        let summary = RunSummary {
            selected: diff.len(),
            succeeded,
            failed: outcome.failed,
            elapsed: started.elapsed(),
        };
        if !summary.failed.is_empty() {
            warn!(
                "{} server failed to update {} assets: {}",
                region,
                summary.failed.len(),
                summary.failed.join(", ")
            );
        }
        info!(
            "{} server asset updater finished: {} updated, {} failed in {:.1}s",
            region,
            summary.succeeded,
            summary.failed.len(),
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    fn pipeline_for(&self, region: ServerRegion, settings: &RegionSettings) -> BundlePipeline {
        let mut router = ExtractionRouter::new(&settings.asset_save_dir)
            .with_export_by_category(settings.export_by_category)
            .with_images(settings.media.images);
        if let Some(options) = &settings.media.audio {
            match self.media.audio_pipeline(options) {
                Some(audio) => router = router.with_audio(audio),
                None => warn!(
                    "{} server audio extraction enabled but no container extractor is available",
                    region
                ),
            }
        }
        if let Some(options) = &settings.media.video {
            match self.media.video_pipeline(options) {
                Some(video) => router = router.with_video(video),
                None => warn!(
                    "{} server video extraction enabled but no demuxer is available",
                    region
                ),
            }
        }
        BundlePipeline::new(self.parser.clone(), router)
    }

    fn uploader_for(&self, region: ServerRegion, settings: &RegionSettings) -> Option<CloudUploader> {
        if !settings.upload.enabled {
            return None;
        }
        match &self.uploads {
            Some(targets) => Some(
                CloudUploader::new(targets.clone(), &settings.asset_save_dir)
                    .with_remove_local(settings.upload.remove_local),
            ),
            None => {
                warn!("{} server upload enabled but no remote storage is configured", region);
                None
            }
        }
    }
}
