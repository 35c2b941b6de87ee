//! Bounded-concurrency download and extraction of a diff set.

use std::sync::Arc;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::HeaderMap;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::diff::DiffSet;
use super::models::{DownloadState, DownloadTask, ServerRegion};
use super::obfuscator::deobfuscate;
use super::request::{headers_for, tokyo_now, with_time_arg};
use super::retry_policy::RetryPolicy;
use super::transport::AssetTransport;
use super::uploader::CloudUploader;
use super::version_resolver::ResolvedEndpoints;
use crate::extraction::BundleExtractor;

/// Maximum number of bundles in flight at once.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 16;

/// Result of downloading a whole diff set.
#[derive(Debug, Default, Clone)]
pub struct DownloadOutcome {
    /// Bundle name -> hash expected when the task was created.
    pub succeeded: DownloadState,
    /// Bundle names that could not be downloaded or extracted.
    pub failed: Vec<String>,
}

pub struct DownloadOrchestrator {
    region: ServerRegion,
    transport: Arc<dyn AssetTransport>,
    extractor: Arc<dyn BundleExtractor>,
    retry_policy: RetryPolicy,
    uploader: Option<Arc<CloudUploader>>,
}

impl DownloadOrchestrator {
    pub fn new(
        region: ServerRegion,
        transport: Arc<dyn AssetTransport>,
        extractor: Arc<dyn BundleExtractor>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            region,
            transport,
            extractor,
            retry_policy,
            uploader: None,
        }
    }

    /// Push each bundle's extracted files to remote storage before it counts as done.
    pub fn with_uploader(mut self, uploader: CloudUploader) -> Self {
        self.uploader = Some(Arc::new(uploader));
        self
    }

    /// Download, deobfuscate and extract every task. Individual failures never abort the run.
    pub async fn run(
        &self,
        diff: &DiffSet,
        endpoints: &ResolvedEndpoints,
        headers: &HeaderMap,
    ) -> DownloadOutcome {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS));
        let progress = progress_bar(diff.len() as u64, self.region);

        let downloads = diff
            .tasks
            .iter()
            .map(|task| self.download_one(task, &semaphore, endpoints, headers, &progress));
        let results = join_all(downloads).await;
        progress.finish_and_clear();

        let mut outcome = DownloadOutcome::default();
        for (task, result) in diff.tasks.iter().zip(results) {
            match result {
                Some((key, hash)) => {
                    let name = diff.bundle_name(&key).unwrap_or(&task.bundle_name);
                    outcome.succeeded.insert(name.to_string(), hash);
                }
                None => outcome.failed.push(task.bundle_name.clone()),
            }
        }
        outcome
    }

    async fn download_one(
        &self,
        task: &DownloadTask,
        semaphore: &Semaphore,
        endpoints: &ResolvedEndpoints,
        headers: &HeaderMap,
        progress: &ProgressBar,
    ) -> Option<(String, String)> {
        let result = match semaphore.acquire().await {
            Ok(_permit) => self.fetch_and_extract(task, endpoints, headers).await,
            Err(e) => {
                error!("Download pool closed: {}", e);
                None
            }
        };
        progress.inc(1);
        result
    }

    async fn fetch_and_extract(
        &self,
        task: &DownloadTask,
        endpoints: &ResolvedEndpoints,
        headers: &HeaderMap,
    ) -> Option<(String, String)> {
        let url = with_time_arg(&endpoints.bundle_url(&task.key), tokyo_now());
        let request_headers = headers_for(headers, &url);

        info!("{} server downloading asset {}...", self.region, task.key);
        let data = match self
            .retry_policy
            .run(|_| self.transport.fetch(&url, &request_headers))
            .await
        {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    "{} server failed to download asset {}: {}",
                    self.region, task.key, e
                );
                return None;
            }
        };

        let extractor = self.extractor.clone();
        let bundle_name = task.bundle_name.clone();
        let category = task.category.clone();
        let extraction = tokio::task::spawn_blocking(move || {
            let plain = deobfuscate(&data);
            extractor.extract(&bundle_name, &category, &plain)
        })
        .await;

        match extraction {
            Ok(Ok(report)) => {
                if report.failed > 0 {
                    warn!(
                        "{} server extracted {} with {} failed records",
                        self.region, task.key, report.failed
                    );
                }
                info!(
                    "{} server extracted asset {} ({} files)",
                    self.region,
                    task.key,
                    report.written.len()
                );
                if let Some(uploader) = &self.uploader {
                    let errors = uploader.upload(&report.written).await;
                    if !errors.is_empty() {
                        for e in &errors {
                            error!("{} server upload failed: {}", self.region, e);
                        }
                        return None;
                    }
                }
                Some((task.key.clone(), task.expected_hash.clone()))
            }
            Ok(Err(e)) => {
                error!("{} server failed to extract {}: {}", self.region, task.key, e);
                None
            }
            Err(e) => {
                error!(
                    "{} server extraction task for {} panicked: {}",
                    self.region, task.key, e
                );
                None
            }
        }
    }
}

fn progress_bar(total: u64, region: ServerRegion) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/dim}] {pos}/{len} ({elapsed})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(format!("Downloading {} new assets", region));
    bar
}
