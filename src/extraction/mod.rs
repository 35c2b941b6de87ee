//! Turns deobfuscated bundles into files on disk.
//!
//! A [`ContainerParser`] splits a bundle into typed records and the
//! [`ExtractionRouter`] writes each record with the writer for its kind.

pub mod audio;
pub mod records;
pub mod router;
pub mod tools;
pub mod video;

use std::sync::Arc;

use tracing::debug;

pub use audio::{AudioExtractionPipeline, AudioOptions, STREAM_KEY};
pub use records::{
    AudioArchive, AudioCodec, AudioFormat, ContainerParser, DecodedAudio, ExtractedRecord,
    PassthroughParser, PixelBuffer, TreeAccessor, TreeReadError, VideoArchive, VideoCodec,
    RAW_BUNDLE_EXTENSION, RESOURCE_ROOT,
};
pub use router::{ExtractionReport, ExtractionRouter, ImageOptions};
pub use tools::{CommandTemplate, MediaTools, ToolSettings, DST_PLACEHOLDER, SRC_PLACEHOLDER};
pub use video::{VideoExtractionPipeline, VideoOptions};

use crate::updater::errors::ExtractionError;

/// Extracts one downloaded bundle. Runs on the blocking thread pool.
pub trait BundleExtractor: Send + Sync {
    fn extract(
        &self,
        bundle_name: &str,
        category: &str,
        data: &[u8],
    ) -> Result<ExtractionReport, ExtractionError>;
}

/// Parser + router.
#[derive(Clone)]
pub struct BundlePipeline {
    parser: Arc<dyn ContainerParser>,
    router: ExtractionRouter,
}

impl BundlePipeline {
    pub fn new(parser: Arc<dyn ContainerParser>, router: ExtractionRouter) -> Self {
        Self { parser, router }
    }
}

impl BundleExtractor for BundlePipeline {
    fn extract(
        &self,
        bundle_name: &str,
        category: &str,
        data: &[u8],
    ) -> Result<ExtractionReport, ExtractionError> {
        let records = self.parser.parse(data, bundle_name)?;
        debug!("Parsed {} records from {}", records.len(), bundle_name);
        Ok(self.router.route(records, category))
    }
}
