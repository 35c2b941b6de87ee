//! Routes extracted records to type-specific writers.

use std::path::{Component, Path, PathBuf};

use image::{ImageBuffer, ImageFormat, Rgba};
use tracing::{debug, error, warn};

use super::audio::{AudioExtractionPipeline, AUDIO_CONTAINER_SUFFIX};
use super::records::{ExtractedRecord, PixelBuffer, TreeAccessor, TreeReadError, RESOURCE_ROOT};
use super::video::{is_video_container, VideoExtractionPipeline};
use crate::updater::errors::ExtractionError;

/// Outcome of routing one bundle's records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Image encodings to write. WebP output is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub convert_to_webp: bool,
    /// Ignored unless `convert_to_webp` is set; PNG is the only output otherwise.
    pub keep_png: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            convert_to_webp: false,
            keep_png: true,
        }
    }
}

#[derive(Clone)]
pub struct ExtractionRouter {
    output_root: PathBuf,
    export_by_category: bool,
    images: ImageOptions,
    audio: Option<AudioExtractionPipeline>,
    video: Option<VideoExtractionPipeline>,
}

impl ExtractionRouter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            export_by_category: false,
            images: ImageOptions::default(),
            audio: None,
            video: None,
        }
    }

    /// Put outputs under a lowercase category directory.
    pub fn with_export_by_category(mut self, enabled: bool) -> Self {
        self.export_by_category = enabled;
        self
    }

    pub fn with_images(mut self, images: ImageOptions) -> Self {
        self.images = images;
        self
    }

    pub fn with_audio(mut self, audio: AudioExtractionPipeline) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Movie containers are demuxed instead of written raw.
    pub fn with_video(mut self, video: VideoExtractionPipeline) -> Self {
        self.video = Some(video);
        self
    }

    /// Where a record declared at `declared` ends up on disk.
    pub fn output_path(&self, declared: &str, category: &str) -> PathBuf {
        let declared_path = Path::new(declared);
        let relative = match declared_path.strip_prefix(RESOURCE_ROOT) {
            Ok(stripped) => stripped,
            Err(_) => {
                warn!("Non-relative path detected: {}", declared);
                declared_path
            }
        };

        let mut root = self.output_root.clone();
        if self.export_by_category {
            root.push(category.to_lowercase());
        }
        // Only plain components, so a declared path can never leave the output root
        for component in relative.components() {
            if let Component::Normal(part) = component {
                root.push(part);
            }
        }
        root
    }

    /// Write every record. Failures are logged and counted; siblings continue.
    ///
    /// With a video pipeline, all movie container parts of the bundle are
    /// merged and demuxed together after the other records.
    pub fn route(&self, records: Vec<ExtractedRecord>, category: &str) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        let (movie_parts, records): (Vec<_>, Vec<_>) = match &self.video {
            Some(_) => records.into_iter().partition(is_movie_part),
            None => (Vec::new(), records),
        };

        for record in records {
            let declared = record.path().to_string();
            match self.write_record(record, category) {
                Ok(paths) => report.written.extend(paths),
                Err(e) => {
                    error!("Failed to extract {}: {}", declared, e);
                    report.failed += 1;
                }
            }
        }

        if let Some(video) = &self.video {
            self.route_movie(video, movie_parts, category, &mut report);
        }

        report
    }

    fn route_movie(
        &self,
        video: &VideoExtractionPipeline,
        parts: Vec<ExtractedRecord>,
        category: &str,
        report: &mut ExtractionReport,
    ) {
        let mut parts: Vec<(String, Vec<u8>)> = parts
            .into_iter()
            .filter_map(|record| match record {
                ExtractedRecord::TextBlob { path, bytes } => Some((path, bytes)),
                _ => None,
            })
            .collect();
        parts.sort_by(|a, b| a.0.cmp(&b.0));

        let Some((first, _)) = parts.first() else {
            return;
        };
        let first = self.output_path(first, category);
        let container = if parts.len() == 1 {
            first
        } else {
            VideoExtractionPipeline::merged_path(&first)
        };

        let count = parts.len();
        let data: Vec<Vec<u8>> = parts.into_iter().map(|(_, bytes)| bytes).collect();
        debug!("Handling movie {:?} from {} parts", container, count);
        match prepare_target(&container).and_then(|_| video.run(&data, &container)) {
            Ok(paths) => report.written.extend(paths),
            Err(e) => {
                error!("Failed to extract movie {:?}: {}", container, e);
                report.failed += count;
            }
        }
    }

    fn write_record(
        &self,
        record: ExtractedRecord,
        category: &str,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        match record {
            ExtractedRecord::Image { path, pixels } => {
                let base = self.output_path(&path, category);
                let mut written = Vec::with_capacity(2);
                if !self.images.convert_to_webp || self.images.keep_png {
                    let target = base.with_extension("png");
                    write_image(&pixels, &target, ImageFormat::Png)?;
                    written.push(target);
                }
                if self.images.convert_to_webp {
                    let target = base.with_extension("webp");
                    write_image(&pixels, &target, ImageFormat::WebP)?;
                    written.push(target);
                }
                Ok(written)
            }
            ExtractedRecord::TextBlob { path, bytes } => {
                let target = self.output_path(&path, category);
                prepare_target(&target)?;
                match &self.audio {
                    Some(audio) if path.ends_with(AUDIO_CONTAINER_SUFFIX) => {
                        debug!("Handling audio container {}", path);
                        audio.run(&bytes, &target)
                    }
                    _ => {
                        std::fs::write(&target, &bytes)?;
                        Ok(vec![target])
                    }
                }
            }
            ExtractedRecord::StructuredObject { path, tree } => {
                let target = self.output_path(&path, category).with_extension("json");
                let value = read_tree(tree.as_ref())?;
                prepare_target(&target)?;
                std::fs::write(&target, serde_json::to_vec_pretty(&value)?)?;
                Ok(vec![target])
            }
        }
    }
}

fn is_movie_part(record: &ExtractedRecord) -> bool {
    matches!(record, ExtractedRecord::TextBlob { path, .. } if is_video_container(path))
}

/// Create the parent directories of `target`, refusing when an existing file
/// or directory already occupies part of the path.
fn prepare_target(target: &Path) -> Result<(), ExtractionError> {
    if target.is_dir() {
        return Err(ExtractionError::PathCollision {
            path: target.to_path_buf(),
            blocking: target.to_path_buf(),
        });
    }
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    if let Some(blocking) = parent.ancestors().find(|ancestor| ancestor.is_file()) {
        return Err(ExtractionError::PathCollision {
            path: target.to_path_buf(),
            blocking: blocking.to_path_buf(),
        });
    }
    std::fs::create_dir_all(parent)?;
    Ok(())
}

fn write_image(
    pixels: &PixelBuffer,
    target: &Path,
    format: ImageFormat,
) -> Result<(), ExtractionError> {
    let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(pixels.width, pixels.height, pixels.rgba.clone()).ok_or_else(
            || {
                ExtractionError::Image(format!(
                    "buffer of {} bytes does not hold {}x{} RGBA pixels",
                    pixels.rgba.len(),
                    pixels.width,
                    pixels.height
                ))
            },
        )?;
    prepare_target(target)?;
    buffer
        .save_with_format(target, format)
        .map_err(|e| ExtractionError::Image(e.to_string()))
}

/// Typed read first; fall back only when typed information is unavailable.
fn read_tree(tree: &dyn TreeAccessor) -> Result<serde_json::Value, ExtractionError> {
    match tree.read_typed() {
        Ok(value) => Ok(value),
        Err(TreeReadError::Unavailable) => tree.read_fallback().map_err(tree_error),
        Err(e) => Err(tree_error(e)),
    }
}

fn tree_error(e: TreeReadError) -> ExtractionError {
    match e {
        TreeReadError::Unavailable => {
            ExtractionError::Tree("no type information available".to_string())
        }
        TreeReadError::Failed(message) => ExtractionError::Tree(message),
    }
}
