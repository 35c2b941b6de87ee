//! Movie container extraction: merged parts -> demuxed streams -> optional MP4.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::records::{VideoArchive, VideoCodec};
use crate::updater::errors::ExtractionError;

/// Suffixes of movie containers stored as text assets.
pub const VIDEO_CONTAINER_SUFFIXES: [&str; 2] = [".usm", ".usm.bytes"];

pub fn is_video_container(path: &str) -> bool {
    let lower = path.to_lowercase();
    VIDEO_CONTAINER_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOptions {
    pub convert_to_mp4: bool,
    pub keep_m2v: bool,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            convert_to_mp4: false,
            keep_m2v: true,
        }
    }
}

#[derive(Clone)]
pub struct VideoExtractionPipeline {
    archive: Arc<dyn VideoArchive>,
    codec: Option<Arc<dyn VideoCodec>>,
    keep_m2v: bool,
}

impl VideoExtractionPipeline {
    /// Without a codec, demuxed streams are kept as they are.
    pub fn new(archive: Arc<dyn VideoArchive>, codec: Option<Arc<dyn VideoCodec>>) -> Self {
        Self {
            archive,
            codec,
            keep_m2v: true,
        }
    }

    pub fn with_keep_m2v(mut self, keep_m2v: bool) -> Self {
        self.keep_m2v = keep_m2v;
        self
    }

    /// Where a movie split over several parts is reassembled: `<dir>/<dir name>.usm`.
    pub fn merged_path(first_part: &Path) -> PathBuf {
        let dir = first_part.parent().unwrap_or_else(|| Path::new("."));
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "movie".to_string());
        dir.join(format!("{}.usm", name))
    }

    /// Demux the movie made of `parts`, concatenated in order, that would live at `container_path`.
    ///
    /// Outputs land next to the container and the container itself is removed.
    pub fn run(&self, parts: &[Vec<u8>], container_path: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let dir = match container_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if parts.is_empty() {
            return Err(ExtractionError::Video(format!(
                "no movie parts for {:?}",
                container_path
            )));
        }
        std::fs::create_dir_all(&dir)?;

        let merged = parts.concat();
        if parts.len() > 1 {
            debug!("Merged {} movie parts into {:?}", parts.len(), container_path);
        }

        let streams = self.archive.extract_streams(&merged, &dir)?;
        let mut outputs = Vec::with_capacity(streams.len());
        for stream in streams {
            match &self.codec {
                Some(codec) if is_m2v(&stream) => {
                    let mp4 = stream.with_extension("mp4");
                    codec.to_mp4(&stream, &mp4)?;
                    outputs.push(mp4);
                    if self.keep_m2v {
                        outputs.push(stream);
                    } else {
                        std::fs::remove_file(&stream)?;
                    }
                }
                _ => outputs.push(stream),
            }
        }

        if container_path.exists() {
            std::fs::remove_file(container_path)?;
        }
        Ok(outputs)
    }
}

fn is_m2v(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("m2v"))
        .unwrap_or(false)
}
