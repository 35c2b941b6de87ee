//! Audio container extraction: streams -> decoded WAV -> transcoded output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::records::{AudioArchive, AudioCodec, AudioFormat};
use crate::updater::errors::ExtractionError;

/// Key the game's compressed audio streams are encrypted with.
pub const STREAM_KEY: u64 = 88888888;

/// Suffix of audio containers stored as text assets.
pub const AUDIO_CONTAINER_SUFFIX: &str = ".acb.bytes";

/// Directory of full-length songs, which also ship VR and screen mixes.
const LONG_MUSIC_DIR: &str = "music/long";

/// What to keep from each decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioOptions {
    /// Decode streams to WAV. Off keeps the raw compressed streams.
    pub decode_streams: bool,
    /// Transcode target. `None` keeps only the WAV.
    pub format: Option<AudioFormat>,
    pub keep_wav: bool,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            decode_streams: true,
            format: Some(AudioFormat::Mp3),
            keep_wav: false,
        }
    }
}

#[derive(Clone)]
pub struct AudioExtractionPipeline {
    archive: Arc<dyn AudioArchive>,
    codec: Option<Arc<dyn AudioCodec>>,
    key: u64,
    format: Option<AudioFormat>,
    keep_wav: bool,
}

impl AudioExtractionPipeline {
    pub fn new(archive: Arc<dyn AudioArchive>, codec: Arc<dyn AudioCodec>) -> Self {
        Self {
            archive,
            codec: Some(codec),
            key: STREAM_KEY,
            format: Some(AudioFormat::Mp3),
            keep_wav: false,
        }
    }

    /// Only split containers; streams stay compressed.
    pub fn without_decoding(archive: Arc<dyn AudioArchive>) -> Self {
        Self {
            archive,
            codec: None,
            key: STREAM_KEY,
            format: None,
            keep_wav: false,
        }
    }

    pub fn with_options(mut self, options: AudioOptions) -> Self {
        self.format = options.format;
        self.keep_wav = options.keep_wav;
        self
    }

    /// Extract every stream of the container that would live at `container_path`.
    ///
    /// Outputs land next to the container. Intermediate files are removed as each
    /// stream completes; on error, whatever was written so far stays on disk.
    pub fn run(&self, data: &[u8], container_path: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let dir = match container_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let streams = self.archive.extract_streams(data, &dir)?;
        let drop_variants = is_long_music(container_path);
        let mut outputs = Vec::with_capacity(streams.len());

        for stream in streams {
            let stem = stream
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    ExtractionError::Audio(format!("stream path has no file name: {:?}", stream))
                })?;

            if drop_variants && is_mix_variant(&stem) {
                std::fs::remove_file(&stream)?;
                debug!("Dropped audio variant {:?}", stream);
                continue;
            }

            match &self.codec {
                Some(codec) => {
                    outputs.extend(self.decode_stream(codec.as_ref(), &stream, &stem, &dir)?)
                }
                None => outputs.push(stream),
            }
        }

        if container_path.exists() {
            std::fs::remove_file(container_path)?;
        }
        Ok(outputs)
    }

    fn decode_stream(
        &self,
        codec: &dyn AudioCodec,
        stream: &Path,
        stem: &str,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let encoded = std::fs::read(stream)?;
        let decoded = codec.decode(&encoded, self.key)?;
        let wav_path = dir.join(format!("{}.wav", stem));
        std::fs::write(&wav_path, &decoded.wav)?;

        let mut outputs = Vec::with_capacity(2);
        if let Some(format) = self.format {
            let transcoded = codec.transcode(&decoded, format)?;
            let output_path = dir.join(format!("{}.{}", stem, format.extension()));
            std::fs::write(&output_path, transcoded)?;
            outputs.push(output_path);
        }

        if self.keep_wav {
            outputs.push(wav_path);
        } else {
            std::fs::remove_file(&wav_path)?;
        }
        std::fs::remove_file(stream)?;
        debug!("Extracted audio stream {:?}", stream);
        Ok(outputs)
    }
}

fn is_long_music(container_path: &Path) -> bool {
    container_path
        .to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
        .contains(LONG_MUSIC_DIR)
}

fn is_mix_variant(stem: &str) -> bool {
    let stem = stem.to_lowercase();
    stem.ends_with("_vr") || stem.ends_with("_screen")
}
