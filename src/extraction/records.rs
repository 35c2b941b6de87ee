//! Typed records produced by container parsing, and the collaborator traits
//! that produce and consume them.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::updater::errors::ExtractionError;

/// Path prefix under which container paths are declared.
pub const RESOURCE_ROOT: &str = "assets/sekai/assetbundle/resources";

/// Decoded RGBA image, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Why a type tree read did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeReadError {
    /// The object carries no type information for this read.
    Unavailable,
    Failed(String),
}

/// Lazily reads a structured object's tree.
pub trait TreeAccessor: Send {
    /// Read using the object's own type information.
    fn read_typed(&self) -> Result<Value, TreeReadError>;

    /// Read using externally supplied type information.
    fn read_fallback(&self) -> Result<Value, TreeReadError>;
}

/// One sub-asset of a container, tagged by kind.
pub enum ExtractedRecord {
    Image {
        path: String,
        pixels: PixelBuffer,
    },
    TextBlob {
        path: String,
        bytes: Vec<u8>,
    },
    StructuredObject {
        path: String,
        tree: Box<dyn TreeAccessor>,
    },
}

impl ExtractedRecord {
    pub fn path(&self) -> &str {
        match self {
            ExtractedRecord::Image { path, .. }
            | ExtractedRecord::TextBlob { path, .. }
            | ExtractedRecord::StructuredObject { path, .. } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExtractedRecord::Image { .. } => "image",
            ExtractedRecord::TextBlob { .. } => "text",
            ExtractedRecord::StructuredObject { .. } => "structured",
        }
    }
}

impl std::fmt::Debug for ExtractedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedRecord")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .finish()
    }
}

/// Parses a deobfuscated bundle into typed records.
pub trait ContainerParser: Send + Sync {
    fn parse(&self, data: &[u8], bundle_name: &str) -> Result<Vec<ExtractedRecord>, ExtractionError>;
}

/// Extension of whole bundles stored by [`PassthroughParser`].
pub const RAW_BUNDLE_EXTENSION: &str = "bundle";

/// Stores each bundle whole, as a single text blob at `<bundle name>.bundle`.
///
/// Bundle names nest (`music/a` and `music/a/b`), so the extension keeps a
/// bundle file from occupying the directory of its children.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughParser;

impl ContainerParser for PassthroughParser {
    fn parse(&self, data: &[u8], bundle_name: &str) -> Result<Vec<ExtractedRecord>, ExtractionError> {
        Ok(vec![ExtractedRecord::TextBlob {
            path: format!("{}/{}.{}", RESOURCE_ROOT, bundle_name, RAW_BUNDLE_EXTENSION),
            bytes: data.to_vec(),
        }])
    }
}

/// Output format of transcoded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Flac,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }
}

/// Decoded PCM audio in a WAV container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    pub wav: Vec<u8>,
}

/// Splits an audio container into its compressed streams.
pub trait AudioArchive: Send + Sync {
    /// Write every stream into `dir` and return the written paths.
    fn extract_streams(&self, data: &[u8], dir: &Path) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Decodes compressed streams and transcodes decoded audio.
pub trait AudioCodec: Send + Sync {
    fn decode(&self, data: &[u8], key: u64) -> Result<DecodedAudio, ExtractionError>;

    fn transcode(&self, audio: &DecodedAudio, format: AudioFormat)
        -> Result<Vec<u8>, ExtractionError>;
}

/// Demuxes a movie container into its elementary streams.
pub trait VideoArchive: Send + Sync {
    /// Write every stream into `dir` and return the written paths.
    fn extract_streams(&self, data: &[u8], dir: &Path) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Re-encodes an MPEG-2 video stream as MP4.
pub trait VideoCodec: Send + Sync {
    fn to_mp4(&self, source: &Path, target: &Path) -> Result<(), ExtractionError>;
}
