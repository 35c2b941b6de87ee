//! Error types for the synchronization engine.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors from manifest encryption and decryption.
#[derive(Debug, Error)]
pub enum CryptorError {
    #[error("Invalid AES key or IV length (key: {key_len}, iv: {iv_len})")]
    InvalidKey { key_len: usize, iv_len: usize },

    #[error("Invalid hex string: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Decrypt error: {0}")]
    Decrypt(String),

    #[error("Deserialize error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),
}

/// Errors from a single transport attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to proxy {proxy}: {message}")]
    ProxyConnection { proxy: String, message: String },

    #[error("All proxies failed to connect, last: {0}")]
    ProxiesExhausted(Box<TransportError>),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors resolving the asset version for a region.
#[derive(Debug, Error)]
pub enum VersionResolutionError {
    #[error("No environment hash configured for profile '{0}'")]
    MissingProfile(String),

    #[error("Missing URL template: {0}")]
    MissingTemplate(&'static str),

    #[error("Asset hash is required for this region")]
    MissingAssetHash,

    #[error("Asset version endpoint unreachable (primary: {primary}, fallback: {fallback})")]
    Unreachable { primary: String, fallback: String },

    #[error("Asset version response is not valid UTF-8")]
    InvalidResponse,
}

/// Errors extracting a single record.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container parse error: {0}")]
    Parse(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Type tree error: {0}")]
    Tree(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Video error: {0}")]
    Video(String),

    #[error("Cannot write {path:?}: {blocking:?} is in the way")]
    PathCollision { path: PathBuf, blocking: PathBuf },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Errors running an external program.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Errors pushing exported files to a remote storage.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{file:?} is not under the export root {root:?}")]
    OutsideRoot { file: PathBuf, root: PathBuf },

    #[error("Failed to upload {file:?} to {remote}: {source}")]
    Command {
        file: PathBuf,
        remote: String,
        source: ToolError,
    },

    #[error("Uploaded but failed to delete local file {file:?}: {source}")]
    RemoveLocal {
        file: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that abort an updater run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Region {0} is not configured")]
    RegionNotConfigured(String),

    #[error("Version resolution failed: {0}")]
    VersionResolution(#[from] VersionResolutionError),

    #[error("Failed to fetch asset bundle manifest: {0}")]
    ManifestUnavailable(TransportError),

    #[error("Invalid asset bundle manifest: {0}")]
    Manifest(#[from] CryptorError),

    #[error("State store error: {0}")]
    State(#[from] std::io::Error),
}
