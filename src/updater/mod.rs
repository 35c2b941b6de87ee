//! Asset updater
//!
//! Keeps a local mirror of a region's asset bundles in sync: resolves the asset
//! version, decrypts the bundle manifest, diffs it against the persisted state and
//! downloads, deobfuscates and extracts whatever changed.

mod coordinator;
mod credentials;
mod cryptor;
mod diff;
pub mod errors;
mod manifest;
mod models;
mod obfuscator;
mod orchestrator;
mod profile;
mod request;
mod retry_policy;
mod runner;
mod state_store;
mod transport;
mod uploader;
mod version_resolver;

pub use coordinator::{RunCoordinator, RunGuard};
pub use credentials::CredentialNegotiator;
pub use cryptor::Cryptor;
pub use diff::{DiffEngine, DiffSet};
pub use errors::*;
pub use manifest::ManifestFetcher;
pub use models::*;
pub use obfuscator::{deobfuscate, deobfuscate_file, obfuscate, obfuscate_file};
pub use orchestrator::{DownloadOrchestrator, DownloadOutcome, MAX_CONCURRENT_DOWNLOADS};
pub use profile::{
    ServerProfile, DEFAULT_COOKIE_SIGNATURE_URL, DEFAULT_CP_PROFILE, DEFAULT_UNITY_VERSION,
};
pub use request::{time_arg, tokyo_now, with_time_arg};
pub use retry_policy::RetryPolicy;
pub use runner::{AssetUpdater, RegionStatus};
pub use state_store::StateStore;
pub use transport::{AssetTransport, ProxyFailoverTransport, TransportResponse};
pub use uploader::{CloudUploader, RemoteStorage, UploadTargets, DEFAULT_CONCURRENT_UPLOADS};
pub use version_resolver::{ResolvedEndpoints, VersionResolver};
