//! Sekai Asset Updater Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod extraction;
pub mod server;
pub mod updater;

// Re-export commonly used types for convenience
pub use server::{run_server, RequestsLoggingLevel};
pub use updater::{AssetUpdater, RunCoordinator, ServerRegion};
