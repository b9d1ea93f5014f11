//! bsky-backup library
//!
//! Backs up a user's Bluesky posts: exports a repository snapshot from the
//! PDS, decodes the CAR block graph into structured records, persists a
//! local artifact, and optionally publishes it to content-addressed storage.

pub mod backup;
pub mod car;
pub mod config;
pub mod pds;
pub mod prompt;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use backup::{BackupArtifact, BackupFormat, BackupPipeline, BackupWriter};
pub use config::Config;
pub use utils::errors::{BackupError, Result};
