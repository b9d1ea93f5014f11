//! Backup pipeline: fetch, decode, write, and optionally publish.
//!
//! The flow is strictly sequential, one artifact in flight at a time. An
//! upload failure aborts only the upload; the local artifact is never
//! rolled back, and can be re-published later via [`upload_existing`].
//!
//! [`upload_existing`]: BackupPipeline::upload_existing

pub mod select;
pub mod writer;

pub use select::{list_backups, BackupEntry};
pub use writer::{BackupArtifact, BackupFormat, BackupWriter};

use crate::car::decode_car;
use crate::pds::SnapshotSource;
use crate::prompt::Prompter;
use crate::storage::{upload_artifact, StorageBackend, UploadResult};
use crate::utils::errors::BackupError;
use crate::utils::format::format_size;
use crate::Result;
use std::path::Path;
use tracing::{info, warn};

/// Where structured-document records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Fetch the repository archive and decode its blocks.
    Repo,
    /// Use the flat record listing from the PDS.
    Records { limit: u32 },
}

/// Wires the snapshot source, writer, storage backend, and injected
/// decision callbacks into the backup flows.
pub struct BackupPipeline<'a, S, B> {
    source: &'a S,
    backend: &'a B,
    prompter: &'a dyn Prompter,
    writer: BackupWriter,
    default_space: Option<String>,
}

impl<'a, S: SnapshotSource, B: StorageBackend> BackupPipeline<'a, S, B> {
    pub fn new(source: &'a S, backend: &'a B, prompter: &'a dyn Prompter, writer: BackupWriter) -> Self {
        Self {
            source,
            backend,
            prompter,
            writer,
            default_space: None,
        }
    }

    /// Configured space (DID or name) to upload into without prompting.
    pub fn with_default_space(mut self, space: Option<String>) -> Self {
        self.default_space = space;
        self
    }

    /// Back up posts for `did`: pick a format, fetch and persist, then
    /// offer to publish. Returns the written artifact.
    ///
    /// An empty record set is terminal: nothing is written and the upload
    /// prompt is never reached.
    pub async fn backup_posts(&self, did: &str, records_from: RecordSource) -> Result<BackupArtifact> {
        let format = self.prompter.choose_format(BackupFormat::Car)?;

        let artifact = match format {
            BackupFormat::Car => {
                let bytes = self.source.fetch_archive(did).await?;
                info!("retrieved {} of repository data", format_size(bytes.len() as u64));
                self.writer.write_archive(&bytes)?
            }
            BackupFormat::Json => match records_from {
                RecordSource::Repo => {
                    let bytes = self.source.fetch_archive(did).await?;
                    let records = decode_car(&bytes)?;
                    info!("decoded {} records from repository snapshot", records.len());
                    self.writer.write_document(&records)?
                }
                RecordSource::Records { limit } => {
                    let records = self.source.list_records(did, limit).await?;
                    info!("retrieved {} posts", records.len());
                    self.writer.write_document(&records)?
                }
            },
        };

        if self.prompter.confirm_upload()? {
            self.publish(&artifact.path, artifact.format).await;
        }
        Ok(artifact)
    }

    /// Offer a previously written artifact for upload without re-fetching.
    pub async fn upload_existing(&self) -> Result<()> {
        let entries = list_backups(self.writer.root())?;
        if entries.is_empty() {
            info!("no backup files found in {}", self.writer.root().display());
            return Ok(());
        }

        let Some(idx) = self.prompter.choose_backup(&entries)? else {
            return Ok(());
        };
        let entry = &entries[idx];
        self.publish(&entry.path, entry.format).await;
        Ok(())
    }

    /// Run the upload orchestrator and report the outcome. A failed upload
    /// is reported, not propagated: the artifact on disk stays valid.
    async fn publish(&self, path: &Path, format: BackupFormat) {
        let space = self.default_space.as_deref();
        match upload_artifact(self.backend, self.prompter, path, format, space).await {
            Ok(UploadResult { cid, gateway_url }) => {
                info!("backup uploaded successfully");
                info!("  IPFS CID: {cid}");
                info!("  Gateway URL: {gateway_url}");
            }
            Err(BackupError::Aborted) => {
                info!("upload cancelled");
            }
            Err(e) => {
                warn!("{e}");
                warn!("your backup is still saved locally at {}", path.display());
            }
        }
    }
}
