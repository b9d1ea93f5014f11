//! Local backup artifact writer.
//!
//! Artifacts are named `<root>/bluesky-posts-<timestamp>.<ext>` with an
//! RFC 3339 UTC timestamp (second granularity, ':' and '.' replaced by '-'
//! so names stay filesystem-safe and sort lexicographically by age).
//! Writes go through a `.part` sibling and a rename, so a partially written
//! artifact is never visible to enumeration.

use crate::utils::errors::BackupError;
use crate::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name prefix shared by all backup artifacts.
pub const BACKUP_PREFIX: &str = "bluesky-posts";

/// The two artifact representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    /// Structured document: records wrapped in a JSON envelope.
    Json,
    /// Verbatim repository archive bytes.
    Car,
}

impl BackupFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            BackupFormat::Json => "json",
            BackupFormat::Car => "car",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            BackupFormat::Json => "application/json",
            BackupFormat::Car => "application/vnd.ipld.car",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(BackupFormat::Json),
            "car" => Some(BackupFormat::Car),
            _ => None,
        }
    }
}

impl fmt::Display for BackupFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupFormat::Json => f.write_str("JSON"),
            BackupFormat::Car => f.write_str("CAR"),
        }
    }
}

/// A written backup artifact. Created once, never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub format: BackupFormat,
    pub size: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupEnvelope<'a, T> {
    backup_date: String,
    post_count: usize,
    posts: &'a [T],
}

/// Writes backup artifacts under a fixed root directory.
pub struct BackupWriter {
    root: PathBuf,
}

impl BackupWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write records as a structured JSON document.
    ///
    /// An empty record sequence writes nothing and returns
    /// [`BackupError::NoRecords`]; the backup directory is still created so
    /// the failure leaves the filesystem in a usable state.
    pub fn write_document<T: Serialize>(&self, records: &[T]) -> Result<BackupArtifact> {
        fs::create_dir_all(&self.root)?;
        if records.is_empty() {
            return Err(BackupError::NoRecords);
        }

        let envelope = BackupEnvelope {
            backup_date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            post_count: records.len(),
            posts: records,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        self.commit(BackupFormat::Json, &bytes)
    }

    /// Write the repository archive bytes verbatim.
    pub fn write_archive(&self, bytes: &[u8]) -> Result<BackupArtifact> {
        fs::create_dir_all(&self.root)?;
        self.commit(BackupFormat::Car, bytes)
    }

    fn commit(&self, format: BackupFormat, bytes: &[u8]) -> Result<BackupArtifact> {
        let path = self.unique_path(format);
        let tmp = path.with_extension(format!("{}.part", format.extension()));

        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(path = %path.display(), size = bytes.len(), "backup saved");
        Ok(BackupArtifact {
            path,
            format,
            size: bytes.len() as u64,
        })
    }

    /// Timestamp-derived artifact path. Same-second invocations get a
    /// numeric suffix instead of silently overwriting.
    fn unique_path(&self, format: BackupFormat) -> PathBuf {
        let timestamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .replace([':', '.'], "-");
        let base = format!("{BACKUP_PREFIX}-{timestamp}");
        let ext = format.extension();

        let candidate = self.root.join(format!("{base}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        let mut n = 2u32;
        loop {
            let candidate = self.root.join(format!("{base}-{n}.{ext}"));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}
