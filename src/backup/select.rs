//! Enumeration of previously written backup artifacts.

use crate::backup::writer::BackupFormat;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata for one existing backup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub format: BackupFormat,
}

/// List backup artifacts under `root`, newest first.
///
/// Only files with the two artifact extensions are considered; anything else
/// is ignored. Because artifact names embed a lexicographically sortable
/// timestamp, sorting file names descending yields newest-first. A missing
/// directory is "nothing to upload", not an error.
pub fn list_backups(root: &Path) -> Result<Vec<BackupEntry>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(format) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(BackupFormat::from_extension)
        else {
            continue;
        };

        entries.push(BackupEntry {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            size: entry.metadata()?.len(),
            format,
            path,
        });
    }

    entries.sort_by(|a, b| b.file_name.cmp(&a.file_name));
    Ok(entries)
}
