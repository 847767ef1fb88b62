//! Backup rotation for full-dataset writes
//!
//! Before a store is overwritten with a freshly generated dataset, the
//! existing dataset is archived under a timestamped name. The naming pattern
//! `BKP_<timestamp>_<name>` is shared by the file store, the document-store
//! backup collection, and the relational backup tables.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{FilterError, Result};

/// Timestamp format used in backup names.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Current local time in backup-name form (`YYYY_MM_DD_HH_MM_SS`).
#[must_use]
pub fn backup_timestamp() -> String {
    Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string()
}

/// Backup name for a file, table, or collection.
#[must_use]
pub fn backup_name(name: &str) -> String {
    format!("BKP_{}_{}", backup_timestamp(), name)
}

/// Rotate the primary snapshot file before a rewrite.
///
/// Ensures the storage and backup directories exist (creating them if
/// missing) and, when a primary file is present, renames it into the backup
/// directory under a timestamped name. Returns the archive path when a
/// rotation happened.
pub fn rotate_snapshot(
    storage_dir: &Path,
    backup_dir: &str,
    file_name: &str,
) -> Result<Option<PathBuf>> {
    let backup_path = storage_dir.join(backup_dir);
    fs::create_dir_all(&backup_path).map_err(FilterError::operation)?;

    let primary = storage_dir.join(file_name);
    if !primary.exists() {
        return Ok(None);
    }

    let archive = backup_path.join(backup_name(file_name));
    fs::rename(&primary, &archive).map_err(FilterError::operation)?;
    info!(
        archive = %archive.display(),
        "existing snapshot archived before rewrite"
    );
    Ok(Some(archive))
}
