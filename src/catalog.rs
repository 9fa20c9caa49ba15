//! Backup catalog: snapshot files kept under `<workspace>/backups/`.
//!
//! The catalog only manages file handles. It recognizes its own files by
//! the name marker and extension, lists newest first (the stamp sorts
//! lexicographically), and treats deleting a missing file as success.

use anyhow::{bail, Context};
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::snapshot::{self, SnapshotDocument};

pub const BACKUP_DIR_NAME: &str = "backups";
const BACKUP_MARKER: &str = "college-backup-";
const BACKUP_EXT: &str = ".json";

pub fn backup_dir(workspace: &Path) -> PathBuf {
    workspace.join(BACKUP_DIR_NAME)
}

fn stamped_file_name() -> String {
    // The stamp sorts the catalog; the suffix keeps snapshots taken within
    // the same second from overwriting each other.
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}-{}{}",
        BACKUP_MARKER,
        Utc::now().format("%Y%m%dT%H%M%SZ"),
        &suffix[..8],
        BACKUP_EXT
    )
}

fn is_backup_file_name(name: &str) -> bool {
    name.starts_with(BACKUP_MARKER) && name.ends_with(BACKUP_EXT)
}

fn checked_path(workspace: &Path, file_name: &str) -> anyhow::Result<PathBuf> {
    if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
        bail!("invalid backup file name: {}", file_name);
    }
    if !is_backup_file_name(file_name) {
        bail!("not a backup file: {}", file_name);
    }
    Ok(backup_dir(workspace).join(file_name))
}

/// Writes the document into the catalog, returning the stored file name.
pub fn save_snapshot(workspace: &Path, doc: &SnapshotDocument) -> anyhow::Result<String> {
    let dir = backup_dir(workspace);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    let file_name = stamped_file_name();
    let text = snapshot::to_json_string(doc)?;
    let path = dir.join(&file_name);
    std::fs::write(&path, text)
        .with_context(|| format!("failed to write backup {}", path.to_string_lossy()))?;
    Ok(file_name)
}

/// Catalog listing, newest first. A workspace with no backups directory
/// has an empty catalog.
pub fn list_backups(workspace: &Path) -> anyhow::Result<Vec<String>> {
    let dir = backup_dir(workspace);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir)
        .with_context(|| format!("failed to read directory {}", dir.to_string_lossy()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.file_type()?.is_file() && is_backup_file_name(&name) {
            names.push(name);
        }
    }
    names.sort_by(|a, b| b.cmp(a));
    Ok(names)
}

/// Removes a cataloged file. Returns whether a file was actually removed;
/// a missing file is not an error.
pub fn delete_backup(workspace: &Path, file_name: &str) -> anyhow::Result<bool> {
    let path = checked_path(workspace, file_name)?;
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.to_string_lossy())),
    }
}

pub fn read_backup(workspace: &Path, file_name: &str) -> anyhow::Result<String> {
    let path = checked_path(workspace, file_name)?;
    std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read backup {}", path.to_string_lossy()))
}
