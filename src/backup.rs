//! Backup snapshots of server directories.
//!
//! A snapshot is a plain recursive copy of a server's directory placed under
//! the backups root as `<server id>_<YYYY-MM-DD_HH-MM-SS>`. Runtime files
//! (`*.pid`, `current.log`) are left out so a restored snapshot never looks
//! like a running server.
//!
//! Copies run on the blocking thread pool and cannot be cancelled. A copy
//! that fails part way leaves the partial snapshot directory in place.
use crate::config::ServerDefinition;
use crate::error::{Error, Result};
use crate::server::runtime::{POINTER_FILE, timestamp};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An existing snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupSnapshot {
    /// Directory name, `<server id>_<timestamp>`
    pub name: String,
    /// Full path of the snapshot directory
    pub path: PathBuf,
    /// Modification time of the snapshot directory
    pub created: DateTime<Local>,
    /// Total size of the contained files
    pub size_bytes: u64,
    /// `size_bytes` in megabytes
    pub size_mb: f64,
}

/// Creates and lists snapshots under one backups root.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backups_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            backups_dir: backups_dir.into(),
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Copies the server directory into a new snapshot and returns its name.
    #[tracing::instrument(skip(self, definition), fields(server_id = %id))]
    pub async fn create(&self, id: &str, definition: &ServerDefinition) -> Result<String> {
        let source = definition.path.clone();
        if !tokio::fs::metadata(&source)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(Error::Io(format!(
                "Server directory not found: {}",
                source.display()
            )));
        }

        let name = format!("{}_{}", id, timestamp(Local::now()));
        let target = self.backups_dir.join(&name);
        let backups_dir = self.backups_dir.clone();

        tracing::info!(source = %source.display(), target = %target.display(), "Creating backup");
        let copied = tokio::task::spawn_blocking(move || -> Result<u64> {
            std::fs::create_dir_all(&backups_dir)?;
            // create_dir refuses to merge into a snapshot taken in the same second
            std::fs::create_dir(&target)?;
            copy_tree(&source, &target)
        })
        .await
        .map_err(|e| Error::Other(format!("Backup task failed: {}", e)))?;

        match copied {
            Ok(bytes) => {
                tracing::info!(backup = %name, bytes, "Backup created");
                Ok(name)
            }
            Err(e) => {
                tracing::error!(backup = %name, error = %e, "Backup failed");
                Err(e)
            }
        }
    }

    /// Lists snapshots, newest first, optionally only those of one server.
    ///
    /// Unreadable entries are skipped; a missing backups root yields nothing.
    pub async fn list(&self, server_id: Option<&str>) -> Vec<BackupSnapshot> {
        let backups_dir = self.backups_dir.clone();
        let prefix = server_id.map(|id| format!("{}_", id));

        let listed = tokio::task::spawn_blocking(move || scan(&backups_dir, prefix.as_deref())).await;
        match listed {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::error!(error = %e, "Backup listing task failed");
                Vec::new()
            }
        }
    }
}

fn is_runtime_file(name: &OsStr) -> bool {
    name == OsStr::new(POINTER_FILE) || Path::new(name).extension() == Some(OsStr::new("pid"))
}

/// Copies `source` into the existing directory `target`, returning bytes copied.
fn copy_tree(source: &Path, target: &Path) -> Result<u64> {
    let mut copied = 0;
    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_runtime_file(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(format!("Failed to walk server directory: {}", e)))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::Other(e.to_string()))?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            copied += std::fs::copy(entry.path(), &destination).map_err(|e| {
                Error::Io(format!("Failed to copy {}: {}", entry.path().display(), e))
            })?;
        }
    }

    Ok(copied)
}

fn scan(backups_dir: &Path, prefix: Option<&str>) -> Vec<BackupSnapshot> {
    let entries = match std::fs::read_dir(backups_dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %backups_dir.display(), error = %e, "Cannot read backups directory");
            }
            return Vec::new();
        }
    };

    let mut snapshots: Vec<BackupSnapshot> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if prefix.is_some_and(|prefix| !name.starts_with(prefix)) {
                return None;
            }
            let metadata = entry.metadata().ok()?;
            if !metadata.is_dir() {
                return None;
            }
            let created = metadata.modified().ok()?.into();
            let size_bytes = dir_size(&entry.path());
            Some(BackupSnapshot {
                name,
                path: entry.path(),
                created,
                size_bytes,
                size_mb: size_bytes as f64 / 1024.0 / 1024.0,
            })
        })
        .collect();

    // timestamps sort lexicographically
    snapshots.sort_by(|a, b| b.name.cmp(&a.name));
    snapshots
}

fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_files_are_excluded() {
        assert!(is_runtime_file(OsStr::new("server.pid")));
        assert!(is_runtime_file(OsStr::new("other.pid")));
        assert!(is_runtime_file(OsStr::new("current.log")));
        assert!(!is_runtime_file(OsStr::new("latest.log")));
        assert!(!is_runtime_file(OsStr::new("server.properties")));
        assert!(!is_runtime_file(OsStr::new("pid")));
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan(&dir.path().join("nope"), None).is_empty());
    }
}
