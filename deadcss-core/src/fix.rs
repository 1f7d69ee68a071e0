//! Persisting pruned stylesheets.
//!
//! Never panics; every failure is returned so the orchestrator can record
//! it against the stylesheet and move on.
//!
//! Features:
//! - Dry-run support (report what would be written)
//! - Timestamped backup of the original next to it
//! - Atomic overwrite (temp file + rename)
//! - Refuses to write through symlinks

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::error::{DeadcssError, DeadcssResult, IoResultExt};

/// Backup file extension; never matched by discovery.
pub const BACKUP_EXTENSION: &str = "bak";

/// How pruned output is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    /// Report without touching the filesystem
    pub dry_run: bool,
    /// Keep a copy of the original before overwriting
    pub backup: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
        }
    }
}

/// What happened to one stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixAction {
    /// Pruned text equals the original; nothing written
    Unchanged,
    /// Dry run: the file would have been rewritten
    WouldWrite,
    /// The file was rewritten
    Written { backup: Option<PathBuf> },
}

/// `styles.css` → `styles.css.20261019143005.bak`, with `-1`, `-2`, ...
/// appended if that name is taken.
pub fn backup_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stamp = at.format("%Y%m%d%H%M%S");

    let mut candidate = path.with_file_name(format!("{}.{}.{}", file_name, stamp, BACKUP_EXTENSION));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!(
            "{}.{}-{}.{}",
            file_name, stamp, n, BACKUP_EXTENSION
        ));
        n += 1;
    }
    candidate
}

/// Writes `original` to a fresh backup file and returns its path.
pub fn write_backup(path: &Path, original: &str) -> DeadcssResult<PathBuf> {
    let backup = backup_path(path, Local::now());
    fs::write(&backup, original).with_path(&backup)?;
    Ok(backup)
}

/// Replaces the file's content through a temp file and rename.
///
/// Prevents a half-written stylesheet if the process is interrupted. The
/// original's permission bits carry over to the replacement.
pub fn write_atomic(path: &Path, content: &str) -> DeadcssResult<()> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path =
        path.with_file_name(format!(".{}.{}.{}.tmp", file_name, std::process::id(), nanos));

    fs::write(&temp_path, content).with_path(&temp_path)?;

    let replaced = fs::metadata(path)
        .and_then(|metadata| fs::set_permissions(&temp_path, metadata.permissions()))
        .and_then(|()| fs::rename(&temp_path, path));
    if let Err(e) = replaced {
        let _ = fs::remove_file(&temp_path);
        return Err(DeadcssError::io(path, e));
    }
    Ok(())
}

/// Persists pruned output for one stylesheet.
///
/// Nothing is written when `pruned == original`. Symlinks and non-regular
/// files are refused.
pub fn apply_fix(
    path: &Path,
    original: &str,
    pruned: &str,
    options: &FixOptions,
) -> DeadcssResult<FixAction> {
    if pruned == original {
        return Ok(FixAction::Unchanged);
    }

    // Security check: Get metadata without following symlinks
    let metadata = path.symlink_metadata().with_path(path)?;
    if metadata.file_type().is_symlink() {
        return Err(DeadcssError::fix(path, "refusing to rewrite a symlink"));
    }
    if !metadata.is_file() {
        return Err(DeadcssError::fix(path, "not a regular file"));
    }

    if options.dry_run {
        info!(path = %path.display(), "would rewrite stylesheet");
        return Ok(FixAction::WouldWrite);
    }

    let backup = if options.backup {
        Some(write_backup(path, original)?)
    } else {
        None
    };
    write_atomic(path, pruned)?;

    info!(
        path = %path.display(),
        backup = ?backup.as_ref().map(|b| b.display().to_string()),
        "rewrote stylesheet"
    );
    Ok(FixAction::Written { backup })
}
