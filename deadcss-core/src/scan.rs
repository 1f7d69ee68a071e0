//! Parallel, deterministic discovery of markup/stylesheet groups.
//!
//! Performance optimizations:
//! - Early directory pruning via `WalkDir::filter_entry` (O(1) subtree skip)
//! - Parallel file classification via Rayon's `par_bridge`
//!
//! ## Grouping
//!
//! Files are grouped by directory and base name (the file name without its
//! last extension), so `app.component.html`, `app.component.scss` and
//! `app.component.css` form one group keyed `app.component`. A group needs
//! exactly one markup file to be processed; when several markup files share
//! a base name the one whose extension comes first in the configured list
//! wins and the rest are reported.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories to exclude by default (build output and dependency trees).
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    ".angular",
    "coverage",
];

/// Markup extensions recognized by default, in priority order.
pub const DEFAULT_MARKUP_EXTENSIONS: &[&str] = &["html", "htm"];

/// Stylesheet extensions recognized by default.
pub const DEFAULT_STYLESHEET_EXTENSIONS: &[&str] = &["css", "scss", "less"];

/// File-type configuration for discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Markup extensions without the dot, highest priority first
    pub markup_extensions: Vec<String>,
    /// Stylesheet extensions without the dot
    pub stylesheet_extensions: Vec<String>,
    /// Directory names skipped in addition to [`EXCLUDED_DIRS`]
    pub excluded_dirs: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            markup_extensions: DEFAULT_MARKUP_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            stylesheet_extensions: DEFAULT_STYLESHEET_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_dirs: Vec::new(),
        }
    }
}

/// Role of a discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    /// Markup with its priority (index into the markup extension list)
    Markup(usize),
    Stylesheet,
}

/// Markup file plus the stylesheets that share its directory and base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    /// Directory containing every file of the group
    pub dir: PathBuf,
    /// File name without its last extension
    pub base_name: String,
    /// The markup file, if the group has one
    pub markup: Option<PathBuf>,
    /// Further markup files with the same base name, not processed
    pub shadowed_markup: Vec<PathBuf>,
    /// Stylesheets, sorted by path
    pub stylesheets: Vec<PathBuf>,
}

impl FileGroup {
    fn new(dir: PathBuf, base_name: String) -> Self {
        Self {
            dir,
            base_name,
            markup: None,
            shadowed_markup: Vec::new(),
            stylesheets: Vec::new(),
        }
    }

    /// A group is processable only with a markup file.
    pub fn is_valid(&self) -> bool {
        self.markup.is_some()
    }

    /// `dir/base_name`, for display.
    pub fn key(&self) -> PathBuf {
        self.dir.join(&self.base_name)
    }
}

/// Checks if a directory entry should be pruned (excluded from traversal).
///
/// The walk root itself is never pruned, whatever its name.
#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry, excludes: &HashSet<&str>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excludes.contains(name))
}

fn classify(path: &Path, options: &ScanOptions) -> Option<FileKind> {
    let ext = path.extension()?.to_str()?;
    if let Some(rank) = options
        .markup_extensions
        .iter()
        .position(|m| m.eq_ignore_ascii_case(ext))
    {
        return Some(FileKind::Markup(rank));
    }
    options
        .stylesheet_extensions
        .iter()
        .any(|s| s.eq_ignore_ascii_case(ext))
        .then_some(FileKind::Stylesheet)
}

/// Gathers markup and stylesheet files under `root` and groups them.
///
/// Groups come back sorted by directory and base name. Groups without a
/// markup file are included (see [`FileGroup::is_valid`]) so callers can
/// report them.
pub fn gather_file_groups(root: &Path, options: &ScanOptions) -> Result<Vec<FileGroup>> {
    let excludes: HashSet<&str> = EXCLUDED_DIRS
        .iter()
        .copied()
        .chain(options.excluded_dirs.iter().map(String::as_str))
        .collect();

    let files = WalkDir::new(root)
        .into_iter()
        // CRITICAL: filter_entry prunes entire subtrees before iteration
        .filter_entry(|e| !is_excluded_dir(e, &excludes))
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) => {
                if !e.file_type().is_file() {
                    return None;
                }
                classify(e.path(), options).map(|kind| Ok((e.into_path(), kind)))
            }
            Err(e) => Some(Err(e.into())),
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to gather files from {}", root.display()))?;

    Ok(group_files(files))
}

fn group_files(mut files: Vec<(PathBuf, FileKind)>) -> Vec<FileGroup> {
    // par_bridge yields in arbitrary order; sort so markup priority ties are stable
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut groups: BTreeMap<(PathBuf, String), (FileGroup, usize)> = BTreeMap::new();

    for (path, kind) in files {
        let (Some(dir), Some(stem)) = (path.parent(), path.file_stem()) else {
            continue;
        };
        let key = (dir.to_path_buf(), stem.to_string_lossy().to_string());
        let (group, best_rank) = groups
            .entry(key.clone())
            .or_insert_with(|| (FileGroup::new(key.0, key.1), usize::MAX));

        match kind {
            FileKind::Stylesheet => group.stylesheets.push(path),
            FileKind::Markup(rank) if rank < *best_rank => {
                if let Some(previous) = group.markup.replace(path) {
                    group.shadowed_markup.push(previous);
                }
                *best_rank = rank;
            }
            FileKind::Markup(_) => group.shadowed_markup.push(path),
        }
    }

    groups.into_values().map(|(group, _)| group).collect()
}
