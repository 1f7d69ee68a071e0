//! Builder pattern API for a pruning run.
//!
//! ```rust,ignore
//! use deadcss_core::prelude::*;
//!
//! let report = Deadcss::new("/path/to/app")
//!     .add_ignore_prefixes(["swiper-"])
//!     .dry_run(true)
//!     .run()?;
//!
//! for group in &report.groups {
//!     println!("{}: {:?}", group.group.display(), group.status);
//! }
//! ```
//!
//! Groups are processed in parallel. A group whose markup fails to parse is
//! skipped; a stylesheet that fails to parse is left untouched. Neither
//! affects any other group. Errors that are not tied to one file abort the
//! whole run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::SourceCache;
use crate::config::DeadcssConfig;
use crate::error::{DeadcssError, DeadcssResult};
use crate::extract::{extract_used_classes, UsedClassSet};
use crate::fix::{apply_fix, FixAction, FixOptions};
use crate::logging::log_skipped;
use crate::prune::{prune_report, StyleSyntax};
use crate::scan::{gather_file_groups, FileGroup, ScanOptions};

/// Class prefixes of UI frameworks whose classes are applied at runtime.
pub const DEFAULT_IGNORED_PREFIXES: &[&str] = &["ant", "ng-", "mat-", "cdk-"];

/// Builder for configuring a pruning run.
#[derive(Debug, Clone)]
pub struct Deadcss {
    /// Directory to walk
    root: PathBuf,

    /// Classes starting with any of these always survive
    ignored_prefixes: Vec<String>,

    /// File discovery settings
    scan: ScanOptions,

    /// Dry-run and backup settings
    fix: FixOptions,
}

impl Deadcss {
    /// Create a new run for the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignored_prefixes: DEFAULT_IGNORED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            scan: ScanOptions::default(),
            fix: FixOptions::default(),
        }
    }

    /// Replace the ignored prefix list.
    pub fn ignore_prefixes(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignored_prefixes.clear();
        self.add_ignore_prefixes(prefixes)
    }

    /// Add prefixes to the ignored list.
    pub fn add_ignore_prefixes(
        mut self,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        for prefix in prefixes.into_iter().map(Into::into) {
            // An empty prefix would keep every class rule
            if !prefix.is_empty() && !self.ignored_prefixes.contains(&prefix) {
                self.ignored_prefixes.push(prefix);
            }
        }
        self
    }

    /// Add directories to exclude from scanning.
    pub fn exclude_dirs(mut self, dirs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scan.excluded_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Set the markup extensions, highest priority first.
    pub fn markup_extensions(mut self, exts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scan.markup_extensions = exts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the stylesheet extensions.
    pub fn stylesheet_extensions(
        mut self,
        exts: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.scan.stylesheet_extensions = exts.into_iter().map(Into::into).collect();
        self
    }

    /// Enable dry-run mode (no file modifications).
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.fix.dry_run = enabled;
        self
    }

    /// Keep a timestamped backup of every rewritten stylesheet.
    pub fn backup(mut self, enabled: bool) -> Self {
        self.fix.backup = enabled;
        self
    }

    /// Apply the settings present in a configuration file.
    pub fn with_config(mut self, config: &DeadcssConfig) -> Self {
        if let Some(prefixes) = &config.ignore_prefixes {
            self = self.ignore_prefixes(prefixes.iter().cloned());
        }
        if let Some(exclude) = &config.exclude {
            self = self.exclude_dirs(exclude.iter().cloned());
        }
        if let Some(exts) = &config.markup_extensions {
            self = self.markup_extensions(exts.iter().cloned());
        }
        if let Some(exts) = &config.stylesheet_extensions {
            self = self.stylesheet_extensions(exts.iter().cloned());
        }
        if let Some(backup) = config.backup {
            self = self.backup(backup);
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ignored(&self) -> &[String] {
        &self.ignored_prefixes
    }

    /// Run discovery, pruning and persistence over every group.
    pub fn run(&self) -> Result<RunReport> {
        if !self.root.is_dir() {
            return Err(DeadcssError::InvalidArgument {
                message: format!("{} is not a directory", self.root.display()),
            }
            .into());
        }

        let groups = gather_file_groups(&self.root, &self.scan)
            .context("Failed to gather markup and stylesheet files")?;

        let cache = SourceCache::new();
        let groups = groups
            .into_par_iter()
            .filter(|group| !group.stylesheets.is_empty())
            .map(|group| self.process_group(group, &cache))
            .collect::<DeadcssResult<Vec<GroupReport>>>()?;

        let report = RunReport {
            root: self.root.clone(),
            dry_run: self.fix.dry_run,
            groups,
        };
        info!(
            groups = report.groups.len(),
            pruned = report.pruned_count(),
            removed_rules = report.removed_rule_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            files_read = cache.len(),
            "run complete"
        );
        Ok(report)
    }

    fn process_group(&self, group: FileGroup, cache: &SourceCache) -> DeadcssResult<GroupReport> {
        let key = group.key();
        let Some(markup) = group.markup.clone() else {
            let reason = "no markup file".to_string();
            log_skipped(&key, &reason);
            return Ok(GroupReport::new(key, group, GroupStatus::Skipped { reason }));
        };
        for shadowed in &group.shadowed_markup {
            warn!(
                markup = %markup.display(),
                ignored = %shadowed.display(),
                "several markup files share a base name"
            );
        }

        let used = match isolate(&key, read_used_classes(&markup, cache))? {
            Ok(used) => used,
            Err(reason) => {
                return Ok(GroupReport::new(key, group, GroupStatus::Skipped { reason }));
            }
        };
        debug!(group = %key.display(), classes = used.len(), "used classes collected");

        let stylesheets = group
            .stylesheets
            .iter()
            .map(|path| -> DeadcssResult<StylesheetReport> {
                Ok(StylesheetReport {
                    path: path.clone(),
                    outcome: self.process_stylesheet(path, &used, cache)?,
                })
            })
            .collect::<DeadcssResult<Vec<_>>>()?;

        let mut report = GroupReport::new(
            key,
            group,
            GroupStatus::Processed {
                used_classes: used.len(),
            },
        );
        report.stylesheets = stylesheets;
        Ok(report)
    }

    fn process_stylesheet(
        &self,
        path: &Path,
        used: &UsedClassSet,
        cache: &SourceCache,
    ) -> DeadcssResult<StylesheetOutcome> {
        Ok(isolate(path, self.prune_stylesheet(path, used, cache))?
            .unwrap_or_else(|reason| StylesheetOutcome::Failed { reason }))
    }

    fn prune_stylesheet(
        &self,
        path: &Path,
        used: &UsedClassSet,
        cache: &SourceCache,
    ) -> DeadcssResult<StylesheetOutcome> {
        let original = cache.read(path)?;
        let pruned = prune_report(
            &original,
            StyleSyntax::from_path(path),
            used,
            self.ignored_prefixes.as_slice(),
        )
        .map_err(|e| e.at_path(path))?;

        if !pruned.is_changed() {
            return Ok(StylesheetOutcome::Unchanged);
        }
        if !cache.is_unchanged(path)? {
            return Err(DeadcssError::fix(path, "changed on disk since it was read"));
        }

        let fix = apply_fix(path, &original, &pruned.text, &self.fix)?;
        Ok(StylesheetOutcome::Pruned {
            removed: pruned.removed,
            kept_rules: pruned.kept_rules,
            fix,
        })
    }
}

/// Splits per-file failures from fatal ones.
///
/// A recoverable error is logged and handed back as the skip reason, so only
/// its own group or stylesheet is affected. Anything else aborts the run.
fn isolate<T>(path: &Path, result: DeadcssResult<T>) -> DeadcssResult<Result<T, String>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(e) if e.is_recoverable() => {
            let reason = e.to_string();
            log_skipped(path, &reason);
            Ok(Err(reason))
        }
        Err(e) => Err(e),
    }
}

fn read_used_classes(markup: &Path, cache: &SourceCache) -> DeadcssResult<UsedClassSet> {
    let text = cache.read(markup)?;
    extract_used_classes(&text).map_err(|e| e.at_path(markup))
}

/// Result of a whole run, groups in path order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub dry_run: bool,
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    /// Whether any stylesheet was (or in dry-run would be) rewritten.
    pub fn has_changes(&self) -> bool {
        self.stylesheets().any(|s| s.outcome.is_pruned())
    }

    /// All stylesheet results across groups.
    pub fn stylesheets(&self) -> impl Iterator<Item = &StylesheetReport> {
        self.groups.iter().flat_map(|g| g.stylesheets.iter())
    }

    pub fn pruned_count(&self) -> usize {
        self.stylesheets().filter(|s| s.outcome.is_pruned()).count()
    }

    /// Total rules removed over all stylesheets.
    pub fn removed_rule_count(&self) -> usize {
        self.stylesheets()
            .map(|s| match &s.outcome {
                StylesheetOutcome::Pruned { removed, .. } => removed.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.stylesheets()
            .filter(|s| matches!(s.outcome, StylesheetOutcome::Failed { .. }))
            .count()
    }
}

/// One markup file and its stylesheets.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    /// `dir/base_name`
    pub group: PathBuf,
    pub markup: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shadowed_markup: Vec<PathBuf>,
    pub status: GroupStatus,
    pub stylesheets: Vec<StylesheetReport>,
}

impl GroupReport {
    fn new(key: PathBuf, group: FileGroup, status: GroupStatus) -> Self {
        Self {
            group: key,
            markup: group.markup,
            shadowed_markup: group.shadowed_markup,
            status,
            stylesheets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupStatus {
    Processed { used_classes: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StylesheetReport {
    pub path: PathBuf,
    pub outcome: StylesheetOutcome,
}

/// What happened to a single stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StylesheetOutcome {
    /// Every rule survived; the file was not touched
    Unchanged,
    /// Some rules were removed
    Pruned {
        removed: Vec<String>,
        kept_rules: usize,
        fix: FixAction,
    },
    /// Parse or I/O failure; the file was not touched
    Failed { reason: String },
}

impl StylesheetOutcome {
    pub fn is_pruned(&self) -> bool {
        matches!(self, Self::Pruned { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefixes() {
        let run = Deadcss::new(".");
        assert_eq!(run.ignored(), ["ant", "ng-", "mat-", "cdk-"]);
    }

    #[test]
    fn test_prefix_replace_and_extend() {
        let run = Deadcss::new(".")
            .ignore_prefixes(["x-"])
            .add_ignore_prefixes(["y-", "", "x-"]);
        assert_eq!(run.ignored(), ["x-", "y-"]);
    }

    #[test]
    fn test_with_config_overrides() {
        let config = DeadcssConfig {
            ignore_prefixes: Some(vec!["swiper-".to_string()]),
            exclude: Some(vec!["vendor".to_string()]),
            markup_extensions: Some(vec!["html".to_string()]),
            stylesheet_extensions: None,
            backup: Some(false),
            output: None,
        };
        let run = Deadcss::new(".").with_config(&config);
        assert_eq!(run.ignored(), ["swiper-"]);
        assert_eq!(run.scan.excluded_dirs, vec!["vendor".to_string()]);
        assert_eq!(run.scan.markup_extensions, vec!["html".to_string()]);
        assert_eq!(run.scan.stylesheet_extensions.len(), 3);
        assert!(!run.fix.backup);
    }

    #[test]
    fn test_isolate_recoverable_errors() {
        let path = Path::new("a.css");
        let skipped = isolate::<()>(path, Err(DeadcssError::parse(path, "unclosed block"))).unwrap();
        assert!(skipped.unwrap_err().contains("unclosed block"));

        let fix = isolate::<()>(path, Err(DeadcssError::fix(path, "not a regular file"))).unwrap();
        assert!(fix.is_err());

        assert_eq!(isolate(path, Ok(3)).unwrap(), Ok(3));
    }

    #[test]
    fn test_isolate_propagates_fatal_errors() {
        let internal = DeadcssError::Internal {
            message: "lost state".into(),
        };
        let result = isolate::<()>(Path::new("a.css"), Err(internal));
        assert!(matches!(result, Err(DeadcssError::Internal { .. })));
    }

    #[test]
    fn test_missing_root_is_error() {
        let missing = std::env::temp_dir().join("deadcss_builder_test_does_not_exist");
        assert!(Deadcss::new(missing).run().is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = StylesheetOutcome::Pruned {
            removed: vec![".a".to_string()],
            kept_rules: 2,
            fix: FixAction::WouldWrite,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "pruned");
        assert_eq!(json["fix"]["action"], "would_write");
        assert_eq!(json["removed"][0], ".a");
    }
}
