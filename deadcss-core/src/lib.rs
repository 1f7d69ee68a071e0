//! deadcss-core: unused CSS rule pruning for component templates
//!
//! Pairs every markup file with the stylesheets that share its directory and
//! base name (`card.component.html` + `card.component.scss`), collects the
//! classes the markup can apply, and rewrites each stylesheet without the
//! class rules nothing references.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use deadcss_core::prelude::*;
//!
//! let report = Deadcss::new("/path/to/app").dry_run(true).run()?;
//! println!("{} stylesheets would change", report.pruned_count());
//! ```
//!
//! # Module Organization
//!
//! - [`markup`]: Strict markup parser producing a [`MarkupTree`]
//! - [`extract`]: Literal and conditional class extraction
//! - [`selector`]: Keep/drop decision for a class selector
//! - [`prune`]: Top-level stylesheet splitting and rule removal
//! - [`scan`]: Parallel file discovery and grouping
//! - [`cache`]: Read-once sources with SHA-256 fingerprints
//! - [`fix`]: Backup and atomic rewrite
//! - [`builder`]: Fluent builder API running the whole pipeline
//! - [`error`]: Typed error handling
//!
//! Matching is loose: a rule survives if any class it names is
//! used, starts with an ignored framework prefix, or shares a substring with
//! a used class. Expect over-retention, never over-removal.

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fix;
pub mod logging;
pub mod markup;
pub mod prelude;
pub mod prune;
pub mod report;
pub mod scan;
pub mod selector;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{DeadcssError, DeadcssResult, IoResultExt};

// Builder API
pub use builder::{
    Deadcss, GroupReport, GroupStatus, RunReport, StylesheetOutcome, StylesheetReport,
    DEFAULT_IGNORED_PREFIXES,
};

// Source cache
pub use cache::{file_hash, hash_bytes, SourceCache};

// Configuration
pub use config::{load_config, load_config_file, DeadcssConfig, OutputConfig, CONFIG_FILE_NAME};

// Markup parsing and class extraction
pub use extract::{collect_used_classes, extract_used_classes, UsedClassSet};
pub use markup::{parse_markup, AttrValue, MarkupTree};

// Fixing
pub use fix::{apply_fix, backup_path, FixAction, FixOptions};

// Logging
pub use logging::{init_structured_logging, log_error, log_skipped};

// Pruning
pub use prune::{
    parse_stylesheet, parse_stylesheet_with, prune, prune_report, PruneReport, StyleNode,
    StyleRule, StyleSyntax, Stylesheet,
};
pub use selector::{class_survives, referenced_classes, should_keep};

// Reporting
pub use report::{print_json, print_plain, render_plain};

// File scanning
pub use scan::{gather_file_groups, FileGroup, ScanOptions};
