//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use deadcss_core::prelude::*;
//! ```

// Errors
pub use crate::error::{DeadcssError, DeadcssResult};

// Markup and class extraction
pub use crate::extract::{extract_used_classes, UsedClassSet};
pub use crate::markup::{parse_markup, MarkupTree};

// Selector evaluation and pruning
pub use crate::prune::{prune, prune_report, PruneReport, StyleSyntax};
pub use crate::selector::should_keep;

// File scanning
pub use crate::scan::{gather_file_groups, FileGroup, ScanOptions};

// Configuration
pub use crate::config::{load_config, DeadcssConfig};

// Builder API
pub use crate::builder::{Deadcss, RunReport, StylesheetOutcome};
