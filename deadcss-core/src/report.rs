//! Output formatting - plaintext and JSON.

use std::fmt::Write as _;

use crate::builder::{GroupStatus, RunReport, StylesheetOutcome};
use crate::fix::FixAction;

/// Renders a run as human-readable text.
pub fn render_plain(report: &RunReport) -> String {
    let mut out = String::new();
    let verb = if report.dry_run { "WOULD PRUNE" } else { "PRUNED" };

    for group in &report.groups {
        if let GroupStatus::Skipped { reason } = &group.status {
            let _ = writeln!(out, "SKIPPED {}: {}", group.group.display(), reason);
            continue;
        }
        for sheet in &group.stylesheets {
            match &sheet.outcome {
                StylesheetOutcome::Unchanged => {}
                StylesheetOutcome::Pruned { removed, fix, .. } => {
                    let _ = writeln!(
                        out,
                        "{} {} ({} rules):",
                        verb,
                        sheet.path.display(),
                        removed.len()
                    );
                    for selector in removed {
                        let _ = writeln!(out, "- {}", selector);
                    }
                    if let FixAction::Written {
                        backup: Some(backup),
                    } = fix
                    {
                        let _ = writeln!(out, "  backup: {}", backup.display());
                    }
                }
                StylesheetOutcome::Failed { reason } => {
                    let _ = writeln!(out, "FAILED {}: {}", sheet.path.display(), reason);
                }
            }
        }
    }

    if report.has_changes() {
        let _ = writeln!(
            out,
            "{} rules removed from {} stylesheets.",
            report.removed_rule_count(),
            report.pruned_count()
        );
    } else {
        let _ = writeln!(out, "No unused CSS rules found.");
    }
    out
}

/// Prints a run in plain text format.
pub fn print_plain(report: &RunReport) {
    print!("{}", render_plain(report));
}

/// Prints a run in JSON format.
///
/// Falls back to a summary line on stderr if serialization fails.
pub fn print_json(report: &RunReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            println!(
                "{{\"pruned\": {}, \"removed_rules\": {}}}",
                report.pruned_count(),
                report.removed_rule_count()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{GroupReport, StylesheetReport};
    use std::path::PathBuf;

    fn sample(dry_run: bool) -> RunReport {
        RunReport {
            root: PathBuf::from("app"),
            dry_run,
            groups: vec![
                GroupReport {
                    group: PathBuf::from("app/card"),
                    markup: Some(PathBuf::from("app/card.html")),
                    shadowed_markup: Vec::new(),
                    status: GroupStatus::Processed { used_classes: 2 },
                    stylesheets: vec![
                        StylesheetReport {
                            path: PathBuf::from("app/card.css"),
                            outcome: StylesheetOutcome::Pruned {
                                removed: vec![".baz".to_string()],
                                kept_rules: 1,
                                fix: if dry_run {
                                    FixAction::WouldWrite
                                } else {
                                    FixAction::Written {
                                        backup: Some(PathBuf::from("app/card.css.1.bak")),
                                    }
                                },
                            },
                        },
                        StylesheetReport {
                            path: PathBuf::from("app/card.less"),
                            outcome: StylesheetOutcome::Failed {
                                reason: "bad".to_string(),
                            },
                        },
                    ],
                },
                GroupReport {
                    group: PathBuf::from("app/orphan"),
                    markup: None,
                    shadowed_markup: Vec::new(),
                    status: GroupStatus::Skipped {
                        reason: "no markup file".to_string(),
                    },
                    stylesheets: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_plain_lists_removed_selectors() {
        let text = render_plain(&sample(false));
        assert!(text.contains("PRUNED app/card.css (1 rules):\n- .baz\n"));
        assert!(text.contains("backup: app/card.css.1.bak"));
        assert!(text.contains("FAILED app/card.less: bad"));
        assert!(text.contains("SKIPPED app/orphan: no markup file"));
        assert!(text.ends_with("1 rules removed from 1 stylesheets.\n"));
    }

    #[test]
    fn test_plain_dry_run_wording() {
        let text = render_plain(&sample(true));
        assert!(text.contains("WOULD PRUNE app/card.css"));
        assert!(!text.contains("backup:"));
    }

    #[test]
    fn test_plain_nothing_to_do() {
        let report = RunReport {
            root: PathBuf::from("."),
            dry_run: false,
            groups: Vec::new(),
        };
        assert_eq!(render_plain(&report), "No unused CSS rules found.\n");
    }
}
