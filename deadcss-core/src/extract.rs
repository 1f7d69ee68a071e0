//! Used-class extraction from component templates.
//!
//! Collects every class a template may put on an element: static `class`
//! attribute tokens, quoted literals inside conditional class bindings, and
//! per-class property bindings (`[class.active]="..."`). Over-collection is
//! harmless (a rule is kept that could have gone); under-collection deletes
//! rules that are still needed.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::DeadcssResult;
use crate::markup::{parse_markup, AttrValue, MarkupTree};

/// Set of class names the markup may apply at render time.
pub type UsedClassSet = HashSet<String>;

/// Attribute spellings of a conditional ("dynamic") class binding.
pub const CONDITIONAL_CLASS_ATTRS: [&str; 6] = [
    "[ngClass]",
    "ngClass",
    "ng-class",
    "data-ng-class",
    ":class",
    "v-bind:class",
];

/// Quoted literals that are binding values rather than class names.
const NON_CLASS_LITERALS: [&str; 4] = ["true", "false", "null", "undefined"];

/// Pre-compiled pattern for single- or double-quoted literals.
fn quoted_literal_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // SAFETY: This regex pattern is hardcoded and validated at compile-test time.
    REGEX.get_or_init(|| {
        Regex::new(r#"'([^']*)'|"([^"]*)""#).expect("Hardcoded regex pattern is valid")
    })
}

/// Quoted literals in a binding expression that may name classes.
fn class_literals(expr: &str) -> impl Iterator<Item = &str> {
    quoted_literal_regex()
        .captures_iter(expr)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
        .filter(|lit| !lit.is_empty() && !NON_CLASS_LITERALS.contains(lit))
}

/// `[class.active]` → `active`
fn class_property_binding(attr: &str) -> Option<&str> {
    attr.strip_prefix("[class.")
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
}

fn insert_tokens(used: &mut UsedClassSet, value: &str) {
    used.extend(value.split_whitespace().map(str::to_string));
}

/// Collects used classes from an already parsed tree.
///
/// Traversal order does not affect the result.
pub fn collect_used_classes(tree: &MarkupTree) -> UsedClassSet {
    let mut used = UsedClassSet::new();

    for node in tree.iter() {
        if let Some(value) = node.attr("class").and_then(AttrValue::as_text) {
            insert_tokens(&mut used, value);
        }

        for alias in CONDITIONAL_CLASS_ATTRS {
            let Some(expr) = node.attr(alias).and_then(AttrValue::as_text) else {
                continue;
            };
            for literal in class_literals(expr) {
                debug!(element = %node.name, binding = alias, class = literal, "dynamic class");
                insert_tokens(&mut used, literal);
            }
        }

        for attr in node.attributes.keys() {
            if let Some(class) = class_property_binding(attr) {
                used.insert(class.to_string());
            }
        }
    }

    used
}

/// Parses markup text and returns the set of classes it may use.
///
/// Fails with a parse error when the markup is malformed; the caller skips
/// the whole group in that case.
pub fn extract_used_classes(markup: &str) -> DeadcssResult<UsedClassSet> {
    let tree = parse_markup(markup)?;
    Ok(collect_used_classes(&tree))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(set: &UsedClassSet) -> Vec<&str> {
        let mut v: Vec<&str> = set.iter().map(String::as_str).collect();
        v.sort();
        v
    }

    #[test]
    fn test_static_class_tokens() {
        let used =
            extract_used_classes("<div class=\"foo  bar\n baz\"><span class=\"qux\"></span></div>")
                .unwrap();
        assert_eq!(sorted(&used), vec!["bar", "baz", "foo", "qux"]);
    }

    #[test]
    fn test_empty_and_flag_class_attributes() {
        let used = extract_used_classes("<div class=\"\"></div><p class></p>").unwrap();
        assert!(used.is_empty());
    }

    #[test]
    fn test_ng_class_literals_only() {
        let used = extract_used_classes(
            r#"<div [ngClass]="{'active': isActive, 'disabled': isDisabled}"></div>"#,
        )
        .unwrap();
        assert!(used.contains("active"));
        assert!(used.contains("disabled"));
        assert!(!used.contains("isActive"));
        assert!(!used.contains("isDisabled"));
    }

    #[test]
    fn test_boolean_literals_skipped() {
        let used = extract_used_classes(
            r#"<div ng-class="{'shown': 'true', x: 'false', y: 'null', z: 'undefined', e: ''}"></div>"#,
        )
        .unwrap();
        assert_eq!(sorted(&used), vec!["shown"]);
    }

    #[test]
    fn test_all_binding_aliases() {
        let markup = r#"
            <a [ngClass]="'one'"></a>
            <a ngClass="'two'"></a>
            <a ng-class="'three'"></a>
            <a data-ng-class="'four'"></a>
            <a :class="['five']"></a>
            <a v-bind:class="{ 'six': on }"></a>
        "#;
        let used = extract_used_classes(markup).unwrap();
        assert_eq!(
            sorted(&used),
            vec!["five", "four", "one", "six", "three", "two"]
        );
    }

    #[test]
    fn test_double_quoted_literals_in_single_quoted_binding() {
        let used =
            extract_used_classes(r#"<a [ngClass]='cond ? "on" : "off"'></a>"#).unwrap();
        assert_eq!(sorted(&used), vec!["off", "on"]);
    }

    #[test]
    fn test_multi_class_literal_split() {
        let used =
            extract_used_classes(r#"<a [ngClass]="{'btn btn-lg': big}"></a>"#).unwrap();
        assert_eq!(sorted(&used), vec!["btn", "btn-lg"]);
        assert!(used.iter().all(|c| !c.is_empty() && !c.contains(' ')));
    }

    #[test]
    fn test_class_property_binding() {
        let used = extract_used_classes(r#"<li [class.selected]="isSel" [class]="x"></li>"#)
            .unwrap();
        assert_eq!(sorted(&used), vec!["selected"]);
    }

    #[test]
    fn test_unrelated_bindings_ignored() {
        let used =
            extract_used_classes(r#"<a [title]="'tooltip'" (click)="go('home')"></a>"#).unwrap();
        assert!(used.is_empty());
    }

    #[test]
    fn test_malformed_markup_fails() {
        assert!(extract_used_classes("<div class=\"a\"><span></div>").is_err());
    }

    #[test]
    fn test_collect_from_tree_directly() {
        let mut root = MarkupTree::new("#document");
        let mut child = MarkupTree::new("div");
        child
            .attributes
            .insert("class".into(), AttrValue::Text("x y".into()));
        root.children.push(child);
        assert_eq!(sorted(&collect_used_classes(&root)), vec!["x", "y"]);
    }
}
