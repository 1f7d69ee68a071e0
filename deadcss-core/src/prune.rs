//! Stylesheet parsing and pruning.
//!
//! The stylesheet is split into top-level items using the `cssparser`
//! tokenizer, but every item keeps a slice of the original source. Pruning
//! therefore never reformats anything:
//!
//! - retained items are emitted byte-for-byte, in order
//! - a removed rule takes the whitespace run directly after it along
//!   (comments are never removed)
//! - a stylesheet that needs no change comes back identical to its input
//!
//! Only top-level qualified rules whose selector starts with `.` are
//! candidates for removal. At-rules (`@media`, `@keyframes`, `@import`, ...),
//! other rules and comments pass through untouched.
//!
//! SCSS and Less sources get two accommodations: `//` line comments are
//! blanked before tokenizing (byte offsets stay the same), and `#{...}` /
//! `@{...}` interpolation does not end a selector.

use std::borrow::Cow;
use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, SourceLocation, Token};
use regex::Regex;
use serde::Serialize;

use crate::error::{DeadcssError, DeadcssResult};
use crate::extract::UsedClassSet;
use crate::selector::should_keep;

type SyntaxError<'i> = ParseError<'i, &'static str>;

/// Source dialect of a stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleSyntax {
    #[default]
    Css,
    Scss,
    Less,
}

impl StyleSyntax {
    /// Picks the dialect from a file extension; unknown extensions are plain CSS.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("scss") => Self::Scss,
            Some("less") => Self::Less,
            _ => Self::Css,
        }
    }

    fn has_line_comments(self) -> bool {
        !matches!(self, Self::Css)
    }
}

const BYTE_ORDER_MARK: char = '\u{feff}';

/// One top-level qualified rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule<'a> {
    /// Selector prelude as written, including trailing whitespace
    pub selector: &'a str,
    /// Declaration block including its braces, passed through verbatim
    pub block: &'a str,
    /// Byte range of the whole rule in the source
    pub span: Range<usize>,
}

impl StyleRule<'_> {
    /// Whether this rule is subject to pruning.
    pub fn is_class_rule(&self) -> bool {
        self.selector.trim_start().starts_with('.')
    }
}

/// One top-level item of a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleNode<'a> {
    /// Whitespace or a comment between items
    Trivia(&'a str),
    /// A qualified rule `selector { ... }`
    Rule(StyleRule<'a>),
    /// At-rules and any other top-level construct
    Statement(&'a str),
}

/// A parsed stylesheet that borrows its source.
#[derive(Debug, Clone)]
pub struct Stylesheet<'a> {
    pub source: &'a str,
    pub nodes: Vec<StyleNode<'a>>,
}

impl<'a> Stylesheet<'a> {
    /// Source text of a node.
    pub fn text_of(&self, node: &StyleNode<'a>) -> &'a str {
        match node {
            StyleNode::Trivia(text) | StyleNode::Statement(text) => *text,
            StyleNode::Rule(rule) => &self.source[rule.span.clone()],
        }
    }

    /// Iterates over the top-level qualified rules.
    pub fn rules(&self) -> impl Iterator<Item = &StyleRule<'a>> {
        self.nodes.iter().filter_map(|node| match node {
            StyleNode::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    /// Re-serializes all items; equals the source text.
    pub fn to_css(&self) -> String {
        self.nodes.iter().map(|node| self.text_of(node)).collect()
    }
}

/// Result of pruning a single stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Stylesheet text after pruning
    pub text: String,
    /// Trimmed selectors of the removed rules, in source order
    pub removed: Vec<String>,
    /// Number of top-level qualified rules retained
    pub kept_rules: usize,
}

impl PruneReport {
    pub fn is_changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

fn syntax_error<'i>(location: SourceLocation, message: &'static str) -> SyntaxError<'i> {
    ParseError {
        kind: ParseErrorKind::Custom(message),
        location,
    }
}

fn to_deadcss_error(err: SyntaxError<'_>) -> DeadcssError {
    let message = match err.kind {
        ParseErrorKind::Custom(message) => message.to_string(),
        ParseErrorKind::Basic(basic) => format!("{:?}", basic),
    };
    DeadcssError::parse_at(
        "",
        message,
        err.location.line as usize + 1,
        err.location.column as usize,
    )
}

/// Consumes the block whose opening token was just returned by `parser`.
///
/// Fails if the block, or any block nested in it, is never closed.
fn consume_block<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<(), SyntaxError<'i>> {
    let opened_at = parser.current_source_location();
    let inner_end = parser.parse_nested_block(|nested| -> Result<usize, SyntaxError<'i>> {
        consume_contents(nested)?;
        Ok(nested.position().byte_index())
    })?;
    // A closed block moves past its closing token; an unclosed one stops at end of input.
    if parser.position().byte_index() == inner_end {
        return Err(syntax_error(opened_at, "unclosed block"));
    }
    Ok(())
}

fn consume_contents<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<(), SyntaxError<'i>> {
    loop {
        let location = parser.current_source_location();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => consume_block(parser)?,
            Token::BadString(_) | Token::BadUrl(_) => {
                return Err(syntax_error(location, "invalid string or url"));
            }
            Token::CloseParenthesis | Token::CloseSquareBracket | Token::CloseCurlyBracket => {
                return Err(syntax_error(location, "unmatched closing bracket"));
            }
            _ => {}
        }
    }
}

/// A statement being accumulated at the top level.
struct Pending {
    start: usize,
    location: SourceLocation,
    at_rule: bool,
}

/// Top-level item located by byte ranges, independent of which copy of the
/// source was tokenized.
enum RawNode {
    Trivia(Range<usize>),
    Rule {
        selector: Range<usize>,
        block: Range<usize>,
    },
    Statement(Range<usize>),
}

impl RawNode {
    fn resolve(self, source: &str) -> StyleNode<'_> {
        match self {
            Self::Trivia(range) => StyleNode::Trivia(&source[range]),
            Self::Statement(range) => StyleNode::Statement(&source[range]),
            Self::Rule { selector, block } => StyleNode::Rule(StyleRule {
                span: selector.start..block.end,
                selector: &source[selector],
                block: &source[block],
            }),
        }
    }
}

fn scan_top_level<'i, 't>(
    parser: &mut Parser<'i, 't>,
    source: &str,
    syntax: StyleSyntax,
) -> Result<Vec<RawNode>, SyntaxError<'i>> {
    let mut nodes = Vec::new();
    let mut pending: Option<Pending> = None;

    loop {
        let before = parser.position().byte_index();
        let location = parser.current_source_location();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match token {
            Token::WhiteSpace(_) | Token::Comment(_) | Token::CDO | Token::CDC
                if pending.is_none() =>
            {
                nodes.push(RawNode::Trivia(before..parser.position().byte_index()));
            }
            Token::Semicolon => {
                let start = pending.take().map_or(before, |p| p.start);
                nodes.push(RawNode::Statement(start..parser.position().byte_index()));
            }
            Token::CurlyBracketBlock => {
                let interpolation = syntax != StyleSyntax::Css
                    && pending.as_ref().is_some_and(|p| {
                        let prelude = &source[p.start..before];
                        prelude.ends_with('#') || prelude.ends_with('@')
                    });
                consume_block(parser)?;
                if interpolation {
                    continue;
                }

                let end = parser.position().byte_index();
                match pending.take() {
                    Some(p) if p.at_rule => nodes.push(RawNode::Statement(p.start..end)),
                    other => {
                        let start = other.map_or(before, |p| p.start);
                        nodes.push(RawNode::Rule {
                            selector: start..before,
                            block: before..end,
                        });
                    }
                }
            }
            Token::BadString(_) | Token::BadUrl(_) => {
                return Err(syntax_error(location, "invalid string or url"));
            }
            Token::CloseParenthesis | Token::CloseSquareBracket | Token::CloseCurlyBracket => {
                return Err(syntax_error(location, "unmatched closing bracket"));
            }
            other => {
                if pending.is_none() {
                    pending = Some(Pending {
                        start: before,
                        location,
                        at_rule: matches!(other, Token::AtKeyword(_)),
                    });
                }
                if matches!(
                    other,
                    Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock
                ) {
                    consume_block(parser)?;
                }
            }
        }
    }

    if let Some(p) = pending {
        return Err(syntax_error(
            p.location,
            "unexpected end of stylesheet: rule has no block",
        ));
    }
    Ok(nodes)
}

/// Replaces `//` line comments with spaces of the same byte length.
///
/// Strings, block comments and `url(...)` are skipped so `http://` and
/// quoted `//` survive.
fn blank_line_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |end| i + 2 + end + 2);
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'u' | b'U' if source[i..].get(..4).is_some_and(|s| s.eq_ignore_ascii_case("url(")) => {
                i = source[i..].find(')').map_or(bytes.len(), |end| i + end + 1);
            }
            _ => i += 1,
        }
    }

    // Only whole characters were replaced, each by ASCII spaces.
    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}

/// Parses plain CSS into top-level items.
pub fn parse_stylesheet(text: &str) -> DeadcssResult<Stylesheet<'_>> {
    parse_stylesheet_with(text, StyleSyntax::Css)
}

/// Parses a stylesheet of the given dialect into top-level items.
///
/// Fails with a parse error (empty path, line/column set) on unclosed
/// blocks, unmatched closing brackets, invalid string or url tokens, and a
/// trailing prelude without a block.
pub fn parse_stylesheet_with(text: &str, syntax: StyleSyntax) -> DeadcssResult<Stylesheet<'_>> {
    let mut tokenized = if syntax.has_line_comments() {
        Cow::Owned(blank_line_comments(text))
    } else {
        Cow::Borrowed(text)
    };
    // A leading BOM is kept verbatim as trivia, not glued to the first selector
    if let Some(rest) = tokenized.strip_prefix(BYTE_ORDER_MARK) {
        tokenized = Cow::Owned(format!("{}{}", " ".repeat(BYTE_ORDER_MARK.len_utf8()), rest));
    }

    let mut input = ParserInput::new(&tokenized);
    let mut parser = Parser::new(&mut input);
    let nodes = scan_top_level(&mut parser, &tokenized, syntax)
        .map_err(to_deadcss_error)?
        .into_iter()
        .map(|raw| raw.resolve(text))
        .collect();

    Ok(Stylesheet {
        source: text,
        nodes,
    })
}

fn extend_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // SAFETY: This regex pattern is hardcoded and validated at compile-test time.
    REGEX.get_or_init(|| {
        Regex::new(r"(?:@extend\s+|:extend\(\s*)\.([-\w]+)").expect("Hardcoded regex pattern is valid")
    })
}

/// Classes a SCSS/Less stylesheet extends from within itself.
///
/// Removing an extended rule breaks the extending one, so these count as used.
pub fn extended_classes(text: &str) -> HashSet<String> {
    extend_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Prunes a stylesheet and reports what was removed.
pub fn prune_report<P: AsRef<str>>(
    text: &str,
    syntax: StyleSyntax,
    used: &UsedClassSet,
    ignored_prefixes: &[P],
) -> DeadcssResult<PruneReport> {
    let sheet = parse_stylesheet_with(text, syntax)?;

    let extended = match syntax {
        StyleSyntax::Css => HashSet::new(),
        _ => extended_classes(text),
    };
    let widened;
    let used = if extended.is_empty() {
        used
    } else {
        widened = used.union(&extended).cloned().collect::<UsedClassSet>();
        &widened
    };

    let mut out = String::with_capacity(text.len());
    let mut removed = Vec::new();
    let mut kept_rules = 0;
    let mut after_removed = false;

    for node in &sheet.nodes {
        match node {
            StyleNode::Rule(rule)
                if rule.is_class_rule() && !should_keep(rule.selector, used, ignored_prefixes) =>
            {
                removed.push(rule.selector.trim().to_string());
                after_removed = true;
                continue;
            }
            StyleNode::Rule(_) => kept_rules += 1,
            StyleNode::Trivia(gap) if after_removed && gap.trim().is_empty() => {
                after_removed = false;
                continue;
            }
            _ => {}
        }
        after_removed = false;
        out.push_str(sheet.text_of(node));
    }

    Ok(PruneReport {
        text: out,
        removed,
        kept_rules,
    })
}

/// Prunes plain CSS, returning the surviving text.
///
/// The result equals `text` when nothing was removed; callers diff the two
/// to decide whether to persist.
pub fn prune<P: AsRef<str>>(
    text: &str,
    used: &UsedClassSet,
    ignored_prefixes: &[P],
) -> DeadcssResult<String> {
    prune_report(text, StyleSyntax::Css, used, ignored_prefixes).map(|report| report.text)
}
