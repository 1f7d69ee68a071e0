//! Rule survival decision for class selectors.
//!
//! A rule whose selector starts with `.` is dropped only when none of the
//! classes it references can be tied to the markup. The match is loose on
//! purpose: exact membership, an ignored framework prefix, or a substring
//! relation in either direction all keep the rule. Anything the tokenizer
//! cannot make sense of is kept.

use cssparser::{ParseError, Parser, ParserInput, Token};
use tracing::trace;

use crate::extract::UsedClassSet;

/// Tokenizer state that makes a selector unevaluable.
type Unreadable<'i> = ParseError<'i, ()>;

/// Characters that may precede the first selector without being part of it.
fn is_leading_noise(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Classes referenced by a selector list, including those inside functional
/// pseudo-classes (`:is(.x)`, `:not(.x)`, `:has(.x)`).
///
/// Returns `None` when the selector does not tokenize cleanly or uses SCSS /
/// Less interpolation (`#{...}`, `@{...}`). Attribute selectors are not
/// visited, so `[data-x=".c"]` names no class.
pub fn referenced_classes(selector: &str) -> Option<Vec<String>> {
    let mut input = ParserInput::new(selector);
    let mut parser = Parser::new(&mut input);
    let mut classes = Vec::new();
    collect_classes(&mut parser, &mut classes).ok()?;
    Some(classes)
}

fn collect_classes<'i>(
    parser: &mut Parser<'i, '_>,
    classes: &mut Vec<String>,
) -> Result<(), Unreadable<'i>> {
    let mut after_dot = false;
    let mut after_sigil = false;

    loop {
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::Delim('.') => {
                after_dot = true;
                continue;
            }
            Token::Delim('#') | Token::Delim('@') => {
                after_sigil = true;
                after_dot = false;
                continue;
            }
            Token::Ident(ref name) if after_dot => classes.push(name.to_string()),
            Token::CurlyBracketBlock if after_sigil => return Err(parser.new_custom_error(())),
            Token::Function(_) | Token::ParenthesisBlock => {
                parser.parse_nested_block(|nested| collect_classes(nested, classes))?;
            }
            Token::BadString(_)
            | Token::BadUrl(_)
            | Token::CloseParenthesis
            | Token::CloseSquareBracket
            | Token::CloseCurlyBracket => return Err(parser.new_custom_error(())),
            _ => {}
        }
        after_dot = false;
        after_sigil = false;
    }
}

/// Whether a single class name is tied to the markup.
pub fn class_survives<P: AsRef<str>>(
    class: &str,
    used: &UsedClassSet,
    ignored_prefixes: &[P],
) -> bool {
    used.contains(class)
        || ignored_prefixes
            .iter()
            .any(|prefix| class.starts_with(prefix.as_ref()))
        || used
            .iter()
            .any(|u| u.contains(class) || class.contains(u.as_str()))
}

/// Decides whether a rule with this selector must be kept.
///
/// Selectors not starting with `.` are outside the pruning decision and are
/// always kept, as are selectors that fail to tokenize or reference no
/// class at the top level.
pub fn should_keep<P: AsRef<str>>(
    selector: &str,
    used: &UsedClassSet,
    ignored_prefixes: &[P],
) -> bool {
    if !selector.trim_start_matches(is_leading_noise).starts_with('.') {
        return true;
    }

    let classes = match referenced_classes(selector) {
        Some(classes) if !classes.is_empty() => classes,
        _ => {
            trace!(selector = %selector.trim(), "selector kept: no evaluable classes");
            return true;
        }
    };

    classes
        .iter()
        .any(|class| class_survives(class, used, ignored_prefixes))
}
