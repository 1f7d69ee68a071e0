//! Markup parsing into a typed element tree.
//!
//! Component templates are HTML with framework binding syntax layered on top
//! (`[ngClass]`, `(click)`, `*ngIf`, `:class`, `v-bind:class`, `@click`).
//! Unlike a browser, the parser does not recover: a template with unbalanced
//! or unterminated tags is an error, and its stylesheets are left alone.
//!
//! Only elements and their attributes are retained. Text, comments,
//! declarations and raw-text contents are skipped.

use std::collections::BTreeMap;

use crate::error::{DeadcssError, DeadcssResult};

/// Name of the synthetic root node returned by [`parse_markup`].
pub const DOCUMENT_NODE: &str = "#document";

/// Elements that never have children or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose contents are raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements whose end tag may be omitted.
const OPTIONAL_END_ELEMENTS: &[&str] = &[
    "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th", "thead", "tbody", "tfoot",
    "colgroup", "rt", "rp",
];

/// Value of a markup attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// `name="value"`, `name='value'` or `name=value`
    Text(String),
    /// Bare attribute such as `disabled`
    Flag,
}

impl AttrValue {
    /// Returns the raw text if this attribute carried a value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Flag => None,
        }
    }
}

/// One element of a parsed markup document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkupTree {
    /// Tag name as written
    pub name: String,
    /// Attributes as written; the first occurrence of a duplicate wins
    pub attributes: BTreeMap<String, AttrValue>,
    /// Child elements in document order
    pub children: Vec<MarkupTree>,
}

impl MarkupTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Looks up an attribute by name, ignoring ASCII case.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Depth-first iterator over this node and all of its descendants.
    ///
    /// Uses an explicit stack, so deeply nested templates cannot overflow
    /// the call stack.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }

    /// Number of element nodes in the tree, excluding the document root.
    pub fn element_count(&self) -> usize {
        self.iter().filter(|n| n.name != DOCUMENT_NODE).count()
    }
}

/// Iterator returned by [`MarkupTree::iter`].
pub struct Nodes<'a> {
    stack: Vec<&'a MarkupTree>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a MarkupTree;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// An element that has been opened but not yet closed.
struct OpenElement {
    node: MarkupTree,
    /// Byte offset of the `<` that opened it
    offset: usize,
}

fn is_one_of(name: &str, set: &[&str]) -> bool {
    set.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// Characters that end a tag or attribute name.
#[inline]
fn is_name_terminator(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'/' | b'>' | b'=' | b'"' | b'\'')
}

struct MarkupParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<OpenElement>,
}

impl<'a> MarkupParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            stack: vec![OpenElement {
                node: MarkupTree::new(DOCUMENT_NODE),
                offset: 0,
            }],
        }
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> DeadcssError {
        let (line, column) = line_column(self.src, offset);
        DeadcssError::parse_at("", message, line, column)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn find_from(&self, from: usize, needle: &str) -> Option<usize> {
        self.src[from..].find(needle).map(|i| from + i)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len() && !is_name_terminator(self.bytes[self.pos]) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn parse(mut self) -> DeadcssResult<MarkupTree> {
        while let Some(lt) = self.find_from(self.pos, "<") {
            // Template interpolation in text: `{{ a<b }}` holds no markup
            if let Some(open) = self.find_from(self.pos, "{{").filter(|&open| open < lt) {
                self.pos = self
                    .find_from(open + 2, "}}")
                    .map_or(open + 2, |close| close + 2);
                continue;
            }
            self.pos = lt;
            if self.starts_with("<!--") {
                let end = self
                    .find_from(lt + 4, "-->")
                    .ok_or_else(|| self.error(lt, "unterminated comment"))?;
                self.pos = end + 3;
            } else if self.starts_with("<!") || self.starts_with("<?") {
                let end = self
                    .find_from(lt + 2, ">")
                    .ok_or_else(|| self.error(lt, "unterminated declaration"))?;
                self.pos = end + 1;
            } else if self.starts_with("</") {
                self.parse_end_tag()?;
            } else if self
                .bytes
                .get(lt + 1)
                .is_some_and(|b| b.is_ascii_alphabetic())
            {
                self.parse_start_tag()?;
            } else {
                // A literal `<` in text
                self.pos = lt + 1;
            }
        }
        self.finish()
    }

    fn parse_end_tag(&mut self) -> DeadcssResult<()> {
        let start = self.pos;
        self.pos += 2;
        let name = self.read_name();
        if name.is_empty() {
            return Err(self.error(start, "end tag without a name"));
        }
        let end = self
            .find_from(self.pos, ">")
            .ok_or_else(|| self.error(start, format!("unterminated end tag </{}", name)))?;
        self.pos = end + 1;
        self.close_element(name, start)
    }

    fn parse_start_tag(&mut self) -> DeadcssResult<()> {
        let start = self.pos;
        self.pos += 1;
        let mut node = MarkupTree::new(self.read_name());
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.bytes.get(self.pos) {
                None => {
                    return Err(self.error(start, format!("unterminated tag <{}", node.name)));
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                }
                Some(_) => {
                    let (name, value) = self.parse_attribute()?;
                    node.attributes.entry(name.to_string()).or_insert(value);
                }
            }
        }

        let name = node.name.clone();
        if self_closing || is_one_of(&name, VOID_ELEMENTS) {
            self.append(node);
        } else if is_one_of(&name, RAW_TEXT_ELEMENTS) {
            self.skip_raw_text(&name, start)?;
            self.append(node);
        } else {
            // `<li>` directly inside an open `<li>` closes the previous one
            let closes_previous = self.stack.len() > 1
                && is_one_of(&name, OPTIONAL_END_ELEMENTS)
                && self
                    .stack
                    .last()
                    .is_some_and(|top| top.node.name.eq_ignore_ascii_case(&name));
            if closes_previous {
                self.close_top();
            }
            self.stack.push(OpenElement {
                node,
                offset: start,
            });
        }
        Ok(())
    }

    fn parse_attribute(&mut self) -> DeadcssResult<(&'a str, AttrValue)> {
        let at = self.pos;
        let name = self.read_name();
        if name.is_empty() {
            return Err(self.error(at, "unexpected character in tag"));
        }

        self.skip_whitespace();
        if self.bytes.get(self.pos) != Some(&b'=') {
            return Ok((name, AttrValue::Flag));
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.bytes.get(self.pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let open = self.pos;
                let close = self.bytes[open + 1..]
                    .iter()
                    .position(|&b| b == quote)
                    .map(|i| open + 1 + i)
                    .ok_or_else(|| {
                        self.error(open, format!("unterminated value for attribute {}", name))
                    })?;
                self.pos = close + 1;
                &self.src[open + 1..close]
            }
            _ => {
                let start = self.pos;
                while self.pos < self.bytes.len()
                    && !self.bytes[self.pos].is_ascii_whitespace()
                    && self.bytes[self.pos] != b'>'
                {
                    self.pos += 1;
                }
                &self.src[start..self.pos]
            }
        };
        Ok((name, AttrValue::Text(value.to_string())))
    }

    fn skip_raw_text(&mut self, name: &str, start: usize) -> DeadcssResult<()> {
        let closing = format!("</{}", name.to_ascii_lowercase());
        let lower = self.src[self.pos..].to_ascii_lowercase();
        let rel = lower
            .find(&closing)
            .ok_or_else(|| self.error(start, format!("unclosed <{}> element", name)))?;
        let tag_start = self.pos + rel;
        let end = self
            .find_from(tag_start, ">")
            .ok_or_else(|| self.error(tag_start, format!("unterminated end tag </{}", name)))?;
        self.pos = end + 1;
        Ok(())
    }

    fn append(&mut self, node: MarkupTree) {
        if let Some(parent) = self.stack.last_mut() {
            parent.node.children.push(node);
        }
    }

    fn close_top(&mut self) {
        if let Some(done) = self.stack.pop() {
            self.append(done.node);
        }
    }

    fn close_element(&mut self, name: &str, at: usize) -> DeadcssResult<()> {
        let index = self
            .stack
            .iter()
            .rposition(|open| open.node.name.eq_ignore_ascii_case(name))
            .filter(|&i| i > 0)
            .ok_or_else(|| self.error(at, format!("unexpected end tag </{}>", name)))?;

        if let Some(open) = self.stack[index + 1..]
            .iter()
            .find(|open| !is_one_of(&open.node.name, OPTIONAL_END_ELEMENTS))
        {
            return Err(self.error(
                open.offset,
                format!("<{}> is not closed before </{}>", open.node.name, name),
            ));
        }

        while self.stack.len() > index {
            self.close_top();
        }
        Ok(())
    }

    fn finish(mut self) -> DeadcssResult<MarkupTree> {
        while self.stack.len() > 1 {
            if let Some(top) = self.stack.last() {
                if !is_one_of(&top.node.name, OPTIONAL_END_ELEMENTS) {
                    return Err(self.error(top.offset, format!("unclosed <{}> element", top.node.name)));
                }
            }
            self.close_top();
        }
        self.stack
            .pop()
            .map(|root| root.node)
            .ok_or_else(|| DeadcssError::Internal {
                message: "markup parser lost its document root".into(),
            })
    }
}

/// 1-indexed line and column (in characters) of a byte offset.
pub(crate) fn line_column(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Parses markup text into a [`MarkupTree`] rooted at a `#document` node.
///
/// Errors carry an empty path; callers attach the file with
/// [`DeadcssError::at_path`].
pub fn parse_markup(text: &str) -> DeadcssResult<MarkupTree> {
    MarkupParser::new(text).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tree: &MarkupTree) -> Vec<&str> {
        tree.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_parse_nested_elements() {
        let tree = parse_markup("<div><span>hi</span><p>text</p></div>").unwrap();
        assert_eq!(tree.name, DOCUMENT_NODE);
        assert_eq!(names(&tree), vec![DOCUMENT_NODE, "div", "span", "p"]);
        assert_eq!(tree.element_count(), 3);
    }

    #[test]
    fn test_attribute_forms() {
        let tree = parse_markup(
            r#"<input disabled type=text value='a b' [ngClass]="{'x': y}" (click)="go()">"#,
        )
        .unwrap();
        let input = &tree.children[0];
        assert_eq!(input.attr("disabled"), Some(&AttrValue::Flag));
        assert_eq!(input.attr("type").and_then(AttrValue::as_text), Some("text"));
        assert_eq!(input.attr("value").and_then(AttrValue::as_text), Some("a b"));
        assert_eq!(
            input.attr("[ngClass]").and_then(AttrValue::as_text),
            Some("{'x': y}")
        );
        assert!(input.attr("(click)").is_some());
    }

    #[test]
    fn test_attribute_lookup_ignores_case() {
        let tree = parse_markup(r#"<div CLASS="a" [ngclass]="b"></div>"#).unwrap();
        let div = &tree.children[0];
        assert!(div.attr("class").is_some());
        assert!(div.attr("[ngClass]").is_some());
    }

    #[test]
    fn test_duplicate_attribute_first_wins() {
        let tree = parse_markup(r#"<div class="a" class="b"></div>"#).unwrap();
        assert_eq!(
            tree.children[0].attr("class").and_then(AttrValue::as_text),
            Some("a")
        );
    }

    #[test]
    fn test_void_and_self_closing() {
        let tree = parse_markup("<div><br><img src=x><app-item /></div>").unwrap();
        let div = &tree.children[0];
        assert_eq!(div.children.len(), 3);
        assert!(div.children.iter().all(|c| c.children.is_empty()));
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        let tree =
            parse_markup("<!DOCTYPE html><!-- <div class=\"ghost\"> --><main></main>").unwrap();
        assert_eq!(names(&tree), vec![DOCUMENT_NODE, "main"]);
    }

    #[test]
    fn test_raw_text_contents_ignored() {
        let tree =
            parse_markup("<script>if (a < b) { document.write('<div>') }</script><p></p>").unwrap();
        assert_eq!(names(&tree), vec![DOCUMENT_NODE, "script", "p"]);
    }

    #[test]
    fn test_interpolation_with_less_than() {
        let tree = parse_markup("<span>{{ a < b }}</span>").unwrap();
        assert_eq!(tree.element_count(), 1);
    }

    #[test]
    fn test_interpolation_less_than_before_letter() {
        let tree = parse_markup("<span>{{a<b}}</span>").unwrap();
        assert_eq!(tree.element_count(), 1);

        let tree = parse_markup("<span>{{ count<max ? 'a' : 'b' }}</span><i class=\"x\"></i>")
            .unwrap();
        assert_eq!(names(&tree), vec![DOCUMENT_NODE, "span", "i"]);
    }

    #[test]
    fn test_unclosed_interpolation_is_text() {
        let tree = parse_markup("<p>{{ oops</p><b></b>").unwrap();
        assert_eq!(names(&tree), vec![DOCUMENT_NODE, "p", "b"]);
    }

    #[test]
    fn test_optional_end_tags() {
        let tree = parse_markup("<ul><li>one<li>two</ul><p>para").unwrap();
        let ul = &tree.children[0];
        assert_eq!(ul.children.len(), 2);
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn test_error_unterminated_tag() {
        let err = parse_markup("<div class=\"a\"").unwrap_err();
        assert!(matches!(err, DeadcssError::Parse { .. }));
    }

    #[test]
    fn test_error_unterminated_attribute_value() {
        assert!(parse_markup("<div class=\"a></div>").is_err());
    }

    #[test]
    fn test_error_stray_end_tag() {
        let err = parse_markup("<div></div></span>").unwrap_err();
        assert!(err.to_string().contains("</span>"));
    }

    #[test]
    fn test_error_misnested_elements() {
        assert!(parse_markup("<div><span></div></span>").is_err());
    }

    #[test]
    fn test_error_unclosed_element_reports_location() {
        let err = parse_markup("<main>\n  <section>\n</main>").unwrap_err();
        match err {
            DeadcssError::Parse { line, column, .. } => {
                assert_eq!(line, Some(2));
                assert_eq!(column, Some(3));
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_unclosed_at_end_of_input() {
        assert!(parse_markup("<div><span></span>").is_err());
    }

    #[test]
    fn test_line_column() {
        assert_eq!(line_column("ab\ncd", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
    }

    #[test]
    fn test_deep_nesting_iterates_without_recursion() {
        let depth = 5_000;
        let markup = format!("{}{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let tree = parse_markup(&markup).unwrap();
        assert_eq!(tree.element_count(), depth);
    }
}
