//! Stylesheet scanning.
//!
//! Only selector preludes are searched for `.name` / `#name`. Declaration
//! values (hex colors, decimals), `url(...)` arguments, at-rule preludes and
//! `@keyframes` step selectors are never treated as selectors.

use std::ops::Range;

use super::{Context, FileScan, Occurrence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Class,
    Id,
}

/// A `.name` or `#name` found in a selector, span covering the name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorName {
    pub span: Range<usize>,
    pub kind: SelectorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// Contains rules (top level, `@media`, `@supports`, ...).
    Rules,
    /// A style rule body; may contain nested style rules.
    Declarations,
    /// `@keyframes` body; its children are step selectors.
    Keyframes,
    /// Anything whose nested preludes are not selectors.
    Opaque,
}

const RULE_LIST_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "layer",
    "container",
    "document",
    "-moz-document",
    "scope",
    "starting-style",
];

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}

// ============================================================================
// Selector scanning
// ============================================================================

/// Find class and id names in a selector string.
///
/// Attribute selectors, strings and comments are skipped; pseudo-classes
/// and combinators end a name. Escaped names keep their backslashes in the
/// span so they fail the identifier grammar. Returns the byte offset of an
/// unterminated construct, if any; names before it are still reported.
pub fn scan_selector(selector: &str) -> (Vec<SelectorName>, Option<usize>) {
    let bytes = selector.as_bytes();
    let mut names = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => match selector[i + 2..].find("*/") {
                Some(rel) => i = i + 2 + rel + 2,
                None => return (names, Some(i)),
            },
            b'"' | b'\'' => match skip_string(bytes, i) {
                Some(end) => i = end,
                None => return (names, Some(i)),
            },
            b'[' => match skip_attribute_selector(bytes, i) {
                Some(end) => i = end,
                None => return (names, Some(i)),
            },
            b'\\' => i += 2,
            b'.' | b'#' => {
                let kind = if bytes[i] == b'.' {
                    SelectorKind::Class
                } else {
                    SelectorKind::Id
                };
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() {
                    if bytes[end] == b'\\' && end + 1 < bytes.len() {
                        end += 2;
                    } else if is_name_byte(bytes[end]) {
                        end += 1;
                    } else {
                        break;
                    }
                }
                // An escape may have stepped into a multi-byte char.
                while end < bytes.len() && !selector.is_char_boundary(end) {
                    end += 1;
                }
                if end > start {
                    names.push(SelectorName {
                        span: start..end.min(bytes.len()),
                        kind,
                    });
                }
                i = end.max(start);
            }
            _ => i += 1,
        }
    }

    (names, None)
}

/// End (exclusive) of a quoted string starting at `start`, or `None` if the
/// line or input ends first.
fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_attribute_selector(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i)?,
            b']' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

// ============================================================================
// Stylesheet scanning
// ============================================================================

/// Scan stylesheet text located at byte `base` of the enclosing file.
pub(crate) fn scan_into(text: &str, base: usize, out: &mut FileScan) {
    let bytes = text.as_bytes();
    let mut stack = vec![Block::Rules];
    let mut prelude_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => match text[i + 2..].find("*/") {
                Some(rel) => i = i + 2 + rel + 2,
                None => {
                    out.warn(base + i, "unterminated CSS comment");
                    return;
                }
            },
            b'"' | b'\'' => match skip_string(bytes, i) {
                Some(end) => i = end,
                None => {
                    out.warn(base + i, "unterminated CSS string");
                    // A bad string ends at the line break.
                    i = text[i..].find('\n').map(|rel| i + rel).unwrap_or(bytes.len());
                }
            },
            b'u' | b'U' if starts_url(text, i) => {
                let open = i + 4;
                match text[open..].find(')') {
                    Some(rel) => {
                        let close = open + rel;
                        let inner = trim_url(text, open..close);
                        if !inner.is_empty() {
                            out.occurrences.push(Occurrence::declaration(
                                base + inner.start..base + inner.end,
                                Context::CssUrl,
                            ));
                        }
                        i = close + 1;
                    }
                    None => {
                        out.warn(base + i, "unterminated url()");
                        return;
                    }
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') && (i == 0 || !is_name_byte(bytes[i - 1])) => {
                let mut end = i + 2;
                while end < bytes.len() && is_name_byte(bytes[end]) {
                    end += 1;
                }
                out.occurrences.push(Occurrence::declaration(
                    base + i..base + end,
                    Context::CssCustomProperty,
                ));
                i = end;
            }
            b'{' => {
                let parent = *stack.last().unwrap_or(&Block::Rules);
                let prelude = &text[prelude_start..i];
                let child = block_for_prelude(prelude, parent);

                if child == Block::Declarations {
                    let (names, unterminated) = scan_selector(prelude);
                    for name in names {
                        let context = match name.kind {
                            SelectorKind::Class => Context::CssClassSelector,
                            SelectorKind::Id => Context::CssIdSelector,
                        };
                        let start = base + prelude_start + name.span.start;
                        let end = base + prelude_start + name.span.end;
                        out.occurrences.push(Occurrence::declaration(start..end, context));
                    }
                    if let Some(offset) = unterminated {
                        out.warn(base + prelude_start + offset, "malformed selector");
                    }
                }

                stack.push(child);
                i += 1;
                prelude_start = i;
            }
            b'}' => {
                if stack.len() > 1 {
                    stack.pop();
                } else {
                    out.warn(base + i, "unmatched '}'");
                }
                i += 1;
                prelude_start = i;
            }
            b';' => {
                i += 1;
                prelude_start = i;
            }
            _ => i += 1,
        }
    }

    if stack.len() > 1 {
        out.warn(base + bytes.len(), "unclosed CSS block");
    }
}

fn starts_url(text: &str, i: usize) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= i + 4
        && bytes[i..i + 4].eq_ignore_ascii_case(b"url(")
        && (i == 0 || !is_name_byte(bytes[i - 1]))
}

/// The argument of `url(...)` without surrounding whitespace or quotes.
fn trim_url(text: &str, range: Range<usize>) -> Range<usize> {
    let bytes = text.as_bytes();
    let mut start = range.start;
    let mut end = range.end;
    while start < end && super::is_ascii_ws(bytes[start]) {
        start += 1;
    }
    while end > start && super::is_ascii_ws(bytes[end - 1]) {
        end -= 1;
    }
    if end - start >= 2 && matches!(bytes[start], b'"' | b'\'') && bytes[end - 1] == bytes[start] {
        start += 1;
        end -= 1;
    }
    start..end
}

fn block_for_prelude(prelude: &str, parent: Block) -> Block {
    let trimmed = prelude.trim_start();

    if let Some(at) = trimmed.strip_prefix('@') {
        let name: String = at
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_ascii_lowercase();
        if RULE_LIST_AT_RULES.contains(&name.as_str()) {
            return Block::Rules;
        }
        if name.ends_with("keyframes") {
            return Block::Keyframes;
        }
        return Block::Opaque;
    }

    match parent {
        Block::Rules | Block::Declarations => Block::Declarations,
        Block::Keyframes | Block::Opaque => Block::Opaque,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn names(selector: &str) -> Vec<(&str, SelectorKind)> {
        scan_selector(selector)
            .0
            .into_iter()
            .map(|n| (&selector[n.span], n.kind))
            .collect()
    }

    fn found(css: &str) -> Vec<(String, Context)> {
        let mut out = FileScan::default();
        scan_into(css, 0, &mut out);
        out.occurrences
            .iter()
            .map(|o| (o.token(css).to_string(), o.context))
            .collect()
    }

    fn selectors(css: &str) -> Vec<String> {
        found(css)
            .into_iter()
            .filter(|(_, c)| matches!(c, Context::CssClassSelector | Context::CssIdSelector))
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn selector_names_exclude_pseudo_and_combinators() {
        assert_eq!(
            names(".foo:hover > .bar + #baz::before"),
            vec![
                ("foo", SelectorKind::Class),
                ("bar", SelectorKind::Class),
                ("baz", SelectorKind::Id),
            ]
        );
    }

    #[test]
    fn selector_skips_attribute_selectors() {
        assert_eq!(
            names("a[href$=\".pdf\"].doc-link"),
            vec![("doc-link", SelectorKind::Class)]
        );
    }

    #[test]
    fn selector_inside_not_is_found() {
        assert_eq!(
            names("li:not(.is-current)"),
            vec![("is-current", SelectorKind::Class)]
        );
    }

    #[test]
    fn escaped_names_keep_backslash() {
        let found = names(".w-1\\.5");
        assert_eq!(found, vec![("w-1\\.5", SelectorKind::Class)]);
    }

    #[test]
    fn unterminated_attribute_selector_is_reported() {
        let (found, bad) = scan_selector(".ok [data-x=\"y\"");
        assert_eq!(found.len(), 1);
        assert_eq!(bad, Some(4));
    }

    #[test]
    fn declaration_values_are_not_selectors() {
        let css = ".main-card-wrapper {\n    border: 2px solid #e0e0e0;\n    transition: transform 0.3s ease;\n    font-size: 1.1rem;\n}\n";
        assert_eq!(selectors(css), vec!["main-card-wrapper"]);
    }

    #[test]
    fn media_rules_are_scanned_but_preludes_are_not() {
        let css = "@media (min-width: 10.5em) {\n  .col-wide { width: 50%; }\n}";
        assert_eq!(selectors(css), vec!["col-wide"]);
    }

    #[test]
    fn keyframe_steps_and_font_face_are_skipped() {
        let css = "@keyframes pulse { from { opacity: 0; } 50.5% { opacity: .5; } }\n@font-face { font-family: x; src: url(fonts/x.woff2); }\n.pulse { animation: pulse 1s; }";
        assert_eq!(selectors(css), vec!["pulse"]);
    }

    #[test]
    fn nested_rules_are_scanned() {
        let css = ".card { color: red; &.is-open { color: blue; } .title { margin: 0; } }";
        assert_eq!(selectors(css), vec!["card", "is-open", "title"]);
    }

    #[test]
    fn custom_properties_and_urls_are_tagged() {
        let css = ":root { --brand-color: #123456; }\n.logo { color: var(--brand-color); background: url(\"img/logo.png\"); }";
        let all = found(css);
        assert!(all.contains(&("--brand-color".to_string(), Context::CssCustomProperty)));
        assert_eq!(
            all.iter()
                .filter(|(t, c)| t == "--brand-color" && *c == Context::CssCustomProperty)
                .count(),
            2
        );
        assert!(all.contains(&("img/logo.png".to_string(), Context::CssUrl)));
        assert!(all.contains(&("logo".to_string(), Context::CssClassSelector)));
    }

    #[test]
    fn comments_in_preludes_are_ignored() {
        let css = "/* .old-name */ .new-name { color: red; }";
        assert_eq!(selectors(css), vec!["new-name"]);
    }

    #[test]
    fn unterminated_comment_warns_and_stops() {
        let mut out = FileScan::default();
        scan_into(".a { color: red; }\n/* never closed .b {}", 0, &mut out);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].message.contains("comment"));
        assert_eq!(out.occurrences.len(), 1);
    }

    #[test]
    fn unclosed_block_warns() {
        let mut out = FileScan::default();
        scan_into(".a { color: red;", 0, &mut out);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.occurrences.len(), 1);
    }

    #[test]
    fn base_offset_is_applied() {
        let mut out = FileScan::default();
        scan_into(".x{}", 10, &mut out);
        assert_eq!(out.occurrences[0].span, 11..12);
    }
}
