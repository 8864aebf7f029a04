//! Script scanning.
//!
//! A light lexer (comments, strings, template literals, regex literals,
//! identifiers, punctuation) followed by a call-site matcher. Only string
//! literals passed as a whole argument to DOM selection or class-manipulation
//! APIs are reported; `'btn-' + color` is an expression, not a literal
//! argument, and stays untouched. No expression is parsed or evaluated.

use std::ops::Range;

use super::css;
use super::{split_ws, Context, FileScan, Occurrence};

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(Range<usize>),
    Str {
        /// Content between the quotes.
        content: Range<usize>,
        /// Template literal with `${...}`.
        interpolated: bool,
    },
    Number,
    Regex,
    Punct(u8),
}

/// Keywords after which `/` starts a regex literal.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_byte(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

struct Lexer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    base: usize,
    pos: usize,
    toks: Vec<Tok>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str, base: usize) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            base,
            pos: 0,
            toks: Vec::new(),
        }
    }

    fn run(mut self, out: &mut FileScan) -> Vec<Tok> {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                _ if super::is_ascii_ws(b) => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => {
                    self.pos = self.text[self.pos..]
                        .find('\n')
                        .map(|rel| self.pos + rel)
                        .unwrap_or(self.bytes.len());
                }
                b'/' if self.peek(1) == Some(b'*') => match self.text[self.pos + 2..].find("*/") {
                    Some(rel) => self.pos += 2 + rel + 2,
                    None => {
                        out.warn(self.base + self.pos, "unterminated JS comment");
                        break;
                    }
                },
                b'/' if self.regex_allowed() => {
                    if !self.skip_regex() {
                        self.toks.push(Tok::Punct(b'/'));
                        self.pos += 1;
                    }
                }
                b'\'' | b'"' => self.lex_string(b, out),
                b'`' => {
                    if !self.lex_template(out) {
                        break;
                    }
                }
                _ if is_ident_start(b) => {
                    let start = self.pos;
                    while self.pos < self.bytes.len() && is_ident_byte(self.bytes[self.pos]) {
                        self.pos += 1;
                    }
                    self.toks.push(Tok::Ident(start..self.pos));
                }
                _ if b.is_ascii_digit() => {
                    while self.pos < self.bytes.len()
                        && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'.')
                    {
                        self.pos += 1;
                    }
                    self.toks.push(Tok::Number);
                }
                _ => {
                    self.toks.push(Tok::Punct(b));
                    self.pos += 1;
                }
            }
        }
        self.toks
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn regex_allowed(&self) -> bool {
        match self.toks.last() {
            None => true,
            Some(Tok::Ident(range)) => {
                REGEX_PRECEDING_KEYWORDS.contains(&&self.text[range.clone()])
            }
            Some(Tok::Number) | Some(Tok::Str { .. }) | Some(Tok::Regex) => false,
            Some(Tok::Punct(p)) => !matches!(p, b')' | b']'),
        }
    }

    /// Consume a regex literal at `pos`. Returns false (consuming nothing)
    /// if the line ends before the closing slash.
    fn skip_regex(&mut self) -> bool {
        let mut i = self.pos + 1;
        let mut in_class = false;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => return false,
                b'[' => {
                    in_class = true;
                    i += 1;
                }
                b']' => {
                    in_class = false;
                    i += 1;
                }
                b'/' if !in_class => {
                    i += 1;
                    while i < self.bytes.len() && is_ident_byte(self.bytes[i]) {
                        i += 1;
                    }
                    self.pos = i;
                    self.toks.push(Tok::Regex);
                    return true;
                }
                _ => i += 1,
            }
        }
        false
    }

    fn lex_string(&mut self, quote: u8, out: &mut FileScan) {
        let start = self.pos;
        let mut i = start + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => break,
                b if b == quote => {
                    self.toks.push(Tok::Str {
                        content: start + 1..i,
                        interpolated: false,
                    });
                    self.pos = i + 1;
                    return;
                }
                _ => i += 1,
            }
        }

        out.warn(self.base + start, "unterminated JS string literal");
        self.pos = i.min(self.bytes.len());
    }

    /// Returns false when the template never closes.
    fn lex_template(&mut self, out: &mut FileScan) -> bool {
        let start = self.pos;
        let mut i = start + 1;
        let mut interpolated = false;

        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'`' => {
                    self.toks.push(Tok::Str {
                        content: start + 1..i,
                        interpolated,
                    });
                    self.pos = i + 1;
                    return true;
                }
                b'$' if self.bytes.get(i + 1) == Some(&b'{') => {
                    interpolated = true;
                    let mut depth = 1;
                    i += 2;
                    while i < self.bytes.len() && depth > 0 {
                        match self.bytes[i] {
                            b'{' => depth += 1,
                            b'}' => depth -= 1,
                            b'\'' | b'"' => {
                                let quote = self.bytes[i];
                                i += 1;
                                while i < self.bytes.len() && self.bytes[i] != quote {
                                    if self.bytes[i] == b'\\' {
                                        i += 1;
                                    }
                                    i += 1;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }

        out.warn(self.base + start, "unterminated template literal");
        false
    }
}

// ============================================================================
// Call-site matching
// ============================================================================

/// What a literal argument means at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgMeaning {
    /// A single id.
    Id,
    /// A single class name.
    Class,
    /// Whitespace-separated class names.
    ClassList,
    /// A CSS selector.
    Selector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallShape {
    /// Only the first argument carries a name.
    First(ArgMeaning),
    /// Every literal argument carries a name.
    Each(ArgMeaning),
    /// `setAttribute('class' | 'id', value)`.
    SetAttribute,
}

fn ident_text<'a>(text: &'a str, tok: Option<&Tok>) -> Option<&'a str> {
    match tok {
        Some(Tok::Ident(range)) => Some(&text[range.clone()]),
        _ => None,
    }
}

fn is_punct(tok: Option<&Tok>, p: u8) -> bool {
    matches!(tok, Some(Tok::Punct(q)) if *q == p)
}

fn call_shape(text: &str, toks: &[Tok], idx: usize, name: &str) -> Option<CallShape> {
    let is_member = idx > 0 && is_punct(toks.get(idx - 1), b'.');
    let receiver = if is_member && idx > 1 {
        ident_text(text, toks.get(idx - 2))
    } else {
        None
    };

    let shape = match name {
        "getElementById" => CallShape::First(ArgMeaning::Id),
        "getElementsByClassName" => CallShape::First(ArgMeaning::ClassList),
        "querySelector" | "querySelectorAll" | "closest" | "matches" | "find" if is_member => {
            CallShape::First(ArgMeaning::Selector)
        }
        "$" | "jQuery" if !is_member => CallShape::First(ArgMeaning::Selector),
        "addClass" | "removeClass" | "toggleClass" | "hasClass" if is_member => {
            CallShape::First(ArgMeaning::ClassList)
        }
        "add" | "remove" | "toggle" | "contains" | "replace" if receiver == Some("classList") => {
            CallShape::Each(ArgMeaning::Class)
        }
        "setAttribute" if is_member => CallShape::SetAttribute,
        _ => return None,
    };
    Some(shape)
}

/// Token index ranges of the top-level arguments of the call whose `(` is at
/// `open`. `None` if the parenthesis never closes.
fn split_args(toks: &[Tok], open: usize) -> Option<Vec<Range<usize>>> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut arg_start = open + 1;

    for (i, tok) in toks.iter().enumerate().skip(open + 1) {
        match tok {
            Tok::Punct(b'(') | Tok::Punct(b'[') | Tok::Punct(b'{') => depth += 1,
            Tok::Punct(b')') if depth == 0 => {
                if i > arg_start {
                    args.push(arg_start..i);
                }
                return Some(args);
            }
            Tok::Punct(b')') | Tok::Punct(b']') | Tok::Punct(b'}') => {
                depth = depth.saturating_sub(1)
            }
            Tok::Punct(b',') if depth == 0 => {
                args.push(arg_start..i);
                arg_start = i + 1;
            }
            _ => {}
        }
    }

    None
}

/// The literal content if the argument is exactly one plain string literal.
fn literal_arg(toks: &[Tok], arg: &Range<usize>) -> Option<Range<usize>> {
    if arg.len() != 1 {
        return None;
    }
    match &toks[arg.start] {
        Tok::Str {
            content,
            interpolated: false,
        } => Some(content.clone()),
        _ => None,
    }
}

fn literal_value<'a>(text: &'a str, toks: &[Tok], arg: &Range<usize>) -> Option<&'a str> {
    literal_arg(toks, arg).map(|content| &text[content])
}

fn emit(text: &str, base: usize, content: Range<usize>, meaning: ArgMeaning, out: &mut FileScan) {
    match meaning {
        ArgMeaning::Id | ArgMeaning::Class => {
            if !content.is_empty() {
                out.occurrences.push(Occurrence::reference(
                    base + content.start..base + content.end,
                    Context::JsStringLiteral,
                ));
            }
        }
        ArgMeaning::ClassList => {
            for span in split_ws(text, content) {
                out.occurrences.push(Occurrence::reference(
                    base + span.start..base + span.end,
                    Context::JsStringLiteral,
                ));
            }
        }
        ArgMeaning::Selector => {
            let selector = &text[content.clone()];
            let (names, unterminated) = css::scan_selector(selector);
            for name in names {
                out.occurrences.push(Occurrence::reference(
                    base + content.start + name.span.start..base + content.start + name.span.end,
                    Context::JsStringLiteral,
                ));
            }
            if let Some(offset) = unterminated {
                out.warn(base + content.start + offset, "malformed selector string");
            }
        }
    }
}

/// True when the token after an assigned literal ends the expression.
fn ends_expression(tok: Option<&Tok>) -> bool {
    match tok {
        None | Some(Tok::Ident(_)) => true,
        Some(Tok::Punct(p)) => matches!(p, b';' | b',' | b')' | b'}' | b']'),
        _ => false,
    }
}

fn match_assignment(text: &str, base: usize, toks: &[Tok], idx: usize, out: &mut FileScan) {
    let Some(name) = ident_text(text, toks.get(idx)) else {
        return;
    };
    let meaning = match name {
        "className" => ArgMeaning::ClassList,
        "id" => ArgMeaning::Id,
        _ => return,
    };
    if idx == 0 || !is_punct(toks.get(idx - 1), b'.') {
        return;
    }

    // `=` or `+=`, but not `==` / `===`.
    let mut value = idx + 1;
    if is_punct(toks.get(value), b'+') {
        value += 1;
    }
    if !is_punct(toks.get(value), b'=') || is_punct(toks.get(value + 1), b'=') {
        return;
    }
    value += 1;

    if let Some(Tok::Str {
        content,
        interpolated: false,
    }) = toks.get(value)
    {
        if ends_expression(toks.get(value + 1)) {
            emit(text, base, content.clone(), meaning, out);
        }
    }
}

/// Scan script text located at byte `base` of the enclosing file.
pub(crate) fn scan_into(text: &str, base: usize, out: &mut FileScan) {
    let toks = Lexer::new(text, base).run(out);

    for idx in 0..toks.len() {
        match_assignment(text, base, &toks, idx, out);

        let Some(name) = ident_text(text, toks.get(idx)) else {
            continue;
        };
        if !is_punct(toks.get(idx + 1), b'(') {
            continue;
        }
        let Some(shape) = call_shape(text, &toks, idx, name) else {
            continue;
        };
        let Some(args) = split_args(&toks, idx + 1) else {
            continue;
        };

        match shape {
            CallShape::First(meaning) => {
                if let Some(content) = args.first().and_then(|a| literal_arg(&toks, a)) {
                    emit(text, base, content, meaning, out);
                }
            }
            CallShape::Each(meaning) => {
                for arg in &args {
                    if let Some(content) = literal_arg(&toks, arg) {
                        emit(text, base, content, meaning, out);
                    }
                }
            }
            CallShape::SetAttribute => {
                let (Some(attr), Some(value)) = (args.first(), args.get(1)) else {
                    continue;
                };
                let meaning = match literal_value(text, &toks, attr) {
                    Some(a) if a.eq_ignore_ascii_case("class") => ArgMeaning::ClassList,
                    Some(a) if a.eq_ignore_ascii_case("id") => ArgMeaning::Id,
                    _ => continue,
                };
                if let Some(content) = literal_arg(&toks, value) {
                    emit(text, base, content, meaning, out);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(js: &str) -> Vec<String> {
        let mut out = FileScan::default();
        scan_into(js, 0, &mut out);
        out.occurrences
            .iter()
            .map(|o| o.token(js).to_string())
            .collect()
    }

    #[test]
    fn get_element_by_id_literal() {
        assert_eq!(
            refs("const el = document.getElementById('system-indicator');"),
            vec!["system-indicator"]
        );
    }

    #[test]
    fn class_list_methods() {
        let js = "el.classList.add('a', \"b\");\nel.classList.contains('label-inactive');\nel.classList.toggle('hidden-element', true);\nel.classList.replace('old', 'new');";
        assert_eq!(
            refs(js),
            vec!["a", "b", "label-inactive", "hidden-element", "old", "new"]
        );
    }

    #[test]
    fn concatenation_is_left_alone() {
        assert!(refs("elem.classList.add('btn-' + color);").is_empty());
        assert!(refs("document.getElementById(prefix + '-title');").is_empty());
    }

    #[test]
    fn interpolated_templates_are_left_alone() {
        assert!(refs("el.classList.add(`btn-${color}`);").is_empty());
        assert_eq!(refs("el.classList.add(`plain`);"), vec!["plain"]);
    }

    #[test]
    fn selectors_are_scanned_for_names() {
        assert_eq!(
            refs("document.querySelector('#main-title > .subtitle:hover');"),
            vec!["main-title", "subtitle"]
        );
        assert_eq!(refs("$('.nav-item').addClass('is-open shown');"), vec!["nav-item", "is-open", "shown"]);
    }

    #[test]
    fn bare_matches_call_is_not_a_selector_site() {
        assert!(refs("matches('.x');").is_empty());
        assert!(refs("add('x');").is_empty());
    }

    #[test]
    fn set_attribute_and_assignments() {
        let js = "el.setAttribute('class', 'card active-card');\nel.setAttribute('id', 'panel');\nel.setAttribute('href', 'page');\nel.className = 'alert-box';\nel.id = \"status-message\";\nel.className += ' extra';";
        assert_eq!(
            refs(js),
            vec!["card", "active-card", "panel", "alert-box", "status-message", "extra"]
        );
    }

    #[test]
    fn comparisons_are_not_assignments() {
        assert!(refs("if (el.id === 'panel') {}").is_empty());
        assert!(refs("el.className = 'a' + b;").is_empty());
    }

    #[test]
    fn comments_and_unrelated_strings_are_skipped() {
        let js = "// document.getElementById('commented')\n/* el.classList.add('blocked') */\nconsole.log('getElementById(\"x\")');\nel.addEventListener('click', go);";
        assert!(refs(js).is_empty());
    }

    #[test]
    fn regex_literals_do_not_confuse_the_lexer() {
        let js = "const re = /['\"]/g;\ndocument.getElementById('after-regex');\nconst half = total / 2 / 'x'.length;";
        assert_eq!(refs(js), vec!["after-regex"]);
    }

    #[test]
    fn unterminated_string_warns_and_continues() {
        let js = "const s = 'oops\ndocument.getElementById('ok');";
        let mut out = FileScan::default();
        scan_into(js, 0, &mut out);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.occurrences.len(), 1);
        assert_eq!(out.occurrences[0].token(js), "ok");
    }

    #[test]
    fn occurrences_are_references() {
        let mut out = FileScan::default();
        scan_into("document.getElementById('x1')", 5, &mut out);
        assert_eq!(out.occurrences[0].role, super::super::Role::Reference);
        assert_eq!(out.occurrences[0].span, 30..32);
    }
}
