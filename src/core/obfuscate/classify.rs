//! Token classification.
//!
//! Decides, for a candidate token found in a given source context, whether it
//! is a renameable identifier, a protected token, or irrelevant text. The
//! decision is a pure function of `(context, token, whitelist)` so both
//! pipeline passes reach the same verdict for the same occurrence.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

// ============================================================================
// Types
// ============================================================================

/// Where a candidate token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    /// One whitespace-separated token of an HTML `class` attribute.
    HtmlClassAttr,
    /// The whole value of an HTML `id` attribute.
    HtmlIdAttr,
    /// Any other HTML attribute value or text node.
    HtmlText,
    /// Name portion of a `.name` selector.
    CssClassSelector,
    /// Name portion of a `#name` selector.
    CssIdSelector,
    /// `--name` declaration or `var(--name)` argument.
    CssCustomProperty,
    /// Argument of `url(...)`.
    CssUrl,
    /// Text inside a declaration block.
    CssDeclarationValue,
    /// Content of a string literal passed to a DOM call site.
    JsStringLiteral,
    /// Anything else in a script.
    JsCode,
}

impl Context {
    /// Contexts whose tokens may name a class or id.
    pub fn is_identifier_position(&self) -> bool {
        matches!(
            self,
            Context::HtmlClassAttr
                | Context::HtmlIdAttr
                | Context::CssClassSelector
                | Context::CssIdSelector
                | Context::JsStringLiteral
        )
    }
}

/// Why a token was protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectReason {
    CustomProperty,
    UrlLike,
    Reserved,
    Whitelisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum Classification {
    Renameable,
    Protected(ProtectReason),
    Irrelevant,
}

impl Classification {
    pub fn is_renameable(&self) -> bool {
        matches!(self, Classification::Renameable)
    }
}

/// Identifiers that must never be renamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    names: BTreeSet<String>,
}

impl Whitelist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.names.contains(token.trim())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

// ============================================================================
// Reserved vocabularies
// ============================================================================

/// Standard HTML element names. A class or id spelled like a tag stays as-is
/// so selectors such as `nav` vs `.nav` never drift apart.
const STANDARD_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup",
    "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em", "embed",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd",
    "label", "legend", "li", "link", "main", "map", "mark", "menu", "meta", "meter", "nav",
    "noscript", "object", "ol", "optgroup", "option", "output", "p", "param", "picture", "pre",
    "progress", "q", "rp", "rt", "ruby", "s", "samp", "script", "search", "section", "select",
    "slot", "small", "source", "span", "strong", "style", "sub", "summary", "sup", "svg", "table",
    "tbody", "td", "template", "textarea", "tfoot", "th", "thead", "time", "title", "tr",
    "track", "u", "ul", "var", "video", "wbr",
];

/// Keywords of CSS and JavaScript that can appear where a name is expected.
const RESERVED_KEYWORDS: &[&str] = &[
    // CSS-wide and common value keywords
    "inherit", "initial", "unset", "revert", "auto", "none", "important",
    // HTML attribute names that leak into selectors and scripts
    "class", "id", "style", "type", "name", "href", "src", "onclick",
    // JavaScript literals and globals
    "true", "false", "null", "undefined", "this", "window", "document", "NaN", "Infinity",
];

pub fn is_standard_tag(token: &str) -> bool {
    STANDARD_TAGS.contains(&token.to_ascii_lowercase().as_str())
}

pub fn is_reserved_keyword(token: &str) -> bool {
    RESERVED_KEYWORDS.contains(&token)
}

// ============================================================================
// Grammar checks
// ============================================================================

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[A-Za-z_][A-Za-z0-9_-]*$").expect("valid regex"));

/// True for `-?[A-Za-z_][A-Za-z0-9_-]*`.
///
/// A leading `--` is a custom property, never an identifier.
pub fn is_identifier(token: &str) -> bool {
    IDENTIFIER.is_match(token)
}

/// True when the token reads as a URL, path, or file name (`app.js`,
/// `scripts/app.js`, `https://…`, `page?x`).
pub fn is_url_like(token: &str) -> bool {
    token.contains(['/', '.', ':', '?'])
}

// ============================================================================
// Classification
// ============================================================================

/// Classify a token found in `context`. Rules are checked in priority order.
pub fn classify(context: Context, token: &str, whitelist: &Whitelist) -> Classification {
    // 1. Custom properties are never renamed.
    if context == Context::CssCustomProperty || token.starts_with("--") {
        return Classification::Protected(ProtectReason::CustomProperty);
    }

    // 2. URLs, paths, file names.
    if context == Context::CssUrl || is_url_like(token) {
        return Classification::Protected(ProtectReason::UrlLike);
    }

    // 3. Tag names and language keywords.
    if is_standard_tag(token) || is_reserved_keyword(token) {
        return Classification::Protected(ProtectReason::Reserved);
    }

    // 4. Configured exemptions.
    if whitelist.contains(token) {
        return Classification::Protected(ProtectReason::Whitelisted);
    }

    // 5. Identifier positions with a well-formed name.
    if context.is_identifier_position() && is_identifier(token) {
        return Classification::Renameable;
    }

    Classification::Irrelevant
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Whitelist {
        Whitelist::default()
    }

    #[test]
    fn identifier_grammar() {
        assert!(is_identifier("label-inactive"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("-webkit-thing"));
        assert!(is_identifier("a1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1col"));
        assert!(!is_identifier("--brand-color"));
        assert!(!is_identifier("has space"));
        assert!(!is_identifier("w-1\\.5"));
        assert!(!is_identifier("-"));
    }

    #[test]
    fn custom_properties_are_protected_first() {
        assert_eq!(
            classify(Context::CssCustomProperty, "--brand-color", &empty()),
            Classification::Protected(ProtectReason::CustomProperty)
        );
        // Even in a class position a `--` token is a variable.
        assert_eq!(
            classify(Context::HtmlClassAttr, "--brand-color", &empty()),
            Classification::Protected(ProtectReason::CustomProperty)
        );
    }

    #[test]
    fn url_like_tokens_are_protected() {
        for token in ["scripts/app.js", "style.css", "https:", "a?b"] {
            assert_eq!(
                classify(Context::JsStringLiteral, token, &empty()),
                Classification::Protected(ProtectReason::UrlLike),
                "{} should be url-like",
                token
            );
        }
        assert_eq!(
            classify(Context::CssUrl, "sprite", &empty()),
            Classification::Protected(ProtectReason::UrlLike)
        );
    }

    #[test]
    fn tags_and_keywords_are_protected() {
        assert_eq!(
            classify(Context::HtmlClassAttr, "section", &empty()),
            Classification::Protected(ProtectReason::Reserved)
        );
        assert_eq!(
            classify(Context::JsStringLiteral, "true", &empty()),
            Classification::Protected(ProtectReason::Reserved)
        );
        assert_eq!(
            classify(Context::CssClassSelector, "none", &empty()),
            Classification::Protected(ProtectReason::Reserved)
        );
    }

    #[test]
    fn whitelist_wins_over_renameable() {
        let whitelist = Whitelist::new(["bootstrap-class", "  padded  "]);
        assert_eq!(
            classify(Context::HtmlClassAttr, "bootstrap-class", &whitelist),
            Classification::Protected(ProtectReason::Whitelisted)
        );
        assert_eq!(
            classify(Context::CssClassSelector, "padded", &whitelist),
            Classification::Protected(ProtectReason::Whitelisted)
        );
    }

    #[test]
    fn identifier_positions_are_renameable() {
        for context in [
            Context::HtmlClassAttr,
            Context::HtmlIdAttr,
            Context::CssClassSelector,
            Context::CssIdSelector,
            Context::JsStringLiteral,
        ] {
            assert_eq!(
                classify(context, "system-indicator", &empty()),
                Classification::Renameable,
                "{:?}",
                context
            );
        }
    }

    #[test]
    fn other_positions_are_irrelevant() {
        assert_eq!(
            classify(Context::HtmlText, "system-indicator", &empty()),
            Classification::Irrelevant
        );
        assert_eq!(
            classify(Context::CssDeclarationValue, "e0e0e0", &empty()),
            Classification::Irrelevant
        );
        assert_eq!(
            classify(Context::JsCode, "toggle", &empty()),
            Classification::Irrelevant
        );
        assert_eq!(
            classify(Context::CssIdSelector, "123abc", &empty()),
            Classification::Irrelevant
        );
    }
}
