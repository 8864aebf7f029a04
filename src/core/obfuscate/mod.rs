//! Identifier obfuscation engine.
//!
//! Renames CSS classes and ids consistently across HTML, CSS, and JavaScript:
//! 1. Each format's scanner finds candidate spans and tags them with a
//!    [`Context`] and a [`Role`]
//! 2. [`classify`] decides which candidates are renameable
//! 3. The collection pass feeds declaration sites into the [`Registry`]
//! 4. The rewrite pass substitutes replacements from the frozen registry

pub mod classify;
pub mod css;
pub mod html;
pub mod js;
pub mod naming;
pub mod passes;
pub mod registry;

use serde::Serialize;
use std::ops::Range;
use std::path::Path;

pub use classify::{classify, Classification, Context, ProtectReason, Whitelist};
pub use naming::NameGenerator;
pub use passes::{collect, rewrite, Collected, Rewrite};
pub use registry::Registry;

// ============================================================================
// Types
// ============================================================================

/// Source formats the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Html,
    Css,
    Js,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(SourceFormat::Html),
            "css" => Some(SourceFormat::Css),
            "js" | "mjs" => Some(SourceFormat::Js),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Html => "html",
            SourceFormat::Css => "css",
            SourceFormat::Js => "js",
        }
    }
}

/// Whether an occurrence may introduce an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Markup and stylesheet positions: collected, then rewritten.
    Declaration,
    /// Script string literals: rewritten only if already collected.
    Reference,
}

/// A candidate token at a byte span of the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub span: Range<usize>,
    pub context: Context,
    pub role: Role,
}

impl Occurrence {
    pub fn declaration(span: Range<usize>, context: Context) -> Self {
        Self {
            span,
            context,
            role: Role::Declaration,
        }
    }

    pub fn reference(span: Range<usize>, context: Context) -> Self {
        Self {
            span,
            context,
            role: Role::Reference,
        }
    }

    pub fn token<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span.clone()]
    }
}

/// Malformed input the scanner could not interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanWarning {
    /// Byte offset into the scanned file.
    pub offset: usize,
    pub message: String,
}

/// Result of scanning one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileScan {
    pub occurrences: Vec<Occurrence>,
    /// Value ranges of markup `class` attributes, rejoined on rewrite.
    pub class_values: Vec<Range<usize>>,
    pub warnings: Vec<ScanWarning>,
}

impl FileScan {
    pub(crate) fn warn(&mut self, offset: usize, message: impl Into<String>) {
        self.warnings.push(ScanWarning {
            offset,
            message: message.into(),
        });
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Scan a whole file of the given format.
pub fn scan(format: SourceFormat, text: &str) -> FileScan {
    let mut out = FileScan::default();
    match format {
        SourceFormat::Html => html::scan_into(text, &mut out),
        SourceFormat::Css => css::scan_into(text, 0, &mut out),
        SourceFormat::Js => js::scan_into(text, 0, &mut out),
    }
    out.occurrences.sort_by_key(|o| o.span.start);
    out
}

/// 1-indexed line number of a byte offset.
pub fn line_of(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

pub(crate) fn is_ascii_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

/// Spans of the whitespace-separated tokens in `text[range]`.
pub(crate) fn split_ws(text: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = range.start;

    while i < range.end {
        while i < range.end && is_ascii_ws(bytes[i]) {
            i += 1;
        }
        let start = i;
        while i < range.end && !is_ascii_ws(bytes[i]) {
            i += 1;
        }
        if i > start {
            spans.push(start..i);
        }
    }

    spans
}

/// Case-insensitive ASCII search for `needle` in `text[from..]`.
pub(crate) fn find_ci(text: &str, from: usize, needle: &str) -> Option<usize> {
    let hay = text.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || from > hay.len() || hay.len() - from < needle.len() {
        return None;
    }

    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}
