//! The two engine passes over one scanned file.
//!
//! `collect` reports what a file declares and protects without touching the
//! registry; the pipeline feeds every file's result into the registry in a
//! fixed order. `rewrite` reads the frozen registry and substitutes spans.

use std::collections::BTreeSet;
use std::ops::Range;

use super::classify::{classify, Classification, ProtectReason, Whitelist};
use super::registry::Registry;
use super::{split_ws, FileScan, Role};
use crate::error::Result;

/// Collection-pass result for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    /// Renameable identifiers at declaration sites, first-seen order, unique.
    pub renameable: Vec<String>,
    /// Protected tokens (any role), first-seen order, unique.
    pub protected: Vec<(String, ProtectReason)>,
    /// Renameable-looking script literals, which only rename if declared
    /// elsewhere. Unique, first-seen order.
    pub references: Vec<String>,
    /// Count of renameable declaration occurrences.
    pub declarations: usize,
}

/// Rewrite-pass result for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: String,
    pub replacements: usize,
}

pub fn collect(text: &str, scan: &FileScan, whitelist: &Whitelist) -> Collected {
    let mut collected = Collected::default();
    let mut seen_renameable = BTreeSet::new();
    let mut seen_protected = BTreeSet::new();
    let mut seen_references = BTreeSet::new();

    for occurrence in &scan.occurrences {
        let token = occurrence.token(text);
        match (classify(occurrence.context, token, whitelist), occurrence.role) {
            (Classification::Renameable, Role::Declaration) => {
                collected.declarations += 1;
                if seen_renameable.insert(token) {
                    collected.renameable.push(token.to_string());
                }
            }
            (Classification::Renameable, Role::Reference) => {
                if seen_references.insert(token) {
                    collected.references.push(token.to_string());
                }
            }
            (Classification::Protected(reason), _) => {
                let token = token.trim();
                if seen_protected.insert(token) {
                    collected.protected.push((token.to_string(), reason));
                }
            }
            (Classification::Irrelevant, _) => {}
        }
    }

    collected
}

/// Substitute every renameable span of `text`.
///
/// Declaration sites must be known to the registry; a miss means the two
/// passes disagreed and is an error. Reference sites are replaced only when
/// known. A `class` value with at least one replacement is rejoined with
/// single spaces; untouched values keep their bytes.
pub fn rewrite(
    text: &str,
    scan: &FileScan,
    registry: &Registry,
    whitelist: &Whitelist,
) -> Result<Rewrite> {
    let mut edits: Vec<(usize, usize, &str)> = Vec::new();

    for occurrence in &scan.occurrences {
        let token = occurrence.token(text);
        if !classify(occurrence.context, token, whitelist).is_renameable() {
            continue;
        }

        let replacement = match occurrence.role {
            Role::Declaration => registry.get(token)?,
            Role::Reference => match registry.lookup(token) {
                Some(replacement) => replacement,
                None => continue,
            },
        };

        let (start, end) = (occurrence.span.start, occurrence.span.end);
        if edits.iter().any(|&(s, e, _)| start < e && end > s) {
            continue;
        }
        edits.push((start, end, replacement));
    }

    let replacements = edits.len();
    let mut edits = join_class_values(text, &scan.class_values, edits);
    edits.sort_by(|a, b| b.0.cmp(&a.0));

    let mut content = text.to_string();
    for (start, end, replacement) in edits {
        content.replace_range(start..end, &replacement);
    }

    Ok(Rewrite {
        content,
        replacements,
    })
}

/// Fold the token edits inside each `class` value into one edit for the
/// whole value, its tokens joined by single spaces in their original order.
fn join_class_values(
    text: &str,
    values: &[Range<usize>],
    edits: Vec<(usize, usize, &str)>,
) -> Vec<(usize, usize, String)> {
    let mut remaining: Vec<(usize, usize, String)> = edits
        .into_iter()
        .map(|(start, end, replacement)| (start, end, replacement.to_string()))
        .collect();
    let mut joined = Vec::new();

    for value in values {
        let (inside, outside): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|(start, end, _)| *start >= value.start && *end <= value.end);
        remaining = outside;
        if inside.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = split_ws(text, value.clone())
            .into_iter()
            .map(|span| {
                inside
                    .iter()
                    .find(|(start, _, _)| *start == span.start)
                    .map(|(_, _, replacement)| replacement.as_str())
                    .unwrap_or(&text[span])
            })
            .collect();
        joined.push((value.start, value.end, tokens.join(" ")));
    }

    remaining.extend(joined);
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscate::{scan, SourceFormat};

    fn run(files: &[(SourceFormat, &str)], whitelist: &Whitelist) -> Vec<String> {
        let scans: Vec<FileScan> = files.iter().map(|(f, t)| scan(*f, t)).collect();
        let mut registry = Registry::default();

        for ((_, text), scanned) in files.iter().zip(&scans) {
            for id in collect(text, scanned, whitelist).renameable {
                registry.resolve(&id).unwrap();
            }
        }
        registry.freeze();

        files
            .iter()
            .zip(&scans)
            .map(|((_, text), scanned)| {
                rewrite(text, scanned, &registry, whitelist)
                    .unwrap()
                    .content
            })
            .collect()
    }

    #[test]
    fn round_trip_uses_one_token_everywhere() {
        let html = r#"<div id="system-indicator" class="label-inactive"></div>"#;
        let css = ".label-inactive { display:none; }";
        let js = "const el = document.getElementById('system-indicator');\nif (el.classList.contains('label-inactive')) {}";
        let out = run(
            &[
                (SourceFormat::Html, html),
                (SourceFormat::Css, css),
                (SourceFormat::Js, js),
            ],
            &Whitelist::default(),
        );

        let mut registry = Registry::default();
        let id_token = registry.resolve("system-indicator").unwrap();
        let class_token = registry.resolve("label-inactive").unwrap();

        assert_eq!(
            out[0],
            format!(r#"<div id="{}" class="{}"></div>"#, id_token, class_token)
        );
        assert_eq!(out[1], format!(".{} {{ display:none; }}", class_token));
        assert!(out[2].contains(&format!("getElementById('{}')", id_token)));
        assert!(out[2].contains(&format!("contains('{}')", class_token)));
    }

    #[test]
    fn script_literals_never_introduce_identifiers() {
        let js = "el.classList.add('only-in-script');";
        let out = run(&[(SourceFormat::Js, js)], &Whitelist::default());
        assert_eq!(out[0], js);
    }

    #[test]
    fn protected_tokens_survive() {
        let css = ":root { --brand-color: #123; }\n.bootstrap-class, .card { color: var(--brand-color); background: url(img/bg.png); }";
        let html = r#"<img src="scripts/app.js" class="card bootstrap-class">"#;
        let whitelist = Whitelist::new(["bootstrap-class"]);
        let out = run(
            &[(SourceFormat::Css, css), (SourceFormat::Html, html)],
            &whitelist,
        );

        assert!(out[0].contains("--brand-color: #123"));
        assert!(out[0].contains("var(--brand-color)"));
        assert!(out[0].contains(".bootstrap-class, .v-"));
        assert!(out[0].contains("url(img/bg.png)"));
        assert!(out[1].starts_with(r#"<img src="scripts/app.js" class="v-"#));
        assert!(out[1].ends_with(r#" bootstrap-class">"#));
    }

    #[test]
    fn collect_reports_protected_and_references() {
        let html = r#"<div class="active card" id="content-root"></div><script>el.classList.add('ghost', 'card');</script>"#;
        let scanned = scan(SourceFormat::Html, html);
        let whitelist = Whitelist::new(["active"]);
        let collected = collect(html, &scanned, &whitelist);

        assert_eq!(collected.renameable, vec!["card", "content-root"]);
        assert_eq!(collected.declarations, 2);
        assert_eq!(
            collected.protected,
            vec![("active".to_string(), ProtectReason::Whitelisted)]
        );
        assert_eq!(collected.references, vec!["ghost", "card"]);
    }

    #[test]
    fn unknown_declaration_is_an_error() {
        let css = ".late { }";
        let scanned = scan(SourceFormat::Css, css);
        let mut registry = Registry::default();
        registry.freeze();

        let err = rewrite(css, &scanned, &registry, &Whitelist::default()).unwrap_err();
        assert_eq!(err.code.as_str(), "registry.unknown_identifier");
    }

    #[test]
    fn dynamic_concatenation_is_unchanged() {
        let css = ".btn-primary { color: red; }";
        let js = "elem.classList.add('btn-' + color);";
        let out = run(
            &[(SourceFormat::Css, css), (SourceFormat::Js, js)],
            &Whitelist::default(),
        );
        assert_eq!(out[1], js);
    }

    #[test]
    fn noscript_markup_matches_its_selector() {
        let html = r#"<noscript><p class="js-off-banner">Enable JS</p></noscript>"#;
        let css = ".js-off-banner { color: red; }";
        let out = run(
            &[(SourceFormat::Html, html), (SourceFormat::Css, css)],
            &Whitelist::default(),
        );

        let mut registry = Registry::default();
        let token = registry.resolve("js-off-banner").unwrap();
        assert_eq!(
            out[0],
            format!(r#"<noscript><p class="{}">Enable JS</p></noscript>"#, token)
        );
        assert_eq!(out[1], format!(".{} {{ color: red; }}", token));
    }

    #[test]
    fn svg_cdata_style_matches_markup() {
        let html = "<svg class=\"icon-fill\"><style><![CDATA[\n.icon-fill { fill: red; }\n]]></style></svg>";
        let out = run(&[(SourceFormat::Html, html)], &Whitelist::default());

        let mut registry = Registry::default();
        let token = registry.resolve("icon-fill").unwrap();
        assert_eq!(
            out[0],
            format!(
                "<svg class=\"{0}\"><style><![CDATA[\n.{0} {{ fill: red; }}\n]]></style></svg>",
                token
            )
        );
    }

    #[test]
    fn rewritten_class_values_are_single_spaced() {
        let html = "<p class=\"  ab\tcd\n active \"></p><i class=\" active\tshow \"></i>";
        let whitelist = Whitelist::new(["active", "show"]);
        let out = run(&[(SourceFormat::Html, html)], &whitelist);

        let mut registry = Registry::default();
        let ab = registry.resolve("ab").unwrap();
        let cd = registry.resolve("cd").unwrap();
        assert_eq!(
            out[0],
            format!(
                "<p class=\"{} {} active\"></p><i class=\" active\tshow \"></i>",
                ab, cd
            )
        );
    }

    #[test]
    fn rewrite_counts_replacements() {
        let html = r#"<p class="ab cd ab"></p>"#;
        let scanned = scan(SourceFormat::Html, html);
        let mut registry = Registry::default();
        for id in collect(html, &scanned, &Whitelist::default()).renameable {
            registry.resolve(&id).unwrap();
        }
        registry.freeze();

        let result = rewrite(html, &scanned, &registry, &Whitelist::default()).unwrap();
        assert_eq!(result.replacements, 3);
    }
}
