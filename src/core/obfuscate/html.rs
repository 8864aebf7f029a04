//! Markup scanning.
//!
//! Reports `class` sub-tokens and `id` values of start tags, and hands
//! embedded `<style>`, `<script>` and `on*` handler text to the stylesheet
//! and script scanners with their byte offset in the file.

use std::ops::Range;

use super::{css, find_ci, is_ascii_ws, js, split_ws, Context, FileScan, Occurrence};

/// Elements whose content is raw text, never markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title", "xmp"];

/// `type` values that mark a `<script>` as JavaScript.
const JS_MIME_TYPES: &[&str] = &[
    "",
    "module",
    "text/javascript",
    "application/javascript",
    "text/ecmascript",
    "application/ecmascript",
    "application/x-javascript",
    "text/jscript",
];

struct Attribute {
    name: Range<usize>,
    value: Option<Range<usize>>,
}

struct StartTag {
    name: String,
    attributes: Vec<Attribute>,
    /// Byte just past the closing `>`.
    end: usize,
}

/// Scan a whole markup file.
pub(crate) fn scan_into(text: &str, out: &mut FileScan) {
    let bytes = text.as_bytes();
    let mut i = 0;

    while let Some(rel) = text[i..].find('<') {
        let lt = i + rel;
        let rest = &text[lt..];

        if rest.starts_with("<!--") {
            match text[lt + 4..].find("-->") {
                Some(rel) => i = lt + 4 + rel + 3,
                None => {
                    out.warn(lt, "unterminated HTML comment");
                    return;
                }
            }
        } else if rest.starts_with("<!") || rest.starts_with("<?") || rest.starts_with("</") {
            match text[lt..].find('>') {
                Some(rel) => i = lt + rel + 1,
                None => {
                    out.warn(lt, "unterminated tag");
                    return;
                }
            }
        } else if bytes.get(lt + 1).is_some_and(|b| b.is_ascii_alphabetic()) {
            let Some(tag) = parse_start_tag(text, lt, out) else {
                return;
            };
            emit_attributes(text, &tag, out);
            i = scan_element_content(text, &tag, out);
        } else {
            i = lt + 1;
        }
    }
}

/// Parse a start tag at `lt`. `None` (after a warning) if it never closes.
fn parse_start_tag(text: &str, lt: usize, out: &mut FileScan) -> Option<StartTag> {
    let bytes = text.as_bytes();
    let mut i = lt + 1;
    while i < bytes.len() && !is_ascii_ws(bytes[i]) && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let name = text[lt + 1..i].to_ascii_lowercase();
    let mut attributes = Vec::new();

    loop {
        while i < bytes.len() && is_ascii_ws(bytes[i]) {
            i += 1;
        }
        match bytes.get(i) {
            None => {
                out.warn(lt, format!("unterminated <{}> tag", name));
                return None;
            }
            Some(b'>') => {
                return Some(StartTag {
                    name,
                    attributes,
                    end: i + 1,
                });
            }
            Some(b'/') => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len() && !is_ascii_ws(bytes[i]) && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        let attr_name = name_start..i;

        let mut j = i;
        while j < bytes.len() && is_ascii_ws(bytes[j]) {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            attributes.push(Attribute {
                name: attr_name,
                value: None,
            });
            continue;
        }

        j += 1;
        while j < bytes.len() && is_ascii_ws(bytes[j]) {
            j += 1;
        }

        let value = match bytes.get(j) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                match text[j + 1..].find(quote as char) {
                    Some(rel) => {
                        i = j + 1 + rel + 1;
                        j + 1..j + 1 + rel
                    }
                    None => {
                        out.warn(j, "unterminated attribute value");
                        return None;
                    }
                }
            }
            _ => {
                let start = j;
                while j < bytes.len() && !is_ascii_ws(bytes[j]) && bytes[j] != b'>' {
                    j += 1;
                }
                i = j;
                start..j
            }
        };

        attributes.push(Attribute {
            name: attr_name,
            value: Some(value),
        });
    }
}

fn emit_attributes(text: &str, tag: &StartTag, out: &mut FileScan) {
    for attr in &tag.attributes {
        let Some(value) = attr.value.clone() else {
            continue;
        };
        let name = text[attr.name.clone()].to_ascii_lowercase();

        match name.as_str() {
            "class" => {
                out.class_values.push(value.clone());
                for span in split_ws(text, value) {
                    out.occurrences
                        .push(Occurrence::declaration(span, Context::HtmlClassAttr));
                }
            }
            "id" => {
                let span = trim_ws(text, value);
                if !span.is_empty() {
                    out.occurrences
                        .push(Occurrence::declaration(span, Context::HtmlIdAttr));
                }
            }
            _ if name.len() > 2 && name.starts_with("on") => {
                js::scan_into(&text[value.clone()], value.start, out);
            }
            _ => {}
        }
    }
}

/// Handle raw-text element bodies; returns where markup scanning resumes.
fn scan_element_content(text: &str, tag: &StartTag, out: &mut FileScan) -> usize {
    let is_style = tag.name == "style";
    let is_script = tag.name == "script";
    if !is_style && !is_script && !RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
        return tag.end;
    }

    let closing = format!("</{}", tag.name);
    let body_end = find_ci(text, tag.end, &closing);
    let body = tag.end..body_end.unwrap_or(text.len());

    if body_end.is_none() {
        out.warn(tag.end, format!("unclosed <{}> element", tag.name));
    }

    let inner = strip_cdata(text, body.clone());
    if is_style {
        css::scan_into(&text[inner.clone()], inner.start, out);
    } else if is_script && script_is_js(text, tag) {
        js::scan_into(&text[inner.clone()], inner.start, out);
    }

    body.end
}

/// Narrow an embedded body to the inside of a `<![CDATA[ ... ]]>` wrapper,
/// as found in inline SVG.
fn strip_cdata(text: &str, body: Range<usize>) -> Range<usize> {
    const OPEN: &str = "<![CDATA[";
    let content = &text[body.clone()];
    let lead = content.len() - content.trim_start().len();
    let Some(after) = content[lead..].strip_prefix(OPEN) else {
        return body;
    };

    let start = body.start + lead + OPEN.len();
    match after.trim_end().strip_suffix("]]>") {
        Some(inner) => start..start + inner.len(),
        None => start..body.end,
    }
}

fn script_is_js(text: &str, tag: &StartTag) -> bool {
    let script_type = tag
        .attributes
        .iter()
        .find(|a| text[a.name.clone()].eq_ignore_ascii_case("type"))
        .and_then(|a| a.value.clone());

    match script_type {
        None => true,
        Some(range) => {
            let value = text[range].trim().to_ascii_lowercase();
            JS_MIME_TYPES.contains(&value.as_str())
        }
    }
}

fn trim_ws(text: &str, range: Range<usize>) -> Range<usize> {
    let bytes = text.as_bytes();
    let mut start = range.start;
    let mut end = range.end;
    while start < end && is_ascii_ws(bytes[start]) {
        start += 1;
    }
    while end > start && is_ascii_ws(bytes[end - 1]) {
        end -= 1;
    }
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(html: &str) -> Vec<(String, Context)> {
        let mut out = FileScan::default();
        scan_into(html, &mut out);
        out.occurrences.sort_by_key(|o| o.span.start);
        out.occurrences
            .iter()
            .map(|o| (o.token(html).to_string(), o.context))
            .collect()
    }

    fn names(html: &str) -> Vec<String> {
        tokens(html).into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn class_and_id_attributes() {
        let html = r#"<div id="system-indicator" class="label-inactive">x</div>"#;
        assert_eq!(
            tokens(html),
            vec![
                ("system-indicator".to_string(), Context::HtmlIdAttr),
                ("label-inactive".to_string(), Context::HtmlClassAttr),
            ]
        );
    }

    #[test]
    fn multi_value_class_is_split() {
        assert_eq!(
            names(r#"<p class="  btn  btn-primary	active ">"#),
            vec!["btn", "btn-primary", "active"]
        );
    }

    #[test]
    fn other_attributes_and_text_are_ignored() {
        let html = r#"<img src="scripts/app.js" alt="label-inactive" data-class="x"><p>class="nope"</p>"#;
        assert!(names(html).is_empty());
    }

    #[test]
    fn unquoted_and_uppercase_attributes() {
        assert_eq!(names("<DIV CLASS=card ID = main>"), vec!["card", "main"]);
        assert_eq!(names("<input class='field' disabled/>"), vec!["field"]);
    }

    #[test]
    fn comments_doctype_and_end_tags_are_skipped() {
        let html = "<!DOCTYPE html>\n<!-- <div class=\"ghost\"> -->\n<span class=\"real\"></span>";
        assert_eq!(names(html), vec!["real"]);
    }

    #[test]
    fn embedded_style_and_script_are_scanned() {
        let html = "<style>.label-inactive { display: none; }</style>\n<script>document.getElementById('system-indicator');</script>";
        assert_eq!(
            tokens(html),
            vec![
                ("label-inactive".to_string(), Context::CssClassSelector),
                ("system-indicator".to_string(), Context::JsStringLiteral),
            ]
        );
    }

    #[test]
    fn non_js_script_types_are_skipped() {
        let html = "<script type=\"text/template\"><div class=\"tpl\"></div></script><script type=\"module\">el.classList.add('m');</script>";
        assert_eq!(names(html), vec!["m"]);
    }

    #[test]
    fn event_handler_attributes_are_scanned_as_script() {
        let html = r#"<button onclick="this.classList.toggle('is-open')">go</button>"#;
        assert_eq!(
            tokens(html),
            vec![("is-open".to_string(), Context::JsStringLiteral)]
        );
    }

    #[test]
    fn raw_text_elements_are_not_markup() {
        let html = "<title><b class=\"t\"></title><textarea><i class=\"u\"></textarea><em class=\"v\">";
        assert_eq!(names(html), vec!["v"]);
    }

    #[test]
    fn noscript_content_is_markup() {
        let html = r#"<noscript><p class="js-off-banner" id="no-js">Enable JS</p></noscript>"#;
        assert_eq!(
            tokens(html),
            vec![
                ("js-off-banner".to_string(), Context::HtmlClassAttr),
                ("no-js".to_string(), Context::HtmlIdAttr),
            ]
        );
    }

    #[test]
    fn cdata_wrapped_style_is_scanned() {
        let html = "<svg><style>\n<![CDATA[\n.icon-fill { fill: red; }\n]]>\n</style></svg>";
        let mut out = FileScan::default();
        scan_into(html, &mut out);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        let found: Vec<&str> = out.occurrences.iter().map(|o| o.token(html)).collect();
        assert_eq!(found, vec!["icon-fill"]);
    }

    #[test]
    fn strip_cdata_keeps_unwrapped_bodies() {
        let text = "<style>.a{}</style>";
        assert_eq!(strip_cdata(text, 7..11), 7..11);

        let text = "<style> <![CDATA[.a{}]]> </style>";
        assert_eq!(&text[strip_cdata(text, 7..25)], ".a{}");
    }

    #[test]
    fn class_attribute_values_are_recorded() {
        let html = r#"<p class=" ab  cd " id="x"></p>"#;
        let mut out = FileScan::default();
        scan_into(html, &mut out);
        assert_eq!(out.class_values.len(), 1);
        assert_eq!(&html[out.class_values[0].clone()], " ab  cd ");
    }

    #[test]
    fn unterminated_attribute_warns_and_stops() {
        let html = "<a class=\"ok\"></a>\n<div class=\"broken>\n<p>";
        let mut out = FileScan::default();
        scan_into(html, &mut out);
        assert_eq!(out.warnings.len(), 1);
        let found: Vec<&str> = out.occurrences.iter().map(|o| o.token(html)).collect();
        assert_eq!(found, vec!["ok"]);
    }

    #[test]
    fn unclosed_style_warns_and_scans_to_end() {
        let html = "<style>.a { color: red; }";
        let mut out = FileScan::default();
        scan_into(html, &mut out);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.occurrences.len(), 1);
    }
}
