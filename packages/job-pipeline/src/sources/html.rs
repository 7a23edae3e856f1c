//! Regex-based HTML helpers: link discovery, title, text rendering.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

lazy_static! {
    static ref HREF_REGEX: Regex = Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).unwrap();
    static ref TITLE_REGEX: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    static ref SCRIPT_REGEX: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref STYLE_REGEX: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref COMMENT_REGEX: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref HEADING_REGEX: Regex = Regex::new(r"(?is)<h[1-6][^>]*>(.*?)</h[1-6]>").unwrap();
    static ref BLOCK_END_REGEX: Regex =
        Regex::new(r"(?i)</(p|div|section|article|ul|ol|tr|table)>").unwrap();
    static ref BR_REGEX: Regex = Regex::new(r"(?i)<br\s*/?>").unwrap();
    static ref LI_REGEX: Regex = Regex::new(r"(?is)<li[^>]*>(.*?)</li>").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref SPACES_REGEX: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref MULTI_NEWLINE_REGEX: Regex = Regex::new(r"\n\s*\n(\s*\n)+").unwrap();
}

/// Extract absolute links from `html`, resolved against `base`.
///
/// Anchors, `javascript:`, `mailto:` and `tel:` links are skipped. When
/// `pattern` is given only links whose absolute form matches are kept.
/// Order of first appearance is preserved and duplicates removed.
pub fn extract_links(base: &Url, html: &str, pattern: Option<&Regex>) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in HREF_REGEX.captures_iter(html) {
        let Some(href) = cap.get(1) else { continue };
        let href = decode_entities(href.as_str().trim());

        if href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let Ok(mut resolved) = base.join(&href) else {
            continue;
        };
        resolved.set_fragment(None);

        if let Some(pattern) = pattern {
            if !pattern.is_match(resolved.as_str()) {
                continue;
            }
        }

        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
    }

    links
}

/// Extract the `<title>` text.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_REGEX
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|t| !t.is_empty())
}

/// Render HTML as readable plain text.
pub fn html_to_text(html: &str) -> String {
    let mut text = SCRIPT_REGEX.replace_all(html, "").into_owned();
    text = STYLE_REGEX.replace_all(&text, "").into_owned();
    text = COMMENT_REGEX.replace_all(&text, "").into_owned();

    text = HEADING_REGEX.replace_all(&text, "\n$1\n").into_owned();
    text = LI_REGEX.replace_all(&text, "\n- $1").into_owned();
    text = BR_REGEX.replace_all(&text, "\n").into_owned();
    text = BLOCK_END_REGEX.replace_all(&text, "\n\n").into_owned();
    text = TAG_REGEX.replace_all(&text, "").into_owned();

    text = decode_entities(&text);
    text = SPACES_REGEX.replace_all(&text, " ").into_owned();

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let text = lines.join("\n");
    MULTI_NEWLINE_REGEX
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
