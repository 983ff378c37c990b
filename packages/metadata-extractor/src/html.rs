//! Tolerant, DOM-free metadata parsing.
//!
//! Every helper here works on raw (possibly truncated or malformed) HTML text
//! and degrades to `None` instead of failing. Tags are located with regexes
//! and their attributes are read in any order, so `<meta content=.. property=..>`
//! and `<meta property=.. content=..>` are treated alike.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;
use url::Url;

lazy_static! {
    // A quoted value may contain `>` but never runs past the next `<`, so an
    // unterminated quote only degrades its own tag
    static ref META_TAG: Regex =
        Regex::new(r#"(?is)<meta\b((?:[^>"']|"[^"<]*"|'[^'<]*'|["'])*)>"#).unwrap();
    static ref LINK_TAG: Regex =
        Regex::new(r#"(?is)<link\b((?:[^>"']|"[^"<]*"|'[^'<]*'|["'])*)>"#).unwrap();
    static ref IMG_TAG: Regex =
        Regex::new(r#"(?is)<img\b((?:[^>"']|"[^"<]*"|'[^'<]*'|["'])*)>"#).unwrap();
    static ref TITLE_TAG: Regex = Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap();
    static ref ATTRIBUTE: Regex = Regex::new(
        r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#
    )
    .unwrap();
    static ref ENTITY: Regex = Regex::new(r"&(amp|lt|gt|quot|#39|apos|nbsp);").unwrap();
    static ref CHROME_IMAGE: Regex =
        Regex::new(r"(?i)icon|logo|favicon|sprite|button|badge|avatar|profile|thumb|small")
            .unwrap();
}

/// Decode the handful of entities that routinely appear in meta content.
///
/// Only `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&#39;`, `&apos;` and `&nbsp;` are
/// recognized; anything else is left untouched. Decoding is a single pass, so
/// `&amp;lt;` becomes `&lt;` rather than `<`.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let decoded = match &caps[1] {
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                "#39" | "apos" => "'",
                _ => " ",
            };
            decoded.to_string()
        })
        .into_owned()
}

/// Parse the attribute section of a tag into a lowercase-keyed map.
///
/// The first occurrence of a repeated attribute wins.
fn parse_attributes(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for caps in ATTRIBUTE.captures_iter(raw) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        attrs.entry(name).or_insert_with(|| value.to_string());
    }
    attrs
}

/// Decode and trim; blank values count as missing.
fn clean(value: &str) -> Option<String> {
    let decoded = decode_entities(value);
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Content of the first `<meta>` whose `property` or `name` equals `key`
/// (case-insensitive), in document order.
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    META_TAG.captures_iter(html).find_map(|caps| {
        let attrs = parse_attributes(&caps[1]);
        let matches_key = ["property", "name"].iter().any(|attr| {
            attrs
                .get(*attr)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(key))
        });
        if !matches_key {
            return None;
        }
        attrs.get("content").and_then(|c| clean(c))
    })
}

/// First non-blank value among `keys`, trying each key across the whole
/// document before moving to the next.
pub fn first_meta(html: &str, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| meta_content(html, key))
}

/// Text of the literal `<title>` element.
pub fn title_tag(html: &str) -> Option<String> {
    TITLE_TAG.captures(html).and_then(|caps| clean(&caps[1]))
}

/// `src` of the first `<img>` that looks like content rather than site chrome.
///
/// Skips `data:` URIs and any source mentioning icons, logos, sprites,
/// buttons, badges, avatars, profiles, thumbnails or "small".
pub fn first_content_image(html: &str) -> Option<String> {
    IMG_TAG.captures_iter(html).find_map(|caps| {
        let attrs = parse_attributes(&caps[1]);
        let src = attrs.get("src").and_then(|s| clean(s))?;
        if src.to_ascii_lowercase().starts_with("data:") || CHROME_IMAGE.is_match(&src) {
            return None;
        }
        Some(src)
    })
}

/// `href` of the first `<link rel="icon">` or `<link rel="shortcut icon">`.
pub fn icon_link(html: &str) -> Option<String> {
    LINK_TAG.captures_iter(html).find_map(|caps| {
        let attrs = parse_attributes(&caps[1]);
        let rel = attrs.get("rel")?.trim().to_ascii_lowercase();
        let rel = rel.split_whitespace().collect::<Vec<_>>().join(" ");
        if rel != "icon" && rel != "shortcut icon" {
            return None;
        }
        attrs.get("href").and_then(|h| clean(h))
    })
}

/// Resolve a possibly-relative reference against the page URL.
pub fn resolve(base: &Url, reference: &str) -> Option<String> {
    base.join(reference).ok().map(|u| u.to_string())
}

/// Parse the date formats publishers put in `article:published_time` and friends.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
