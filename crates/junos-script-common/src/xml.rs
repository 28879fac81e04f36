//! Just enough XML for the NETCONF boundary.
//!
//! Replies are requested as JSON wherever Junos allows it, so XML handling
//! is limited to escaping outgoing text, unescaping incoming text and
//! pulling the text of a few well-known elements out of envelopes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

/// Compiled element patterns, keyed by tag.
static TAG_REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn tag_regex(tag: &str) -> Option<Regex> {
    let mut cache = TAG_REGEX_CACHE.lock();
    if let Some(re) = cache.get(tag) {
        return Some(re.clone());
    }
    let pattern = format!(
        r"(?s)<(?:[A-Za-z0-9_-]+:)?{tag}(?:\s[^>]*)?>(.*?)</(?:[A-Za-z0-9_-]+:)?{tag}\s*>",
        tag = regex::escape(tag)
    );
    let re = Regex::new(&pattern).ok()?;
    cache.insert(tag.to_string(), re.clone());
    Some(re)
}

/// Escapes the five predefined XML entities.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses [`escape`]. Unknown entities are left untouched.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Returns the raw (still escaped) content of every `<tag>` element in
/// `document`, in document order. Namespace prefixes on the tag are accepted.
pub fn element_contents(document: &str, tag: &str) -> Vec<String> {
    match tag_regex(tag) {
        Some(re) => re
            .captures_iter(document)
            .map(|caps| caps[1].trim().to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Like [`element_contents`], with entities unescaped.
pub fn element_texts(document: &str, tag: &str) -> Vec<String> {
    element_contents(document, tag)
        .iter()
        .map(|content| unescape(content))
        .collect()
}

/// Returns the text of the first `<tag>` element, if any.
pub fn element_text(document: &str, tag: &str) -> Option<String> {
    element_texts(document, tag).into_iter().next()
}
