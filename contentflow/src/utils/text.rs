//! Text helpers shared by sources, stages and publishers.

use md5::{Digest, Md5};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static BLOCK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
        .expect("block tag pattern is valid")
});

#[allow(clippy::expect_used)]
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag pattern is valid"));

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("whitespace pattern is valid"));

#[allow(clippy::expect_used)]
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("blank line pattern is valid"));

/// Converts a title into a URL slug.
///
/// ```
/// use contentflow::utils::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Removes markup, scripts and styles, leaving readable text.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    let without_blocks = BLOCK_TAGS.replace_all(html, " ");
    let with_breaks = without_blocks
        .replace("</p>", "\n\n")
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    let text = ANY_TAG.replace_all(&with_breaks, "");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let collapsed = WHITESPACE.replace_all(&decoded, " ");
    BLANK_LINES.replace_all(&collapsed, "\n\n").trim().to_string()
}

/// Truncates to at most `max` characters, never splitting a code point.
#[must_use]
pub fn truncate_chars(input: &str, max: usize) -> &str {
    match input.char_indices().nth(max) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Returns true if the identifier is an absolute URL with a host.
#[must_use]
pub fn is_url(identifier: &str) -> bool {
    reqwest::Url::parse(identifier.trim()).is_ok_and(|url| url.has_host())
}

/// Hex MD5 digest, used for short stable identity keys.
#[must_use]
pub fn identity_hash(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}
