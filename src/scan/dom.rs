//! `<iframe>`, `<link rel="alternate">` and `<input>` extraction.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{extract_nested, Candidate, ScanContext};
use crate::classify::{is_stream_url, type_from_mime, type_from_url, StreamType};
use crate::record::provenance;

static IFRAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("iframe").expect("valid selector"));
static ALTERNATE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="alternate"]"#).expect("valid selector"));
static INPUT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input").expect("valid selector"));

/// Canonical watch / short link, even when wrapped in a redirector value.
static YOUTUBE_SHARE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://(?:www\.)?(?:youtu\.be/|youtube\.com/watch\?v=)[^\s&?]+)")
        .expect("youtube share regex is valid")
});

/// Iframe `src` (or `data-src`): checked directly, then always walked for nested URLs.
#[must_use]
pub fn scan_iframes(document: &Html, ctx: &ScanContext) -> Vec<Candidate> {
    let mut out = Vec::new();

    for iframe in document.select(&IFRAME) {
        let element = iframe.value();
        let reflected = element.attr("src").map(|raw| ctx.reflect(raw)).unwrap_or_default();
        let src = if reflected.is_empty() {
            match element.attr("data-src").filter(|v| !v.is_empty()) {
                Some(raw) => raw.to_string(),
                None => continue,
            }
        } else {
            reflected
        };

        if is_stream_url(&src) {
            out.push(Candidate::new(src.clone(), type_from_url(&src), provenance::IFRAME_SRC));
        }

        extract_nested(&src, provenance::IFRAME, ctx.max_nested_depth, &mut out);
    }

    out
}

/// `<link rel="alternate">` hrefs, with a MIME fallback.
#[must_use]
pub fn scan_links(document: &Html, ctx: &ScanContext) -> Vec<Candidate> {
    let mut out = Vec::new();

    for link in document.select(&ALTERNATE_LINK) {
        let href = link.value().attr("href").map(|raw| ctx.reflect(raw)).unwrap_or_default();
        if href.is_empty() {
            continue;
        }

        if is_stream_url(&href) {
            let stream_type = type_from_url(&href);
            out.push(Candidate::new(href, stream_type, provenance::LINK_TAG));
        } else if let Some(stream_type) = link.value().attr("type").and_then(type_from_mime) {
            out.push(Candidate::new(href, stream_type, provenance::LINK_TAG_MIME));
        }
    }

    out
}

/// Share-box inputs holding a YouTube link.
#[must_use]
pub fn scan_inputs(document: &Html) -> Vec<Candidate> {
    let mut out = Vec::new();

    for input in document.select(&INPUT) {
        let Some(value) = input.value().attr("value") else {
            continue;
        };
        if !(value.contains("youtu.be") || value.contains("youtube.com/watch")) {
            continue;
        }

        if let Some(m) = YOUTUBE_SHARE_REGEX.captures(value).and_then(|c| c.get(1)) {
            out.push(Candidate::new(m.as_str(), StreamType::Youtube, provenance::YOUTUBE_SHARE));
        } else if is_stream_url(value) {
            out.push(Candidate::new(value, StreamType::Youtube, provenance::YOUTUBE_SHARE_FALLBACK));
        }
    }

    out
}
