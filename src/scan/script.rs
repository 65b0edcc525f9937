//! Inline `<script>` extraction.
//!
//! Two sweeps over each script body:
//!
//! 1. **URL sweep**: every absolute stream URL (JSON-escaped or not) is
//!    unescaped, resolved against the page and then fed to
//!    [`extract_nested`] in case it is a proxy wrapping another manifest.
//! 2. **Player config sweep**: `source|url|file|playlist: "…"` pairs as
//!    found in Aliplayer / JW Player / Video.js setup objects.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;

use super::{extract_nested, Candidate, ScanContext};
use crate::classify::{find_stream_urls, is_stream_url, type_from_url, unescape_url};
use crate::record::provenance;

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").expect("valid selector"));

/// `source: "…"`, `"url": '…'`, … with bare or matched-quote keys.
///
/// The key must be a whole token, so `"data-url"` or `videoUrl` never match.
static PLAYER_CONFIG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:^|[\s{,])(?:"(?:source|url|file|playlist)"|'(?:source|url|file|playlist)'|(?:source|url|file|playlist))\s*:\s*["']([^"']+)["']"#,
    )
    .expect("player config regex is valid")
});

/// Scan all inline script bodies.
#[must_use]
pub fn scan_scripts(document: &Html, ctx: &ScanContext) -> Vec<Candidate> {
    let mut out = Vec::new();

    for script in document.select(&SCRIPT) {
        let content = script.text().collect::<String>();
        if content.is_empty() {
            continue;
        }
        scan_script_text(&content, ctx, &mut out);
    }

    out
}

/// Run both sweeps over one script body.
pub fn scan_script_text(content: &str, ctx: &ScanContext, out: &mut Vec<Candidate>) {
    for matched in find_stream_urls(content) {
        let url = unescape_url(matched);
        match ctx.resolve(&url) {
            Ok(resolved) => {
                out.push(Candidate::new(
                    resolved.clone(),
                    type_from_url(&resolved),
                    provenance::SCRIPT_CONTENT,
                ));
                extract_nested(&resolved, provenance::SCRIPT_NESTED, ctx.max_nested_depth, out);
            }
            Err(e) => trace!("Skipping unresolvable script URL {}: {}", url, e),
        }
    }

    let mentions_player = content.contains("Player");
    for caps in PLAYER_CONFIG_REGEX.captures_iter(content) {
        let Some(value) = caps.get(1) else { continue };
        let url = unescape_url(value.as_str());
        if url.contains("://") && (mentions_player || is_stream_url(&url)) {
            let stream_type = type_from_url(&url);
            out.push(Candidate::new(url, stream_type, provenance::PLAYER_CONFIG));
        }
    }
}
