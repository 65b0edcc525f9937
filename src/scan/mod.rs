//! DOM extraction passes.
//!
//! Each pass reads a parsed [`PageSnapshot`] and yields [`Candidate`]s in
//! document order. Passes are pure: deduplication, YouTube-page
//! suppression and forwarding belong to the
//! [`PageScanner`](crate::scanner::PageScanner).
//!
//! | Pass | Elements | Provenance |
//! |------|----------|------------|
//! | [`video_pass`] | `<video>`, nested `<source>` | `video-*` |
//! | [`dom_pass`] | `<script>`, `<iframe>`, `<link rel=alternate>`, `<input>` | `script-*`, `player-config`, `iframe*`, `link-tag*`, `youtube-share*` |
//!
//! # Example
//!
//! ```rust
//! use streamscout::scan::{video_pass, PageSnapshot, ScanContext};
//!
//! let page = PageSnapshot::new(
//!     "https://example.com/live",
//!     r#"<video src="/hls/index.m3u8"></video>"#,
//! );
//! let ctx = ScanContext::new(&page.url, 8);
//! let found = video_pass(&page.parse(), &ctx);
//! assert_eq!(found[0].url, "https://example.com/hls/index.m3u8");
//! ```

pub mod dom;
pub mod nested;
pub mod script;
pub mod video;

use scraper::{Html, Selector};
use url::Url;

use crate::classify::StreamType;
use crate::error::Result;

pub use dom::{scan_iframes, scan_inputs, scan_links};
pub use nested::extract_nested;
pub use script::{scan_script_text, scan_scripts};
pub use video::scan_video_elements;

/// An extracted, classified, not-yet-deduplicated URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub stream_type: StreamType,
    pub source: String,
}

impl Candidate {
    pub fn new(url: impl Into<String>, stream_type: StreamType, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream_type,
            source: source.into(),
        }
    }
}

/// Markup of the hosting document at one instant, plus its address.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// `location.href` at capture time.
    pub url: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Parse the markup. The result is not `Send`; keep it inside one sync scope.
    #[must_use]
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Inputs shared by every pass of one scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// Base URL for resolving relative `src`/`href` values.
    pub base: Option<Url>,
    /// Recursion cap for [`extract_nested`].
    pub max_nested_depth: usize,
}

impl ScanContext {
    #[must_use]
    pub fn new(page_url: &str, max_nested_depth: usize) -> Self {
        Self {
            base: Url::parse(page_url).ok(),
            max_nested_depth,
        }
    }

    /// Reflect an attribute the way the DOM's `src`/`href` properties do:
    /// resolved against the document when possible, raw otherwise.
    #[must_use]
    pub fn reflect(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.is_empty() {
            return String::new();
        }
        self.resolve(raw).unwrap_or_else(|_| raw.to_string())
    }

    /// Strictly resolve `raw` against the base (`new URL(raw, location.href)`).
    pub fn resolve(&self, raw: &str) -> Result<String> {
        let url = match &self.base {
            Some(base) => base.join(raw)?,
            None => Url::parse(raw)?,
        };
        Ok(url.into())
    }
}

/// `document.title`, whitespace-collapsed.
#[must_use]
pub fn document_title(document: &Html) -> String {
    static TITLE: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| Selector::parse("title").expect("valid selector"));

    document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Video pass: `<video>` elements and their `<source>` children.
#[must_use]
pub fn video_pass(document: &Html, ctx: &ScanContext) -> Vec<Candidate> {
    scan_video_elements(document, ctx)
}

/// DOM pass: scripts, then iframes, `rel=alternate` links and inputs.
#[must_use]
pub fn dom_pass(document: &Html, ctx: &ScanContext) -> Vec<Candidate> {
    let mut out = scan_scripts(document, ctx);
    out.extend(scan_iframes(document, ctx));
    out.extend(scan_links(document, ctx));
    out.extend(scan_inputs(document));
    out
}
