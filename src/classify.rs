//! Stream URL classification.
//!
//! Pure rule tables shared by the page-context [`Interceptor`](crate::interceptor::Interceptor)
//! and the isolated [`PageScanner`](crate::scanner::PageScanner). Both sides
//! link this one module, so the two execution contexts can never disagree
//! about what a stream looks like.
//!
//! ## Rule order for [`type_from_url`]
//!
//! 1. `youtu.be` / `youtube.com/watch` → [`StreamType::Youtube`]
//! 2. `.mpd` / `%2empd` → [`StreamType::Dash`]
//! 3. `.m3u8` / `%2em3u8` → [`StreamType::Hls`]
//! 4. `.m3u` / `%2em3u` → [`StreamType::M3u`]
//! 5. bare `m3u8` → [`StreamType::Hls`]
//! 6. bare `mpd` → [`StreamType::Dash`]
//! 7. anything else → [`StreamType::Unknown`]

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Absolute stream URLs inside arbitrary text.
///
/// Tolerates JSON-escaped schemes (`https:\/\/cdn…`) and requires a
/// manifest extension, followed by any trailer up to a quote, space or
/// angle bracket.
pub static STREAM_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?(?::|\\:)(?://|\\/\\/)[^\s"'<>]+?\.(?:m3u8|mpd|m3u)[^\s"'<>]*"#)
        .expect("stream URL regex is valid")
});

/// MIME types that announce an HLS playlist.
pub const HLS_MIME_TYPES: &[&str] = &["application/vnd.apple.mpegurl", "application/x-mpegurl"];

/// MIME types that announce a DASH manifest.
pub const DASH_MIME_TYPES: &[&str] = &["application/dash+xml"];

/// Substrings that mark a URL as stream-like on their own.
const STREAM_MARKERS: &[&str] = &[
    ".m3u8",
    ".mpd",
    ".m3u",
    "%2em3u8",
    "m3u8",
    "playlist",
    "manifest",
    "youtu.be",
    "youtube.com/watch",
];

/// Closed set of stream kinds a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamType {
    Hls,
    Dash,
    M3u,
    Youtube,
    Websocket,
    Video,
    Unknown,
}

impl StreamType {
    /// Wire name (`"HLS"`, `"DASH"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hls => "HLS",
            Self::Dash => "DASH",
            Self::M3u => "M3U",
            Self::Youtube => "YOUTUBE",
            Self::Websocket => "WEBSOCKET",
            Self::Video => "VIDEO",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returns `true` if the URL looks like a stream manifest or a YouTube watch link.
#[must_use]
pub fn is_stream_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    let lower = url.to_lowercase();
    STREAM_MARKERS.iter().any(|marker| lower.contains(marker)) || STREAM_URL_REGEX.is_match(url)
}

/// Returns `true` for `youtu.be/…` and `youtube.com/watch…` links.
#[must_use]
pub fn is_youtube_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("youtu.be") || lower.contains("youtube.com/watch")
}

/// Returns `true` for `ws://` and `wss://` targets.
#[must_use]
pub fn is_socket_url(url: &str) -> bool {
    let lower = url.trim_start().to_lowercase();
    lower.starts_with("ws://") || lower.starts_with("wss://")
}

/// Derive the stream type of a URL by ordered rule application.
#[must_use]
pub fn type_from_url(url: &str) -> StreamType {
    let lower = url.to_lowercase();

    if lower.contains("youtu.be") || lower.contains("youtube.com/watch") {
        return StreamType::Youtube;
    }
    if lower.contains(".mpd") || lower.contains("%2empd") {
        return StreamType::Dash;
    }
    if lower.contains(".m3u8") || lower.contains("%2em3u8") {
        return StreamType::Hls;
    }
    if lower.contains(".m3u") || lower.contains("%2em3u") {
        return StreamType::M3u;
    }

    // Extension-less hints
    if lower.contains("m3u8") {
        return StreamType::Hls;
    }
    if lower.contains("mpd") {
        return StreamType::Dash;
    }

    StreamType::Unknown
}

/// Map a `type="…"` attribute to a stream type, if it names HLS or DASH.
///
/// Comparison ignores case and any `; codecs=…` parameters.
#[must_use]
pub fn type_from_mime(mime: &str) -> Option<StreamType> {
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_lowercase();

    if HLS_MIME_TYPES.contains(&essence.as_str()) {
        Some(StreamType::Hls)
    } else if DASH_MIME_TYPES.contains(&essence.as_str()) {
        Some(StreamType::Dash)
    } else {
        None
    }
}

/// YouTube-page suppression.
///
/// On a `youtube.com` page only explicit watch links are kept; the
/// player's own manifest traffic is noise.
#[must_use]
pub fn should_detect(page_host: &str, stream_type: StreamType) -> bool {
    !(page_host.contains("youtube.com") && stream_type != StreamType::Youtube)
}

/// Strip JS/JSON string escapes (`https:\/\/a\/b` → `https://a/b`).
#[must_use]
pub fn unescape_url(url: &str) -> String {
    url.replace('\\', "")
}

/// All stream URL matches in `text`, in document order.
pub fn find_stream_urls(text: &str) -> impl Iterator<Item = &str> {
    STREAM_URL_REGEX.find_iter(text).map(|m| m.as_str())
}
