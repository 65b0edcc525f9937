//! Detected stream records.
//!
//! A [`DetectedStream`] is what a page scanner emits; the aggregator
//! wraps it into a [`StoredStream`] with an id and the sender's tab.
//! Records are never mutated after creation.

use serde::{Deserialize, Serialize};

use crate::classify::StreamType;

/// Provenance tags identifying which extraction path produced a record.
///
/// Nested extraction appends `-nested`, `-param` or `-inner` to the tag of
/// the pass that started it (e.g. `iframe-inner-param`).
pub mod provenance {
    pub const NETWORK: &str = "network";
    pub const VIDEO_ELEMENT: &str = "video-element";
    pub const VIDEO_ELEMENT_MIME: &str = "video-element-mime";
    pub const VIDEO_ELEMENT_FALLBACK: &str = "video-element-fallback";
    pub const VIDEO_SOURCE: &str = "video-source";
    pub const VIDEO_SOURCE_MIME: &str = "video-source-mime";
    pub const VIDEO_DATA_SRC: &str = "video-data-src";
    pub const SCRIPT_CONTENT: &str = "script-content";
    pub const SCRIPT_NESTED: &str = "script-nested";
    pub const PLAYER_CONFIG: &str = "player-config";
    pub const IFRAME_SRC: &str = "iframe-src";
    pub const IFRAME: &str = "iframe";
    pub const LINK_TAG: &str = "link-tag";
    pub const LINK_TAG_MIME: &str = "link-tag-mime";
    pub const YOUTUBE_SHARE: &str = "youtube-share";
    pub const YOUTUBE_SHARE_FALLBACK: &str = "youtube-share-fallback";
}

/// A classified stream as emitted by a page scanner (no id yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedStream {
    /// Exact matched or resolved URL. Never empty.
    pub url: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    /// Provenance tag, see [`provenance`].
    pub source: String,
    /// Capture time, Unix epoch milliseconds.
    pub timestamp: i64,
    pub page_title: String,
    pub page_url: String,
}

/// Browser tab a record was reported from, when the transport knows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// A record as held by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredStream {
    pub id: String,
    #[serde(flatten)]
    pub stream: DetectedStream,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_url: Option<String>,
}

impl StoredStream {
    /// Assign a fresh id and stamp the sender's tab.
    #[must_use]
    pub fn new(stream: DetectedStream, tab: Option<&TabInfo>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stream,
            tab_id: tab.and_then(|t| t.id),
            tab_title: tab.and_then(|t| t.title.clone()),
            tab_url: tab.and_then(|t| t.url.clone()),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.stream.url
    }
}

/// Current time in Unix epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Shorten a URL for log lines.
#[must_use]
pub fn truncate_for_log(url: &str, max: usize) -> String {
    if url.chars().count() <= max {
        return url.to_string();
    }
    let head: String = url.chars().take(max).collect();
    format!("{head}...")
}
