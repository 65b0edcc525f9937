//! Messages crossing the engine's context boundaries.
//!
//! ```text
//! Interceptor ──Envelope{PageMessage}──▶ PageScanner ──RuntimeMessage──▶ Aggregator
//!  (page context)    same document       (isolated)     privileged       (session)
//! ```
//!
//! Every type here serializes to the wire shape the browser side uses,
//! so the engine can sit behind a `postMessage` / `runtime.sendMessage`
//! bridge unchanged.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::classify::StreamType;
use crate::record::{DetectedStream, StoredStream};

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

/// Identity of one loaded document. A reload gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Allocate a process-unique document id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Interceptor → scanner notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PageMessage {
    /// An intercepted request whose target looks like a stream.
    Candidate {
        url: String,
        #[serde(rename = "type")]
        stream_type: StreamType,
    },
    /// A same-document navigation (history mutation or back/forward).
    NavigationChanged,
}

/// A [`PageMessage`] stamped with the document that posted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: DocumentId,
    pub message: PageMessage,
}

/// Requests on the privileged scanner ↔ aggregator channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMessage {
    StreamDetected { data: DetectedStream },
    GetStreams,
    ClearStreams,
    /// Per-page: the scanner's current Seen-Set.
    GetDetectedUrls,
    /// Per-page: empty the scanner's Seen-Set.
    ClearDetectedUrls,
}

/// Replies to [`RuntimeMessage`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeResponse {
    Streams { streams: Vec<StoredStream> },
    Urls { urls: Vec<String> },
    Ack { success: bool },
}

/// Broadcast by the aggregator after state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    StreamsUpdated { count: usize },
}
