//! Per-page scanner.
//!
//! Owns the Seen-Set for one document, turns [`Candidate`]s (from the DOM
//! passes or from the interceptor) into [`DetectedStream`] records and
//! forwards each new one through a [`RecordSink`].

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::classify::should_detect;
use crate::config::ScoutConfig;
use crate::error::Result;
use crate::interceptor::Interceptor;
use crate::message::{DocumentId, Envelope, PageMessage, RuntimeMessage, RuntimeResponse};
use crate::record::{now_millis, provenance, truncate_for_log, DetectedStream};
use crate::scan::{document_title, dom_pass, video_pass, Candidate, PageSnapshot, ScanContext};

/// Longest URL prefix written to log lines.
const LOG_URL_LEN: usize = 80;

/// Where forwarded records go (normally the session aggregator).
///
/// Sends are fire-and-forget: an error is logged by the scanner and the
/// scan carries on.
pub trait RecordSink: Send + Sync {
    /// Deliver one runtime message.
    ///
    /// # Errors
    ///
    /// Returns an error if the receiving side is gone.
    fn send(&self, message: RuntimeMessage) -> Result<()>;
}

/// Interceptor installation state of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Active,
}

/// What a handled interceptor notification amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Posted by another document; dropped.
    Ignored,
    /// A network candidate, with the record if it was new.
    Candidate(Option<DetectedStream>),
    /// Same-document navigation; the Seen-Set has been cleared.
    NavigationChanged,
}

/// Scanner for one loaded document.
pub struct PageScanner {
    document: DocumentId,
    page_url: String,
    page_host: String,
    page_title: String,
    state: InitState,
    seen: HashSet<String>,
    sink: Arc<dyn RecordSink>,
    max_nested_depth: usize,
}

impl PageScanner {
    pub fn new(page_url: impl Into<String>, sink: Arc<dyn RecordSink>, config: &ScoutConfig) -> Self {
        let page_url = page_url.into();
        Self {
            document: DocumentId::next(),
            page_host: host_of(&page_url),
            page_url,
            page_title: String::new(),
            state: InitState::Uninitialized,
            seen: HashSet::new(),
            sink,
            max_nested_depth: config.max_nested_depth,
        }
    }

    /// Install the page-context interceptor.
    ///
    /// Returns `None` if this page already has one.
    pub fn bootstrap(&mut self, tx: UnboundedSender<Envelope>) -> Option<Interceptor> {
        if self.state == InitState::Active {
            debug!("Interceptor already installed for {}", truncate_for_log(&self.page_url, LOG_URL_LEN));
            return None;
        }
        self.state = InitState::Active;
        Some(Interceptor::new(self.document, self.page_host.clone(), tx))
    }

    /// Run the video pass, then the DOM pass, forwarding every new record.
    pub fn scan(&mut self, page: &PageSnapshot) -> Vec<DetectedStream> {
        self.set_page_url(&page.url);

        let candidates = {
            let document = page.parse();
            let title = document_title(&document);
            if !title.is_empty() {
                self.page_title = title;
            }
            let ctx = ScanContext::new(&page.url, self.max_nested_depth);
            let mut candidates = video_pass(&document, &ctx);
            candidates.extend(dom_pass(&document, &ctx));
            candidates
        };

        candidates.into_iter().filter_map(|c| self.forward(c)).collect()
    }

    /// Dedup, filter, shape and forward one candidate.
    ///
    /// Returns the record if it was new on this page.
    pub fn forward(&mut self, candidate: Candidate) -> Option<DetectedStream> {
        if candidate.url.is_empty() {
            return None;
        }
        if self.seen.contains(&candidate.url) {
            debug!("Already seen: {}", truncate_for_log(&candidate.url, LOG_URL_LEN));
            return None;
        }
        if !should_detect(&self.page_host, candidate.stream_type) {
            debug!(
                "Suppressed {} on {}: {}",
                candidate.stream_type,
                self.page_host,
                truncate_for_log(&candidate.url, LOG_URL_LEN)
            );
            return None;
        }

        self.seen.insert(candidate.url.clone());
        let record = DetectedStream {
            url: candidate.url,
            stream_type: candidate.stream_type,
            source: candidate.source,
            timestamp: now_millis(),
            page_title: self.page_title.clone(),
            page_url: self.page_url.clone(),
        };

        info!(
            "Stream detected [{}] via {}: {}",
            record.stream_type,
            record.source,
            truncate_for_log(&record.url, LOG_URL_LEN)
        );
        if let Err(e) = self.sink.send(RuntimeMessage::StreamDetected { data: record.clone() }) {
            debug!("Record not delivered: {}", e);
        }

        Some(record)
    }

    /// Handle a notification from the page-context interceptor.
    pub fn handle_envelope(&mut self, envelope: Envelope) -> Notification {
        if envelope.origin != self.document {
            warn!("Ignoring page message from a foreign document");
            return Notification::Ignored;
        }

        match envelope.message {
            PageMessage::Candidate { url, stream_type } => {
                Notification::Candidate(self.forward(Candidate::new(url, stream_type, provenance::NETWORK)))
            }
            PageMessage::NavigationChanged => {
                self.reset();
                Notification::NavigationChanged
            }
        }
    }

    /// Same-document navigation: forget everything forwarded so far.
    pub fn reset(&mut self) {
        info!("Page navigated, clearing {} seen URLs", self.seen.len());
        self.seen.clear();
    }

    /// Answer the per-page popup queries; other actions are not ours.
    pub fn handle_runtime(&mut self, message: &RuntimeMessage) -> Option<RuntimeResponse> {
        match message {
            RuntimeMessage::GetDetectedUrls => Some(RuntimeResponse::Urls {
                urls: self.detected_urls(),
            }),
            RuntimeMessage::ClearDetectedUrls => {
                self.seen.clear();
                Some(RuntimeResponse::Ack { success: true })
            }
            _ => None,
        }
    }

    /// Seen-Set contents, sorted.
    #[must_use]
    pub fn detected_urls(&self) -> Vec<String> {
        let mut urls: Vec<_> = self.seen.iter().cloned().collect();
        urls.sort();
        urls
    }

    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.document
    }

    #[must_use]
    pub fn state(&self) -> InitState {
        self.state
    }

    #[must_use]
    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// Track the document's current address (SPA routes change it in place).
    pub fn set_page_url(&mut self, url: &str) {
        if self.page_url != url {
            self.page_url = url.to_string();
            self.page_host = host_of(url);
        }
    }
}

fn host_of(page_url: &str) -> String {
    url::Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::StreamType;
    use crate::error::ScoutError;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Collect(Mutex<Vec<RuntimeMessage>>);

    impl RecordSink for Collect {
        fn send(&self, message: RuntimeMessage) -> Result<()> {
            self.0.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct Closed;

    impl RecordSink for Closed {
        fn send(&self, _: RuntimeMessage) -> Result<()> {
            Err(ScoutError::ChannelClosed("test"))
        }
    }

    fn scanner(url: &str) -> (PageScanner, Arc<Collect>) {
        let sink = Arc::new(Collect::default());
        (PageScanner::new(url, sink.clone(), &ScoutConfig::default()), sink)
    }

    #[test]
    fn video_element_yields_one_record() {
        let (mut scanner, sink) = scanner("https://example.com/live");
        let page = PageSnapshot::new(
            "https://example.com/live",
            r#"<title>Live</title><video src="https://cdn.example.com/live/index.m3u8"></video>"#,
        );

        let found = scanner.scan(&page);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://cdn.example.com/live/index.m3u8");
        assert_eq!(found[0].stream_type, StreamType::Hls);
        assert_eq!(found[0].source, "video-element");
        assert_eq!(found[0].page_title, "Live");
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn same_url_is_forwarded_once() {
        let (mut scanner, sink) = scanner("https://example.com/");
        let c = Candidate::new("https://cdn.example.com/a.m3u8", StreamType::Hls, "network");
        assert!(scanner.forward(c.clone()).is_some());
        assert!(scanner.forward(c).is_none());
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn rescanning_unchanged_page_forwards_nothing() {
        let (mut scanner, _) = scanner("https://example.com/");
        let page = PageSnapshot::new("https://example.com/", r#"<video src="/a.mpd"></video>"#);
        assert_eq!(scanner.scan(&page).len(), 1);
        assert!(scanner.scan(&page).is_empty());
    }

    #[test]
    fn navigation_resets_seen_set() {
        let (mut scanner, _) = scanner("https://example.com/");
        let c = Candidate::new("https://cdn.example.com/a.m3u8", StreamType::Hls, "network");
        scanner.forward(c.clone());

        let envelope = Envelope {
            origin: scanner.document(),
            message: PageMessage::NavigationChanged,
        };
        assert_eq!(scanner.handle_envelope(envelope), Notification::NavigationChanged);
        assert!(scanner.forward(c).is_some());
    }

    #[test]
    fn youtube_page_keeps_only_watch_links() {
        let (mut scanner, _) = scanner("https://www.youtube.com/watch?v=abc");
        assert!(scanner
            .forward(Candidate::new("https://rr1.googlevideo.com/x.m3u8", StreamType::Hls, "network"))
            .is_none());
        assert!(scanner
            .forward(Candidate::new("https://youtu.be/abc", StreamType::Youtube, "youtube-share"))
            .is_some());
    }

    #[test]
    fn empty_urls_are_ignored() {
        let (mut scanner, _) = scanner("https://example.com/");
        assert!(scanner.forward(Candidate::new("", StreamType::Hls, "x")).is_none());
        assert!(scanner.detected_urls().is_empty());
    }

    #[test]
    fn foreign_envelopes_are_ignored() {
        let (mut scanner, sink) = scanner("https://example.com/");
        let envelope = Envelope {
            origin: DocumentId::next(),
            message: PageMessage::Candidate {
                url: "https://cdn.example.com/a.m3u8".to_string(),
                stream_type: StreamType::Hls,
            },
        };
        assert_eq!(scanner.handle_envelope(envelope), Notification::Ignored);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn bootstrap_installs_once() {
        let (mut scanner, _) = scanner("https://example.com/");
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(scanner.state(), InitState::Uninitialized);
        let icpt = scanner.bootstrap(tx.clone()).expect("first install");
        assert_eq!(icpt.origin(), scanner.document());
        assert_eq!(scanner.state(), InitState::Active);
        assert!(scanner.bootstrap(tx).is_none());
    }

    #[test]
    fn sink_failure_does_not_stop_detection() {
        let mut scanner = PageScanner::new("https://example.com/", Arc::new(Closed), &ScoutConfig::default());
        let rec = scanner.forward(Candidate::new("https://a.example.com/x.m3u8", StreamType::Hls, "network"));
        assert!(rec.is_some());
        assert_eq!(scanner.detected_urls(), vec!["https://a.example.com/x.m3u8"]);
    }

    #[test]
    fn popup_queries() {
        let (mut scanner, _) = scanner("https://example.com/");
        scanner.forward(Candidate::new("https://b.example.com/x.mpd", StreamType::Dash, "network"));
        scanner.forward(Candidate::new("https://a.example.com/x.m3u8", StreamType::Hls, "network"));

        assert_eq!(
            scanner.handle_runtime(&RuntimeMessage::GetDetectedUrls),
            Some(RuntimeResponse::Urls {
                urls: vec![
                    "https://a.example.com/x.m3u8".to_string(),
                    "https://b.example.com/x.mpd".to_string(),
                ]
            })
        );
        assert_eq!(
            scanner.handle_runtime(&RuntimeMessage::ClearDetectedUrls),
            Some(RuntimeResponse::Ack { success: true })
        );
        assert!(scanner.detected_urls().is_empty());
        assert_eq!(scanner.handle_runtime(&RuntimeMessage::GetStreams), None);
    }
}
