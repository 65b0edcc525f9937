//! Page-context request interceptor.
//!
//! Wraps the page's request primitives (`XMLHttpRequest`, `fetch`,
//! `WebSocket`) and history mutators. Each wrapper inspects its target,
//! posts a [`PageMessage`] when the target looks like a stream, then runs
//! the original primitive and hands back its return value untouched.
//!
//! Inspection is a side channel: a panic inside it is caught and logged,
//! a closed scanner channel is ignored, and the original call always runs.
//!
//! An `Interceptor` is only obtainable from
//! [`PageScanner::bootstrap`](crate::scanner::PageScanner::bootstrap), which
//! hands one out at most once per page.

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use crate::classify::{is_socket_url, is_stream_url, should_detect, type_from_url, StreamType};
use crate::message::{DocumentId, Envelope, PageMessage};

/// First argument of a `fetch()` call.
#[derive(Debug, Clone)]
pub enum FetchInput {
    /// `fetch("https://…")`
    Url(String),
    /// `fetch(new Request(…))`; only the `url` field is read.
    Request { url: String },
    /// `fetch(new URL(…))`
    Parsed(url::Url),
}

impl FetchInput {
    /// The request target, as the page would stringify it.
    #[must_use]
    pub fn target(&self) -> Cow<'_, str> {
        match self {
            Self::Url(url) | Self::Request { url } => Cow::Borrowed(url.as_str()),
            Self::Parsed(url) => Cow::Borrowed(url.as_str()),
        }
    }
}

/// Per-object XHR state: the URL recorded by `open()` for `send()`.
#[derive(Debug, Clone, Default)]
pub struct XhrState {
    url: Option<String>,
}

/// Installed interceptor for one document.
#[derive(Debug, Clone)]
pub struct Interceptor {
    origin: DocumentId,
    page_host: String,
    tx: UnboundedSender<Envelope>,
}

impl Interceptor {
    pub(crate) fn new(origin: DocumentId, page_host: String, tx: UnboundedSender<Envelope>) -> Self {
        Self {
            origin,
            page_host,
            tx,
        }
    }

    /// Document this interceptor reports for.
    #[must_use]
    pub fn origin(&self) -> DocumentId {
        self.origin
    }

    /// Wrapped `XMLHttpRequest.prototype.open`: remembers the URL.
    pub fn xhr_open<T>(&self, xhr: &mut XhrState, url: &str, original: impl FnOnce() -> T) -> T {
        xhr.url = Some(url.to_string());
        original()
    }

    /// Wrapped `XMLHttpRequest.prototype.send`: inspects the URL from `open()`.
    pub fn xhr_send<T>(&self, xhr: &XhrState, original: impl FnOnce() -> T) -> T {
        if let Some(url) = xhr.url.as_deref() {
            self.guarded("xhr", || self.report(url, None));
        }
        original()
    }

    /// Wrapped `window.fetch`.
    pub fn fetch<T>(&self, input: &FetchInput, original: impl FnOnce() -> T) -> T {
        self.guarded("fetch", || self.report(&input.target(), None));
        original()
    }

    /// Wrapped `WebSocket` constructor.
    ///
    /// Only stream-looking targets are reported, always as
    /// [`StreamType::Websocket`]. Chat or reload sockets stay silent.
    pub fn websocket<T>(&self, url: &str, original: impl FnOnce() -> T) -> T {
        self.guarded("websocket", || {
            if is_stream_url(url) {
                self.report(url, Some(StreamType::Websocket));
            }
        });
        original()
    }

    /// Wrapped `history.pushState`.
    pub fn push_state<T>(&self, original: impl FnOnce() -> T) -> T {
        let result = original();
        self.post(PageMessage::NavigationChanged);
        result
    }

    /// Wrapped `history.replaceState`.
    pub fn replace_state<T>(&self, original: impl FnOnce() -> T) -> T {
        let result = original();
        self.post(PageMessage::NavigationChanged);
        result
    }

    /// `popstate` listener.
    pub fn pop_state(&self) {
        self.post(PageMessage::NavigationChanged);
    }

    fn report(&self, url: &str, forced: Option<StreamType>) {
        let stream_type = if is_socket_url(url) {
            StreamType::Websocket
        } else if is_stream_url(url) {
            forced.unwrap_or_else(|| type_from_url(url))
        } else {
            return;
        };

        if !should_detect(&self.page_host, stream_type) {
            trace!("Suppressed {} request on {}: {}", stream_type, self.page_host, url);
            return;
        }

        self.post(PageMessage::Candidate {
            url: url.to_string(),
            stream_type,
        });
    }

    fn post(&self, message: PageMessage) {
        let envelope = Envelope {
            origin: self.origin,
            message,
        };
        if self.tx.send(envelope).is_err() {
            debug!("Scanner channel closed, dropping page notification");
        }
    }

    fn guarded(&self, primitive: &'static str, inspect: impl FnOnce()) {
        if catch_unwind(AssertUnwindSafe(inspect)).is_err() {
            warn!("Inspection of {} call panicked; original call proceeds", primitive);
        }
    }
}
