//! `StreamScout` - streaming manifest detection engine
//!
//! Finds HLS, DASH, M3U and YouTube watch URLs in a live page, classifies
//! them, and forwards each unique discovery exactly once.
//!
//! # Components
//!
//! - **Interceptor**: wraps XHR / fetch / `WebSocket` and history mutators
//!   inside the page and posts stream-looking targets to the scanner
//! - **Scanner**: per-page DOM passes (video, scripts, iframes, links,
//!   inputs, nested/encoded URLs), Seen-Set dedup, YouTube-page suppression
//! - **Aggregator**: session-wide store (newest 100, unique by URL) with
//!   optional delivery to the companion app
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use streamscout::{Aggregator, ChannelSink, PageScanner, PageSnapshot, ScoutConfig};
//!
//! # tokio_test::block_on(async {
//! let config = ScoutConfig::default();
//! let aggregator = Aggregator::new(&config);
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let server = tokio::spawn({
//!     let aggregator = aggregator.clone();
//!     async move { aggregator.serve(rx).await }
//! });
//!
//! let mut scanner = PageScanner::new(
//!     "https://example.com/live",
//!     Arc::new(ChannelSink::new(tx, None)),
//!     &config,
//! );
//! let page = PageSnapshot::new(
//!     "https://example.com/live",
//!     r#"<video src="https://cdn.example.com/live/index.m3u8"></video>"#,
//! );
//! let found = scanner.scan(&page);
//! assert_eq!(found[0].source, "video-element");
//!
//! drop(scanner);
//! server.await.unwrap();
//! assert_eq!(aggregator.streams().await.len(), 1);
//! # });
//! ```

pub mod aggregator;
pub mod classify;
pub mod companion;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod message;
pub mod record;
pub mod scan;
pub mod scanner;
pub mod schedule;

pub use aggregator::{Aggregator, ChannelSink, SessionRequest, SessionStore};
pub use classify::{is_stream_url, should_detect, type_from_url, StreamType};
pub use companion::{CompanionClient, Delivery, DeliveryPayload};
pub use config::{load_config, ScoutConfig};
pub use error::{Result, ScoutError};
pub use interceptor::{FetchInput, Interceptor, XhrState};
pub use message::{DocumentId, Envelope, PageMessage, RuntimeMessage, RuntimeResponse, SessionEvent};
pub use record::{DetectedStream, StoredStream, TabInfo};
pub use scan::{Candidate, PageSnapshot, ScanContext};
pub use scanner::{InitState, Notification, PageScanner, RecordSink};
pub use schedule::{LiveDocument, MutationRecord, RescanScheduler, ScanDriver, Trigger};

/// Version of streamscout
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
