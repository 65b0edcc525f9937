//! Session-wide aggregation.
//!
//! One [`Aggregator`] per session receives records from every page's
//! scanner, enforces cross-page uniqueness by URL, keeps the newest
//! `store_capacity` records and broadcasts `STREAMS_UPDATED` after each
//! insert.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::companion::{Delivery, DeliveryPayload};
use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::message::{RuntimeMessage, RuntimeResponse, SessionEvent};
use crate::record::{truncate_for_log, DetectedStream, StoredStream, TabInfo};
use crate::scanner::RecordSink;

const EVENT_CAPACITY: usize = 64;

/// Capacity-bounded, newest-first record store with URL uniqueness.
#[derive(Debug, Clone)]
pub struct SessionStore {
    records: VecDeque<StoredStream>,
    capacity: usize,
}

impl SessionStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Check-then-insert. Returns `false` if the URL is already stored
    /// or the store has no capacity.
    ///
    /// When full, the oldest record is evicted.
    pub fn insert(&mut self, record: StoredStream) -> bool {
        if self.capacity == 0 || self.contains(record.url()) {
            return false;
        }
        self.records.push_front(record);
        self.records.truncate(self.capacity);
        true
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.records.iter().any(|r| r.url() == url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records, newest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<StoredStream> {
        self.records.iter().cloned().collect()
    }
}

/// Session aggregator. Cheap to clone; clones share one store.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<RwLock<SessionStore>>,
    events: broadcast::Sender<SessionEvent>,
    delivery: Option<Arc<dyn Delivery>>,
    auto_send: bool,
}

impl Aggregator {
    #[must_use]
    pub fn new(config: &ScoutConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Arc::new(RwLock::new(SessionStore::new(config.store_capacity))),
            events,
            delivery: None,
            auto_send: config.auto_send,
        }
    }

    /// Attach the companion delivery used when auto-send is on.
    #[must_use]
    pub fn with_delivery(mut self, delivery: Arc<dyn Delivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// `STREAMS_UPDATED` notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Store a record reported from `tab`.
    ///
    /// Returns the stored record, or `None` if another page already
    /// reported the same URL or the store has zero capacity.
    pub async fn record(&self, stream: DetectedStream, tab: Option<&TabInfo>) -> Option<StoredStream> {
        let stored = StoredStream::new(stream, tab);

        let count = {
            let mut store = self.store.write().await;
            if !store.insert(stored.clone()) {
                debug!("Not stored (duplicate or zero capacity): {}", truncate_for_log(stored.url(), 80));
                return None;
            }
            store.len()
        };

        info!(
            "Stored {} stream ({} total): {}",
            stored.stream.stream_type,
            count,
            truncate_for_log(stored.url(), 80)
        );

        // No subscribers is fine
        let _ = self.events.send(SessionEvent::StreamsUpdated { count });

        if self.auto_send {
            self.auto_deliver(&stored.stream);
        }

        Some(stored)
    }

    /// Fire-and-forget: the delivery runs on its own task.
    fn auto_deliver(&self, stream: &DetectedStream) {
        let Some(delivery) = &self.delivery else {
            debug!("Auto-send enabled without a delivery target");
            return;
        };
        let delivery = Arc::clone(delivery);
        let payload = DeliveryPayload::from(stream);
        tokio::spawn(async move {
            if let Err(e) = delivery.deliver(&payload).await {
                warn!("Auto-send failed, saved for later: {}", e);
            }
        });
    }

    /// All stored records, newest first.
    pub async fn streams(&self) -> Vec<StoredStream> {
        self.store.read().await.to_vec()
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
        info!("Session streams cleared");
    }

    /// Answer one runtime message.
    pub async fn handle(&self, message: RuntimeMessage, tab: Option<&TabInfo>) -> RuntimeResponse {
        match message {
            RuntimeMessage::StreamDetected { data } => {
                self.record(data, tab).await;
                RuntimeResponse::Ack { success: true }
            }
            RuntimeMessage::GetStreams => RuntimeResponse::Streams {
                streams: self.streams().await,
            },
            RuntimeMessage::ClearStreams => {
                self.clear().await;
                RuntimeResponse::Ack { success: true }
            }
            // Per-page queries are answered by the page's scanner
            RuntimeMessage::GetDetectedUrls | RuntimeMessage::ClearDetectedUrls => {
                RuntimeResponse::Ack { success: false }
            }
        }
    }

    /// Process requests until every sender is dropped.
    pub async fn serve(&self, mut requests: mpsc::UnboundedReceiver<SessionRequest>) {
        while let Some(request) = requests.recv().await {
            let response = self.handle(request.message, request.tab.as_ref()).await;
            if let Some(reply) = request.reply {
                let _ = reply.send(response);
            }
        }
        debug!("All senders closed, aggregator stopping");
    }
}

/// One message on the privileged channel, with the sender's tab.
#[derive(Debug)]
pub struct SessionRequest {
    pub message: RuntimeMessage,
    pub tab: Option<TabInfo>,
    /// Set when the sender waits for an answer.
    pub reply: Option<oneshot::Sender<RuntimeResponse>>,
}

/// Scanner-side [`RecordSink`] over the aggregator's request channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionRequest>,
    tab: Option<TabInfo>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<SessionRequest>, tab: Option<TabInfo>) -> Self {
        Self { tx, tab }
    }
}

impl RecordSink for ChannelSink {
    fn send(&self, message: RuntimeMessage) -> Result<()> {
        self.tx
            .send(SessionRequest {
                message,
                tab: self.tab.clone(),
                reply: None,
            })
            .map_err(|_| ScoutError::ChannelClosed("aggregator"))
    }
}
