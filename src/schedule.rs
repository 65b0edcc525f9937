//! Rescan scheduling.
//!
//! Mutation bursts, the periodic timer, URL polling and interceptor
//! navigation notices all feed one [`RescanScheduler`], which owns the
//! policy: trailing-edge debounce for mutations, a minimum gap between
//! scans, and immediate scans on navigation. [`ScanDriver`] is the event
//! loop that wires those producers to a [`PageScanner`].

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ScoutConfig;
use crate::message::Envelope;
use crate::record::truncate_for_log;
use crate::scan::PageSnapshot;
use crate::scanner::{Notification, PageScanner};

/// Elements whose `src`/`data-src` changes can reveal a new stream.
const WATCHED_ELEMENTS: &[&str] = &["video", "source", "script"];
const WATCHED_ATTRIBUTES: &[&str] = &["src", "data-src"];

/// One observed DOM mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// Nodes were inserted under some parent.
    ChildList { added_nodes: usize },
    /// An attribute changed on an element.
    Attributes { target: String, attribute: String },
}

/// Whether a batch of mutations warrants a (debounced) rescan.
#[must_use]
pub fn mutation_requires_rescan(records: &[MutationRecord]) -> bool {
    records.iter().any(|record| match record {
        MutationRecord::ChildList { added_nodes } => *added_nodes > 0,
        MutationRecord::Attributes { target, attribute } => {
            WATCHED_ELEMENTS.iter().any(|e| target.eq_ignore_ascii_case(e))
                && WATCHED_ATTRIBUTES.iter().any(|a| attribute.eq_ignore_ascii_case(a))
        }
    })
}

/// What asked for a rescan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Mutation,
    Interval,
    Navigation,
}

/// Debounce / minimum-gap policy.
#[derive(Debug, Clone)]
pub struct RescanScheduler {
    debounce: Duration,
    min_gap: Duration,
    deadline: Option<Instant>,
    last_scan: Option<Instant>,
}

impl RescanScheduler {
    #[must_use]
    pub fn new(debounce: Duration, min_gap: Duration) -> Self {
        Self {
            debounce,
            min_gap,
            deadline: None,
            last_scan: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self::new(config.debounce(), config.min_scan_gap())
    }

    /// Register a trigger. Returns `true` if a scan should run right now.
    ///
    /// Mutations never scan immediately; they (re)arm the debounce deadline.
    pub fn request(&mut self, trigger: Trigger, now: Instant) -> bool {
        match trigger {
            Trigger::Mutation => {
                self.deadline = Some(now + self.debounce);
                false
            }
            Trigger::Interval => !self.too_soon(now),
            Trigger::Navigation => true,
        }
    }

    /// Pending debounce deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the debounce deadline has passed and the gap allows a scan.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                if let Some(earliest) = self.earliest_next(now) {
                    self.deadline = Some(earliest);
                    return false;
                }
                true
            }
            _ => false,
        }
    }

    /// A scan ran at `now`; any pending deadline is satisfied.
    pub fn record_scan(&mut self, now: Instant) {
        self.last_scan = Some(now);
        self.deadline = None;
    }

    fn too_soon(&self, now: Instant) -> bool {
        self.earliest_next(now).is_some()
    }

    fn earliest_next(&self, now: Instant) -> Option<Instant> {
        let earliest = self.last_scan? + self.min_gap;
        (now < earliest).then_some(earliest)
    }
}

/// Read access to the live document a [`ScanDriver`] watches.
pub trait LiveDocument: Send {
    /// Serialize the current DOM.
    fn snapshot(&self) -> PageSnapshot;
    /// Current `location.href`.
    fn current_url(&self) -> String;
}

/// Event loop driving one page's scanner.
pub struct ScanDriver<D> {
    scanner: PageScanner,
    document: D,
    scheduler: RescanScheduler,
    poll_interval: Duration,
}

impl<D: LiveDocument> ScanDriver<D> {
    pub fn new(scanner: PageScanner, document: D, config: &ScoutConfig) -> Self {
        Self {
            scanner,
            document,
            scheduler: RescanScheduler::from_config(config),
            poll_interval: config.poll_interval(),
        }
    }

    /// Scan once, then keep rescanning until the mutation source closes.
    ///
    /// Returns the scanner so its Seen-Set can be inspected afterwards.
    pub async fn run(
        mut self,
        mut envelopes: UnboundedReceiver<Envelope>,
        mut mutations: UnboundedReceiver<Vec<MutationRecord>>,
    ) -> PageScanner {
        self.rescan(Instant::now());
        let mut last_url = self.document.current_url();

        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut envelopes_open = true;

        loop {
            let deadline = self.scheduler.deadline();

            tokio::select! {
                envelope = envelopes.recv(), if envelopes_open => match envelope {
                    Some(envelope) => {
                        if self.scanner.handle_envelope(envelope) == Notification::NavigationChanged {
                            last_url = self.document.current_url();
                            let now = Instant::now();
                            if self.scheduler.request(Trigger::Navigation, now) {
                                self.rescan(now);
                            }
                        }
                    }
                    None => envelopes_open = false,
                },
                batch = mutations.recv() => match batch {
                    Some(records) => {
                        if mutation_requires_rescan(&records) {
                            self.scheduler.request(Trigger::Mutation, Instant::now());
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let current = self.document.current_url();
                    if current != last_url {
                        info!("URL changed to {}", truncate_for_log(&current, 80));
                        last_url = current;
                        self.scanner.reset();
                        if self.scheduler.request(Trigger::Navigation, now) {
                            self.rescan(now);
                        }
                    } else if self.scheduler.request(Trigger::Interval, now) {
                        self.rescan(now);
                    }
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = Instant::now();
                    if self.scheduler.poll(now) {
                        self.rescan(now);
                    }
                },
            }
        }

        self.scanner
    }

    fn rescan(&mut self, now: Instant) {
        let page = self.document.snapshot();
        let found = self.scanner.scan(&page);
        self.scheduler.record_scan(now);
        debug!("Scan of {} found {} new streams", truncate_for_log(&page.url, 80), found.len());
    }
}
