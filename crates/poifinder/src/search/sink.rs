//! The streaming result protocol.
//!
//! A run reports through a [`ResultSink`]: one `update` per resolved hit, in response
//! order, then exactly one terminal event. Hooks are invoked synchronously from the task
//! executing the run; a consumer that owns a UI thread must hop back onto it itself.
//! [`ChannelSink`] does that hop for the common case by turning the hooks into
//! [`SearchEvent`]s on a channel.

use std::fmt;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::record::SearchRecord;

/// A per-hit failure that was recovered locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// The geolocation lookup failed; the record carries no location.
    LocationUnavailable(String),
    /// The image fetch or decode failed; the record carries the placeholder.
    PlaceholderImage(String),
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocationUnavailable(reason) => write!(f, "location unavailable: {reason}"),
            Self::PlaceholderImage(reason) => write!(f, "placeholder image: {reason}"),
        }
    }
}

/// Consumer of a search run's events.
///
/// Exactly one of `complete`, `fail` or `cancelled` ends every run, and nothing follows it.
pub trait ResultSink: Send {
    /// A hit finished enriching. Fired in response order.
    fn update(&mut self, record: SearchRecord);

    /// Every hit was delivered; `records` are exactly the updated records, in order.
    fn complete(&mut self, records: Vec<SearchRecord>);

    /// The initial search failed. No update was delivered for this run.
    fn fail(&mut self, reason: String);

    /// The run was cancelled before all hits were enriched. `records` are the updates
    /// delivered so far. Only fires if cancellation was requested.
    fn cancelled(&mut self, records: Vec<SearchRecord>) {
        let _ = records;
    }

    /// Diagnostic for a recovered per-hit failure, fired before that hit's `update`.
    fn degraded(&mut self, photo_id: &str, degradation: Degradation) {
        let _ = (photo_id, degradation);
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn update(&mut self, record: SearchRecord) {
        (**self).update(record);
    }

    fn complete(&mut self, records: Vec<SearchRecord>) {
        (**self).complete(records);
    }

    fn fail(&mut self, reason: String) {
        (**self).fail(reason);
    }

    fn cancelled(&mut self, records: Vec<SearchRecord>) {
        (**self).cancelled(records);
    }

    fn degraded(&mut self, photo_id: &str, degradation: Degradation) {
        (**self).degraded(photo_id, degradation);
    }
}

/// The sink hooks as a single tagged event.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Update(SearchRecord),
    Complete(Vec<SearchRecord>),
    Fail(String),
    Cancelled(Vec<SearchRecord>),
    Degraded {
        photo_id: String,
        degradation: Degradation,
    },
}

impl SearchEvent {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Fail(_) | Self::Cancelled(_))
    }
}

/// Forwards every hook into an unbounded channel.
///
/// A dropped receiver is not an error: the run carries on and its events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<SearchEvent>,
}

impl ChannelSink {
    pub const fn new(tx: UnboundedSender<SearchEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: SearchEvent) {
        if self.tx.send(event).is_err() {
            debug!("Search event receiver dropped, discarding event");
        }
    }
}

impl ResultSink for ChannelSink {
    fn update(&mut self, record: SearchRecord) {
        self.send(SearchEvent::Update(record));
    }

    fn complete(&mut self, records: Vec<SearchRecord>) {
        self.send(SearchEvent::Complete(records));
    }

    fn fail(&mut self, reason: String) {
        self.send(SearchEvent::Fail(reason));
    }

    fn cancelled(&mut self, records: Vec<SearchRecord>) {
        self.send(SearchEvent::Cancelled(records));
    }

    fn degraded(&mut self, photo_id: &str, degradation: Degradation) {
        self.send(SearchEvent::Degraded {
            photo_id: photo_id.to_string(),
            degradation,
        });
    }
}
