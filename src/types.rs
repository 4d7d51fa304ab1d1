//! Core event types for the a3s-pubsub system
//!
//! All types use camelCase JSON serialization for wire compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Creation-order identity of a publisher
///
/// Strictly increasing across the process: every call to
/// [`PublisherId::next`] returns a value greater than all earlier ones.
/// Values are seeded from wall-clock nanoseconds but only their order
/// carries meaning. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublisherId(u64);

static LAST_PUBLISHER_ID: AtomicU64 = AtomicU64::new(0);

impl PublisherId {
    /// Issue a fresh identity, newer than every identity issued before it
    pub fn next() -> Self {
        let now = now_nanos();
        let prev = LAST_PUBLISHER_ID
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        PublisherId(now.max(prev + 1))
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(PublisherId(raw))
    }
}

impl fmt::Display for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single event flowing through a topic
///
/// Immutable once built. Topics hand the same `Arc<Event>` to every
/// subscriber of a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque payload supplied by the publisher
    pub payload: serde_json::Value,

    /// Identity of the publisher that sent it
    pub sender: PublisherId,
}

impl Event {
    /// Create an event tagged with its sender
    pub fn new(sender: PublisherId, payload: serde_json::Value) -> Self {
        Self { payload, sender }
    }
}

fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
