//! Publisher handle — the only way to inject events into a topic

use crate::topic::{SendOutcome, Topic};
use crate::types::{Event, PublisherId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Capability token bound to one topic
///
/// Created by [`Topic::new_publisher`]. Sending is possible until the handle
/// is closed; closing (explicitly or by dropping the handle) gives up the
/// topic's active-publisher slot if this publisher holds it.
pub struct Publisher {
    id: PublisherId,
    closed: AtomicBool,
    topic: RwLock<Option<Arc<Topic>>>,
}

impl Publisher {
    pub(crate) fn new(topic: Arc<Topic>) -> Self {
        let id = PublisherId::next();
        tracing::debug!(topic = %topic.name(), publisher = %id, "Publisher created");
        Self {
            id,
            closed: AtomicBool::new(false),
            topic: RwLock::new(Some(topic)),
        }
    }

    /// Creation-order identity of this publisher
    pub fn id(&self) -> PublisherId {
        self.id
    }

    /// Publish a payload to every subscriber of the topic
    ///
    /// Never fails: a closed publisher yields [`SendOutcome::Closed`] and a
    /// pre-empted one [`SendOutcome::Superseded`]. No lock on the handle is
    /// held during fan-out, so a subscriber may close this publisher from
    /// inside its own `send`.
    pub fn send(&self, payload: impl Into<serde_json::Value>) -> SendOutcome {
        match self.topic() {
            Some(topic) => topic.send(Event::new(self.id, payload.into()), &self.closed),
            None => SendOutcome::Closed,
        }
    }

    /// Detach from the topic; idempotent
    ///
    /// A send racing with `close` may still deliver its event, but the topic
    /// is never left with this publisher in its active slot.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let topic = self
            .topic
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(topic) = topic {
            topic.release(self.id);
            tracing::debug!(topic = %topic.name(), publisher = %self.id, "Publisher closed");
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether this publisher currently holds its topic's active slot
    pub fn is_active(&self) -> bool {
        self.topic()
            .is_some_and(|topic| topic.active_publisher() == Some(self.id))
    }

    /// The topic this publisher is bound to, unless closed
    pub fn topic(&self) -> Option<Arc<Topic>> {
        self.topic
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
