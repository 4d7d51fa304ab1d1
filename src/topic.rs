//! Topic — broadcast and publisher arbitration
//!
//! A `Topic` owns its subscriber set and, in single-publisher mode, the
//! active-publisher slot. It is the only synchronization point of the
//! engine: publishers and the registry delegate to it.
//!
//! ## Locking
//!
//! - `subscribe` / `unsubscribe` take the exclusive lock.
//! - `send` runs arbitration and fan-out under the shared lock, so
//!   broadcasts from different publishers proceed in parallel. Failed
//!   subscribers are collected and removed afterwards in a separate
//!   exclusive pass.
//! - Eviction removes an entry only if it is still the allocation that
//!   failed; the failed `Arc`s are held until then so their addresses
//!   cannot be reused by a newer subscriber in between.
//! - The active-publisher slot is an atomic updated by compare-and-swap,
//!   so concurrent arbitration under the shared lock cannot race. A
//!   publisher's closed flag is checked again after promotion, so a close
//!   racing a send never leaves a closed publisher in the slot.

use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::types::{Event, PublisherId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Identity of a registered subscriber: the address of its `Arc` allocation
type SubscriberKey = usize;

type SubscriberMap = HashMap<SubscriberKey, Arc<dyn Subscriber>>;

fn subscriber_key<S: Subscriber + ?Sized>(subscriber: &Arc<S>) -> SubscriberKey {
    Arc::as_ptr(subscriber).cast::<()>() as usize
}

fn same_subscriber(a: &Arc<dyn Subscriber>, b: &Arc<dyn Subscriber>) -> bool {
    subscriber_key(a) == subscriber_key(b)
}

/// What happened to one published event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The event went through fan-out
    Delivered {
        /// Subscribers that accepted the event
        delivered: usize,
        /// Subscribers that refused it and were removed
        evicted: usize,
    },
    /// Dropped: a newer publisher holds the single-publisher slot
    Superseded {
        /// The publisher currently treated as authoritative
        active: PublisherId,
    },
    /// Dropped: the publisher was already closed
    Closed,
}

impl SendOutcome {
    /// True if the event reached fan-out (even with zero subscribers)
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// A named broadcast channel
pub struct Topic {
    name: String,
    multi_publisher: bool,
    subscribers: RwLock<SubscriberMap>,
    /// Raw id of the active publisher; 0 when the slot is empty
    active_publisher: AtomicU64,
}

impl Topic {
    /// Create a topic where every publisher may send
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_mode(name, true)
    }

    /// Create a topic where only the newest publisher is honored
    pub fn single_publisher(name: impl Into<String>) -> Self {
        Self::with_mode(name, false)
    }

    /// Create a topic with an explicit publisher mode
    pub fn with_mode(name: impl Into<String>, multi_publisher: bool) -> Self {
        Self {
            name: name.into(),
            multi_publisher,
            subscribers: RwLock::new(HashMap::new()),
            active_publisher: AtomicU64::new(0),
        }
    }

    /// Topic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether arbitration is disabled
    pub fn is_multi_publisher(&self) -> bool {
        self.multi_publisher
    }

    /// Derive a new publisher bound to this topic
    ///
    /// Each publisher gets an identity newer than any issued before it.
    pub fn new_publisher(self: &Arc<Self>) -> Publisher {
        Publisher::new(Arc::clone(self))
    }

    /// Register a subscriber; returns false if it was already a member
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let key = subscriber_key(&subscriber);
        let mut subs = self.write_subscribers();
        let added = subs.insert(key, subscriber).is_none();
        tracing::debug!(
            topic = %self.name,
            subscribers = subs.len(),
            added,
            "Subscriber registered"
        );
        added
    }

    /// Remove a subscriber; a no-op if it is not a member
    pub fn unsubscribe<S: Subscriber + ?Sized>(&self, subscriber: &Arc<S>) -> bool {
        let key = subscriber_key(subscriber);
        let mut subs = self.write_subscribers();
        let removed = subs.remove(&key).is_some();
        if removed {
            tracing::debug!(
                topic = %self.name,
                subscribers = subs.len(),
                "Subscriber removed"
            );
        }
        removed
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.read_subscribers().len()
    }

    /// The publisher currently holding the single-publisher slot
    pub fn active_publisher(&self) -> Option<PublisherId> {
        PublisherId::from_raw(self.active_publisher.load(Ordering::Acquire))
    }

    /// Broadcast an event to every current subscriber
    ///
    /// The event's `sender` is the arbitration identity and `closed` is the
    /// sending publisher's closed flag. Subscribers whose `send` fails are
    /// removed before this returns.
    pub(crate) fn send(&self, event: Event, closed: &AtomicBool) -> SendOutcome {
        let sender = event.sender;
        let event = Arc::new(event);

        let (delivered, failed) = {
            let subs = self.read_subscribers();
            if closed.load(Ordering::SeqCst) {
                return SendOutcome::Closed;
            }

            if !self.multi_publisher {
                if let Err(active) = self.arbitrate(sender) {
                    tracing::trace!(
                        topic = %self.name,
                        publisher = %sender,
                        active = %active,
                        "Dropped event from superseded publisher"
                    );
                    return SendOutcome::Superseded { active };
                }
                if closed.load(Ordering::SeqCst) {
                    self.release(sender);
                    return SendOutcome::Closed;
                }
            }

            let mut failed: Vec<(SubscriberKey, Arc<dyn Subscriber>)> = Vec::new();
            for (key, sub) in subs.iter() {
                if let Err(e) = sub.send(Arc::clone(&event)) {
                    tracing::trace!(topic = %self.name, error = %e, "Delivery failed");
                    failed.push((*key, Arc::clone(sub)));
                }
            }
            (subs.len() - failed.len(), failed)
        };

        let evicted = if failed.is_empty() {
            0
        } else {
            let mut subs = self.write_subscribers();
            let evicted = failed
                .iter()
                .filter(|(key, sub)| {
                    let current = subs.get(key).is_some_and(|cur| same_subscriber(cur, sub));
                    if current {
                        subs.remove(key);
                    }
                    current
                })
                .count();
            tracing::debug!(
                topic = %self.name,
                evicted,
                subscribers = subs.len(),
                "Evicted failed subscribers"
            );
            evicted
        };

        SendOutcome::Delivered { delivered, evicted }
    }

    /// Clear the active slot if it still points at `publisher`
    ///
    /// Lock-free, so it is safe to call from inside a subscriber's `send`.
    pub(crate) fn release(&self, publisher: PublisherId) {
        let cleared = self
            .active_publisher
            .compare_exchange(publisher.as_u64(), 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if cleared {
            tracing::debug!(topic = %self.name, publisher = %publisher, "Active publisher released");
        }
    }

    /// Promote `publisher` unless a newer one is already active
    fn arbitrate(&self, publisher: PublisherId) -> Result<(), PublisherId> {
        let mine = publisher.as_u64();
        match self
            .active_publisher
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < mine).then_some(mine)
            }) {
            Ok(previous) => {
                tracing::debug!(
                    topic = %self.name,
                    publisher = %publisher,
                    previous = previous,
                    "Publisher promoted to active"
                );
                Ok(())
            }
            Err(current) if current == mine => Ok(()),
            Err(current) => Err(PublisherId::from_raw(current).unwrap_or(publisher)),
        }
    }

    fn read_subscribers(&self) -> RwLockReadGuard<'_, SubscriberMap> {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_subscribers(&self) -> RwLockWriteGuard<'_, SubscriberMap> {
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("multi_publisher", &self.multi_publisher)
            .field("subscribers", &self.subscriber_count())
            .field("active_publisher", &self.active_publisher())
            .finish()
    }
}
