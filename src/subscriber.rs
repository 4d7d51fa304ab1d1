//! Subscriber capability and the bounded channel sink
//!
//! A topic only ever talks to listeners through [`Subscriber::send`].
//! Delivery is best-effort: a subscriber that cannot take an event right
//! now reports failure and is evicted from the topic by the caller.

use crate::error::{DeliveryFailure, PubSubError, Result};
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default buffer size for [`ChannelSubscriber`]
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 10;

/// Anything able to receive a delivered event
///
/// Implementations must return immediately. Blocking here stalls the
/// broadcasting publisher and every other subscriber of the topic.
/// `send` runs under the topic's shared lock and must not call back into
/// `subscribe` or `unsubscribe` of the same topic. Closing or dropping a
/// publisher from inside `send` is allowed.
pub trait Subscriber: Send + Sync {
    /// Offer one event; `Err` means the subscriber should be dropped
    fn send(&self, event: Arc<Event>) -> Result<()>;
}

/// Non-blocking subscriber backed by a bounded `mpsc` channel
///
/// The transport side holds the matching [`SubscriberReceiver`] and drains it
/// at its own pace. When the buffer fills up, further sends fail with
/// [`DeliveryFailure::Full`] instead of waiting.
#[derive(Debug)]
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Arc<Event>>,
}

impl ChannelSubscriber {
    /// Create a subscriber with a buffer of `capacity` events (minimum 1)
    pub fn bounded(capacity: usize) -> (Arc<Self>, SubscriberReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self { tx }), SubscriberReceiver { rx })
    }

    /// Free slots left in the buffer
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// True once the receiver has been dropped or closed
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Subscriber for ChannelSubscriber {
    fn send(&self, event: Arc<Event>) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(PubSubError::delivery(DeliveryFailure::Full))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(PubSubError::delivery(DeliveryFailure::Closed))
            }
        }
    }
}

/// Consuming half of a [`ChannelSubscriber`]
///
/// `recv` yields `None` once the subscriber has been evicted from every topic
/// (all senders dropped) and the buffer is drained.
#[derive(Debug)]
pub struct SubscriberReceiver {
    rx: mpsc::Receiver<Arc<Event>>,
}

impl SubscriberReceiver {
    /// Wait for the next delivered event
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.rx.recv().await
    }

    /// Take an already-buffered event without waiting
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting deliveries; buffered events can still be drained
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Convert into a `Stream` of delivered events
    pub fn into_stream(self) -> ReceiverStream<Arc<Event>> {
        ReceiverStream::new(self.rx)
    }
}
