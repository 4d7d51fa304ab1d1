//! # a3s-pubsub
//!
//! Topic-based in-memory broadcast engine for the A3S ecosystem.
//!
//! ## Overview
//!
//! Publishers emit events into a named topic; every current subscriber of
//! that topic receives each event, in publish order, best-effort. Slow or
//! gone subscribers are shed instead of stalling the topic. A topic can run
//! in single-publisher mode, where the most recently created publisher is
//! authoritative and older ones are silently dropped.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_pubsub::{ChannelSubscriber, Registry};
//!
//! let registry = Registry::new();
//! let topic = registry.get_or_create("chat", true).unwrap();
//!
//! let (subscriber, mut rx) = ChannelSubscriber::bounded(10);
//! topic.subscribe(subscriber);
//!
//! let publisher = topic.new_publisher();
//! publisher.send("hi");
//!
//! let event = rx.try_recv().unwrap();
//! assert_eq!(event.payload, "hi");
//! assert_eq!(event.sender, publisher.id());
//! ```
//!
//! ## Architecture
//!
//! - **Registry** — name → topic map with atomic create-if-absent
//! - **Topic** — subscriber set, fan-out, eviction, publisher arbitration
//! - **Publisher** — capability to send into one topic, ordered by creation
//! - **Subscriber** trait — non-blocking delivery; `ChannelSubscriber` is the
//!   bounded channel implementation used by the WebSocket front end
//! - **server** — optional HTTP/WebSocket transport over axum

pub mod config;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod server;
pub mod subscriber;
pub mod topic;
pub mod types;

// Re-export core types
pub use config::{RegistryConfig, ServerConfig};
pub use error::{DeliveryFailure, PubSubError, Result};
pub use publisher::Publisher;
pub use registry::Registry;
pub use subscriber::{
    ChannelSubscriber, Subscriber, SubscriberReceiver, DEFAULT_SUBSCRIBER_CAPACITY,
};
pub use topic::{SendOutcome, Topic};
pub use types::{Event, PublisherId};
