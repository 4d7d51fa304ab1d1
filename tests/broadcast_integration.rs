//! Broadcast engine integration tests
//!
//! End-to-end tests exercising registry, topics, publishers and subscribers
//! through the public API only. Covers fan-out, eviction, single-publisher
//! arbitration, idempotent lifecycle calls, and concurrency.

use a3s_pubsub::{
    ChannelSubscriber, Event, PubSubError, Registry, RegistryConfig, Result, SendOutcome,
    Subscriber, Topic,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

fn single_publisher_registry() -> Registry {
    Registry::with_config(RegistryConfig {
        multi_publisher: false,
    })
}

fn drain(rx: &mut a3s_pubsub::SubscriberReceiver) -> Vec<Arc<Event>> {
    std::iter::from_fn(|| rx.try_recv()).collect()
}

/// Counts deliveries without keeping them
#[derive(Default)]
struct Counter {
    seen: AtomicUsize,
}

impl Subscriber for Counter {
    fn send(&self, _event: Arc<Event>) -> Result<()> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Accepts a fixed number of events, then refuses
struct Flaky {
    budget: AtomicUsize,
    seen: Mutex<Vec<serde_json::Value>>,
}

impl Flaky {
    fn new(budget: usize) -> Self {
        Self {
            budget: AtomicUsize::new(budget),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Subscriber for Flaky {
    fn send(&self, event: Arc<Event>) -> Result<()> {
        let left = self.budget.load(Ordering::Relaxed);
        if left == 0 {
            return Err(PubSubError::delivery(a3s_pubsub::DeliveryFailure::Full));
        }
        self.budget.store(left - 1, Ordering::Relaxed);
        self.seen.lock().unwrap().push(event.payload.clone());
        Ok(())
    }
}

// ─── Scenarios ───────────────────────────────────────────────────

#[test]
fn test_chat_scenario() {
    let registry = Registry::new();
    let topic = registry.get_or_create("chat", true).unwrap();
    let (s1, mut rx) = ChannelSubscriber::bounded(10);
    topic.subscribe(s1);

    let p1 = topic.new_publisher();
    p1.send("hi");

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload, "hi");
    assert_eq!(events[0].sender, p1.id());
}

#[test]
fn test_superseded_publisher_scenario() {
    let registry = single_publisher_registry();
    let topic = registry.get_or_create("feed", true).unwrap();
    let (sub, mut rx) = ChannelSubscriber::bounded(10);
    topic.subscribe(sub);

    let p1 = topic.new_publisher();
    let p2 = topic.new_publisher();
    p1.send("A");
    p2.send("B");
    assert_eq!(p1.send("C"), SendOutcome::Superseded { active: p2.id() });

    let payloads: Vec<_> = drain(&mut rx).iter().map(|e| e.payload.clone()).collect();
    assert_eq!(payloads, vec!["A", "B"]);
}

#[test]
fn test_full_buffer_scenario() {
    let registry = Registry::new();
    let topic = registry.get_or_create("burst", true).unwrap();
    let (sub, mut rx) = ChannelSubscriber::bounded(10);
    topic.subscribe(sub);

    let p = topic.new_publisher();
    for i in 0..10 {
        p.send(i);
    }
    assert_eq!(topic.subscriber_count(), 1);

    assert_eq!(
        p.send(10),
        SendOutcome::Delivered {
            delivered: 0,
            evicted: 1
        }
    );
    assert_eq!(topic.subscriber_count(), 0);
    assert_eq!(
        p.send(11),
        SendOutcome::Delivered {
            delivered: 0,
            evicted: 0
        }
    );

    // The ten buffered events survive; the channel is closed after them.
    assert_eq!(drain(&mut rx).len(), 10);
}

// ─── Properties ──────────────────────────────────────────────────

#[test]
fn test_fan_out_completeness() {
    let registry = Registry::new();
    let topic = registry.get_or_create("fan", true).unwrap();
    let counters: Vec<Arc<Counter>> = (0..50).map(|_| Arc::new(Counter::default())).collect();
    for c in &counters {
        topic.subscribe(c.clone());
    }

    let p = topic.new_publisher();
    for i in 0..20 {
        assert_eq!(
            p.send(i),
            SendOutcome::Delivered {
                delivered: 50,
                evicted: 0
            }
        );
    }

    for c in &counters {
        assert_eq!(c.seen.load(Ordering::Relaxed), 20);
    }
}

#[test]
fn test_evicted_subscriber_misses_all_later_events() {
    let registry = Registry::new();
    let topic = registry.get_or_create("evict", true).unwrap();
    let flaky = Arc::new(Flaky::new(2));
    let steady = Arc::new(Counter::default());
    topic.subscribe(flaky.clone());
    topic.subscribe(steady.clone());

    let p = topic.new_publisher();
    for i in 0..5 {
        p.send(i);
    }

    assert_eq!(*flaky.seen.lock().unwrap(), vec![0, 1]);
    assert_eq!(steady.seen.load(Ordering::Relaxed), 5);
    assert_eq!(topic.subscriber_count(), 1);

    // Refilling the budget does not bring it back.
    flaky.budget.store(100, Ordering::Relaxed);
    p.send(5);
    assert_eq!(flaky.seen.lock().unwrap().len(), 2);
}

#[test]
fn test_older_publisher_dropped_until_newer_closed() {
    let registry = single_publisher_registry();
    let topic = registry.get_or_create("single", true).unwrap();
    let counter = Arc::new(Counter::default());
    topic.subscribe(counter.clone());

    let p1 = topic.new_publisher();
    let p2 = topic.new_publisher();
    p2.send("first");

    for _ in 0..5 {
        assert!(!p1.send("stale").is_delivered());
    }
    assert_eq!(counter.seen.load(Ordering::Relaxed), 1);

    p2.close();
    assert!(p1.send("resumed").is_delivered());
    assert_eq!(counter.seen.load(Ordering::Relaxed), 2);
}

#[test]
fn test_newest_publisher_preempts_without_sending_first() {
    let registry = single_publisher_registry();
    let topic = registry.get_or_create("single", true).unwrap();

    let p1 = topic.new_publisher();
    p1.send(1);
    let p2 = topic.new_publisher();

    // p1 stays active until p2 actually sends.
    assert!(p1.send(2).is_delivered());
    assert!(p2.send(3).is_delivered());
    assert!(!p1.send(4).is_delivered());
    assert!(p2.is_active());
    assert!(!p1.is_active());
}

#[test]
fn test_multi_publisher_concurrent_delivery() {
    const PUBLISHERS: usize = 8;
    const EVENTS: usize = 200;

    let registry = Registry::new();
    let topic = registry.get_or_create("multi", true).unwrap();
    let counter = Arc::new(Counter::default());
    topic.subscribe(counter.clone());

    let barrier = Arc::new(Barrier::new(PUBLISHERS));
    let handles: Vec<_> = (0..PUBLISHERS)
        .map(|_| {
            let topic = Arc::clone(&topic);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let p = topic.new_publisher();
                barrier.wait();
                for i in 0..EVENTS {
                    assert!(p.send(i).is_delivered());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(counter.seen.load(Ordering::Relaxed), PUBLISHERS * EVENTS);
}

#[test]
fn test_close_and_unsubscribe_are_idempotent() {
    let registry = Registry::new();
    let topic = registry.get_or_create("idem", true).unwrap();
    let (sub, _rx) = ChannelSubscriber::bounded(4);
    topic.subscribe(sub.clone());

    assert!(topic.unsubscribe(&sub));
    assert!(!topic.unsubscribe(&sub));

    let p = topic.new_publisher();
    p.close();
    p.close();
    assert_eq!(p.send("x"), SendOutcome::Closed);
}

#[test]
fn test_concurrent_get_or_create_yields_one_topic() {
    const THREADS: usize = 32;

    let registry = Arc::new(Registry::new());
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_create("race", true).unwrap()
            })
        })
        .collect();

    let topics: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(topics.iter().all(|t| Arc::ptr_eq(t, &topics[0])));
    assert_eq!(registry.len(), 1);
}

// ─── Concurrency ─────────────────────────────────────────────────

#[test]
fn test_subscribe_churn_during_broadcast() {
    let registry = Registry::new();
    let topic = registry.get_or_create("churn", true).unwrap();
    let steady = Arc::new(Counter::default());
    topic.subscribe(steady.clone());

    let publisher_topic = Arc::clone(&topic);
    let publisher = thread::spawn(move || {
        let p = publisher_topic.new_publisher();
        for i in 0..1000 {
            p.send(i);
        }
    });

    let churn_topic = Arc::clone(&topic);
    let churn = thread::spawn(move || {
        for _ in 0..500 {
            let c = Arc::new(Counter::default());
            churn_topic.subscribe(c.clone());
            churn_topic.unsubscribe(&c);
        }
    });

    publisher.join().unwrap();
    churn.join().unwrap();

    assert_eq!(steady.seen.load(Ordering::Relaxed), 1000);
    assert_eq!(topic.subscriber_count(), 1);
}

#[test]
fn test_eviction_racing_churn_keeps_healthy_subscribers() {
    let registry = Registry::new();
    let topic = registry.get_or_create("churn-evict", true).unwrap();
    let keepers: Vec<Arc<Counter>> = (0..8).map(|_| Arc::new(Counter::default())).collect();
    for k in &keepers {
        topic.subscribe(k.clone());
    }

    let publishers: Vec<_> = (0..4)
        .map(|_| {
            let topic = Arc::clone(&topic);
            thread::spawn(move || {
                let p = topic.new_publisher();
                for i in 0..500 {
                    p.send(i);
                }
            })
        })
        .collect();

    let churn_topic = Arc::clone(&topic);
    let churn = thread::spawn(move || {
        for _ in 0..500 {
            let c = Arc::new(Counter::default());
            churn_topic.subscribe(c.clone());
            churn_topic.unsubscribe(&c);
        }
    });

    let failing_topic = Arc::clone(&topic);
    let failing = thread::spawn(move || {
        (0..200)
            .map(|i| {
                let f = Arc::new(Flaky::new(i % 3));
                failing_topic.subscribe(f.clone());
                f
            })
            .collect::<Vec<_>>()
    });

    let late_topic = Arc::clone(&topic);
    let late = thread::spawn(move || {
        (0..50)
            .map(|_| {
                let k = Arc::new(Counter::default());
                late_topic.subscribe(k.clone());
                thread::yield_now();
                k
            })
            .collect::<Vec<_>>()
    });

    for p in publishers {
        p.join().unwrap();
    }
    churn.join().unwrap();
    let failing = failing.join().unwrap();
    let late = late.join().unwrap();

    // Budgets are at most 2, so three more sends exhaust every failing one.
    let p = topic.new_publisher();
    for i in 0..3 {
        p.send(i);
    }

    assert_eq!(topic.subscriber_count(), keepers.len() + late.len());
    for f in &failing {
        assert!(!topic.unsubscribe(f));
    }
    for k in keepers.iter().chain(late.iter()) {
        assert!(k.seen.load(Ordering::Relaxed) >= 3);
        assert!(topic.unsubscribe(k));
    }
}

/// Yields a few times per delivery so concurrent sends overlap
#[derive(Default)]
struct Slow;

impl Subscriber for Slow {
    fn send(&self, _event: Arc<Event>) -> Result<()> {
        for _ in 0..20 {
            thread::yield_now();
        }
        Ok(())
    }
}

#[test]
fn test_eviction_never_removes_reallocated_subscriber() {
    for _ in 0..2000 {
        let topic = Arc::new(Topic::new("reuse"));
        topic.subscribe(Arc::new(Slow));
        // Only the topic holds the failing subscriber, so eviction frees it.
        topic.subscribe(Arc::new(Flaky::new(0)));

        let p = Arc::new(topic.new_publisher());
        let start = Arc::new(Barrier::new(2));

        let (a_topic, a_pub, a_start) = (Arc::clone(&topic), Arc::clone(&p), Arc::clone(&start));
        let a = thread::spawn(move || {
            a_start.wait();
            a_pub.send(1);
            let fresh = Arc::new(Flaky::new(usize::MAX));
            a_topic.subscribe(fresh.clone());
            fresh
        });

        let (b_pub, b_start) = (Arc::clone(&p), Arc::clone(&start));
        let b = thread::spawn(move || {
            b_start.wait();
            b_pub.send(2);
        });

        let fresh = a.join().unwrap();
        b.join().unwrap();

        assert_eq!(topic.subscriber_count(), 2);
        assert!(topic.unsubscribe(&fresh), "healthy subscriber was evicted");
    }
}

#[test]
fn test_competing_single_publishers_leave_newest_active() {
    let registry = single_publisher_registry();
    let topic = registry.get_or_create("compete", true).unwrap();

    let publishers: Vec<_> = (0..6).map(|_| Arc::new(topic.new_publisher())).collect();
    let newest = publishers.last().unwrap().id();

    let handles: Vec<_> = publishers
        .iter()
        .cloned()
        .map(|p| {
            thread::spawn(move || {
                for i in 0..100 {
                    p.send(i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(topic.active_publisher(), Some(newest));
}

#[test]
fn test_close_racing_send_never_leaves_stale_slot() {
    let registry = single_publisher_registry();
    let topic = registry.get_or_create("race-close", true).unwrap();

    for _ in 0..200 {
        let p = Arc::new(topic.new_publisher());
        let sender = {
            let p = Arc::clone(&p);
            thread::spawn(move || {
                for i in 0..10 {
                    p.send(i);
                }
            })
        };
        p.close();
        sender.join().unwrap();
        assert_eq!(topic.active_publisher(), None);
    }
}
