//! Topic registry
//!
//! `Registry` owns the name → topic mapping. It is constructed explicitly
//! and shared by reference, so independent registries can coexist in one
//! process. Topics live as long as the registry; there is no deletion.

use crate::config::RegistryConfig;
use crate::error::{PubSubError, Result};
use crate::topic::Topic;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Name → topic map with atomic create-if-absent
#[derive(Debug, Default)]
pub struct Registry {
    config: RegistryConfig,
    topics: Mutex<HashMap<String, Arc<Topic>>>,
}

impl Registry {
    /// Create an empty registry with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with explicit settings
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Settings applied to newly created topics
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Look up a topic, creating it when absent and `auto_create` is set
    ///
    /// Check and insert happen under one lock, so concurrent callers racing
    /// on the same name all receive the same instance.
    pub fn get_or_create(&self, name: &str, auto_create: bool) -> Option<Arc<Topic>> {
        let mut topics = self.lock_topics();
        if let Some(topic) = topics.get(name) {
            return Some(Arc::clone(topic));
        }
        if !auto_create {
            return None;
        }

        let topic = Arc::new(Topic::with_mode(name, self.config.multi_publisher));
        topics.insert(name.to_string(), Arc::clone(&topic));
        tracing::debug!(
            topic = %name,
            multi_publisher = self.config.multi_publisher,
            topics = topics.len(),
            "Topic created"
        );
        Some(topic)
    }

    /// Look up an existing topic without creating it
    pub fn get(&self, name: &str) -> Option<Arc<Topic>> {
        self.get_or_create(name, false)
    }

    /// Look up an existing topic, failing with `TopicNotFound`
    pub fn require(&self, name: &str) -> Result<Arc<Topic>> {
        self.get(name)
            .ok_or_else(|| PubSubError::TopicNotFound(name.to_string()))
    }

    /// Whether a topic with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.lock_topics().contains_key(name)
    }

    /// Names of all topics, sorted
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_topics().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of topics
    pub fn len(&self) -> usize {
        self.lock_topics().len()
    }

    /// True if no topic has been created yet
    pub fn is_empty(&self) -> bool {
        self.lock_topics().is_empty()
    }

    fn lock_topics(&self) -> MutexGuard<'_, HashMap<String, Arc<Topic>>> {
        self.topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
