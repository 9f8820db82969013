//! Topic management
//!
//! A `Topic` maps each of its subscribers to that subscriber's queue for the
//! topic. Holding the queue inside the subscription entry means a queue exists
//! exactly as long as the subscription does.
//!
//! Concurrency note: callers must hold the broker's registry lock while
//! touching a `Topic`. Each queue carries its own lock for appends and pops.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::broker::queue::MessageQueue;

pub(crate) type SharedQueue = Arc<Mutex<MessageQueue>>;

/// Identity of one connected subscriber. Bound to a connection for its
/// whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Wraps an existing identifier, e.g. one recorded in a test.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh connection-scoped identity.
    pub fn generate() -> Self {
        Self(format!("client-{}", Uuid::new_v4()))
    }

    /// The identifier as text, as it appears in logs.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named topic and the queue each of its subscribers reads from.
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub(crate) subscribers: HashMap<SubscriberId, SharedQueue>,
}

impl Topic {
    /// Creates a topic with no subscribers.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Adds a subscriber with an empty queue. Returns `false` and leaves the
    /// existing queue untouched when already subscribed.
    pub fn subscribe(&mut self, id: SubscriberId) -> bool {
        if self.subscribers.contains_key(&id) {
            return false;
        }
        self.subscribers
            .insert(id, Arc::new(Mutex::new(MessageQueue::new())));
        true
    }

    /// Removes a subscriber, dropping its queue and anything still in it.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// Whether `id` is currently subscribed.
    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub(crate) fn queue(&self, id: &SubscriberId) -> Option<&SharedQueue> {
        self.subscribers.get(id)
    }

    /// Current subscribers, in no particular order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.subscribers.keys().cloned().collect()
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// `true` once the last subscriber has left.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
