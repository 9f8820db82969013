//! Broker engine
//!
//! In-memory registry of topics and subscriber queues:
//! - topics appear on first subscription and disappear with their last subscriber
//! - publishing fans a message out to every subscriber of a topic except the sender
//! - receiving pops the oldest queued message without ever waiting
//!
//! Locking discipline:
//! - The registry (topics plus the per-subscriber topic index) sits behind a
//!   single `Mutex`. Every operation that reads or changes subscriptions holds
//!   it for its full duration, so a fan-out always sees one consistent
//!   subscriber set.
//! - Each queue has its own `Mutex`. Publish takes a target queue's lock only
//!   around that one append; receive clones the queue handle, releases the
//!   registry, then pops.
//! - Lock order is always registry before queue, and no lock is held across
//!   an `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::broker::message::Message;
use crate::broker::topic::{SharedQueue, SubscriberId, Topic};

/// Result of a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
}

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<String, Topic>,
    /// Reverse index used to release a subscriber without scanning every topic.
    subscriptions: HashMap<SubscriberId, HashSet<String>>,
}

impl Registry {
    fn queue(&self, subscriber: &SubscriberId, topic: &str) -> Option<SharedQueue> {
        self.topics
            .get(topic)
            .and_then(|t| t.queue(subscriber))
            .cloned()
    }

    fn remove_subscription(&mut self, subscriber: &SubscriberId, topic: &str) -> bool {
        let (removed, now_empty) = match self.topics.get_mut(topic) {
            Some(t) => (t.unsubscribe(subscriber), t.is_empty()),
            None => (false, false),
        };
        if now_empty {
            self.topics.remove(topic);
            debug!(topic, "topic removed after last subscriber left");
        }

        if let Some(topics) = self.subscriptions.get_mut(subscriber) {
            topics.remove(topic);
            if topics.is_empty() {
                self.subscriptions.remove(subscriber);
            }
        }

        removed
    }
}

/// Shared subscription registry and queue store. One instance is shared by
/// every connection through an `Arc`.
#[derive(Debug, Default)]
pub struct Broker {
    registry: Mutex<Registry>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Mutations never leave the registry half-updated before a panic point,
    // so a poisoned lock still guards consistent state.
    mutex.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        warn!("recovering poisoned broker lock");
        poisoned.into_inner()
    })
}

impl Broker {
    /// Creates a broker with no topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `subscriber` to `topic`, creating the topic if needed.
    /// Subscribing twice is a no-op that keeps the existing queue.
    pub fn subscribe(&self, subscriber: &SubscriberId, topic: &str) -> SubscribeOutcome {
        let mut registry = lock(&self.registry);

        let added = registry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(subscriber.clone());

        if !added {
            debug!(%subscriber, topic, "already subscribed");
            return SubscribeOutcome::AlreadySubscribed;
        }

        registry
            .subscriptions
            .entry(subscriber.clone())
            .or_default()
            .insert(topic.to_string());

        debug!(%subscriber, topic, "subscribed");
        SubscribeOutcome::Subscribed
    }

    /// Removes the subscription and discards its queue. Returns whether a
    /// subscription existed; absence is not an error.
    pub fn unsubscribe(&self, subscriber: &SubscriberId, topic: &str) -> bool {
        let removed = lock(&self.registry).remove_subscription(subscriber, topic);
        if removed {
            debug!(%subscriber, topic, "unsubscribed");
        }
        removed
    }

    /// Whether `subscriber` currently holds a subscription (and so a queue)
    /// for `topic`.
    pub fn is_subscribed(&self, subscriber: &SubscriberId, topic: &str) -> bool {
        lock(&self.registry)
            .topics
            .get(topic)
            .is_some_and(|t| t.contains(subscriber))
    }

    /// Snapshot of the current subscribers of `topic`, taken under the
    /// registry lock.
    pub fn subscribers_of(&self, topic: &str) -> Vec<SubscriberId> {
        lock(&self.registry)
            .topics
            .get(topic)
            .map(Topic::subscriber_ids)
            .unwrap_or_default()
    }

    /// Appends to one subscriber's queue. Returns `false` when that
    /// subscriber is not subscribed to `topic`; nothing is buffered then.
    pub fn enqueue(&self, subscriber: &SubscriberId, topic: &str, message: Message) -> bool {
        let registry = lock(&self.registry);
        match registry.topics.get(topic).and_then(|t| t.queue(subscriber)) {
            Some(queue) => {
                lock(queue).push(message);
                true
            }
            None => false,
        }
    }

    /// Pops the oldest pending message for (`subscriber`, `topic`).
    pub fn dequeue(&self, subscriber: &SubscriberId, topic: &str) -> Option<Message> {
        let queue = lock(&self.registry).queue(subscriber, topic)?;
        let mut pending = lock(&queue);
        pending.pop()
    }

    /// `true` when there is no queue or the queue holds nothing.
    pub fn is_empty(&self, subscriber: &SubscriberId, topic: &str) -> bool {
        self.queue_len(subscriber, topic) == 0
    }

    /// Pending messages for (`subscriber`, `topic`); `0` when not subscribed.
    pub fn queue_len(&self, subscriber: &SubscriberId, topic: &str) -> usize {
        match lock(&self.registry).queue(subscriber, topic) {
            Some(queue) => lock(&queue).len(),
            None => 0,
        }
    }

    /// Fans `message` out to every subscriber of `topic` except `sender`.
    /// Returns the number of queues it landed in. Publishing to an unknown
    /// topic delivers nowhere and is not an error.
    pub fn publish(&self, topic: &str, message: &str, sender: &SubscriberId) -> usize {
        let registry = lock(&self.registry);
        let Some(t) = registry.topics.get(topic) else {
            debug!(topic, "publish to topic without subscribers");
            return 0;
        };

        let mut delivered = 0;
        for (subscriber, queue) in &t.subscribers {
            if subscriber == sender {
                continue;
            }
            lock(queue).push(Message::new(message));
            delivered += 1;
        }

        debug!(topic, %sender, delivered, "published");
        delivered
    }

    /// Drops every subscription and queue owned by `subscriber`. Called on
    /// connection teardown. Returns how many subscriptions were released.
    pub fn release(&self, subscriber: &SubscriberId) -> usize {
        let mut registry = lock(&self.registry);
        let Some(topics) = registry.subscriptions.remove(subscriber) else {
            return 0;
        };

        let mut released = 0;
        for topic in &topics {
            if registry.remove_subscription(subscriber, topic) {
                released += 1;
            }
        }

        debug!(%subscriber, released, "released subscriber");
        released
    }

    /// Number of live topics, i.e. topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        lock(&self.registry).topics.len()
    }

    /// Topics `subscriber` is currently subscribed to.
    pub fn topics_of(&self, subscriber: &SubscriberId) -> Vec<String> {
        lock(&self.registry)
            .subscriptions
            .get(subscriber)
            .map(|topics| topics.iter().cloned().collect())
            .unwrap_or_default()
    }
}
