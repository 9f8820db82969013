//! Command dispatch.
//!
//! The processor turns a request payload into a [`Response`], applying the
//! command to the shared [`Broker`] on behalf of one connection's subscriber
//! identity. It holds no per-connection state of its own.

use std::sync::Arc;

use tracing::debug;

use crate::broker::{Broker, SubscribeOutcome, SubscriberId};
use crate::protocol::{Command, Response};

#[derive(Debug, Clone)]
pub struct CommandProcessor {
    broker: Arc<Broker>,
}

impl CommandProcessor {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Parses and executes a raw request. Grammar errors become `ERROR`
    /// responses rather than failures.
    pub fn process(&self, subscriber: &SubscriberId, request: &str) -> Response {
        match Command::parse(request) {
            Ok(command) => self.execute(subscriber, command),
            Err(err) => {
                debug!(%subscriber, %err, "rejected request");
                Response::Error(err)
            }
        }
    }

    pub fn execute(&self, subscriber: &SubscriberId, command: Command) -> Response {
        debug!(
            %subscriber,
            app_id = command.app_id(),
            command = command.name(),
            topic = command.topic(),
            "dispatching"
        );

        match command {
            Command::Subscribe { topic, .. } => match self.broker.subscribe(subscriber, &topic) {
                SubscribeOutcome::Subscribed => Response::Subscribed(topic),
                SubscribeOutcome::AlreadySubscribed => Response::AlreadySubscribed(topic),
            },
            Command::Unsubscribe { topic, .. } => {
                self.broker.unsubscribe(subscriber, &topic);
                Response::Unsubscribed(topic)
            }
            Command::Publish { topic, message, .. } => {
                self.broker.publish(&topic, &message, subscriber);
                Response::Published(topic)
            }
            Command::Receive { topic, .. } => match self.broker.dequeue(subscriber, &topic) {
                Some(message) => Response::Message(message.into_payload()),
                None => Response::Empty,
            },
        }
    }
}
