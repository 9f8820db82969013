//! The `client` module is a small async client for the broker's wire
//! protocol.
//!
//! A [`BrokerClient`] owns one TCP connection and one app id and issues
//! requests one at a time, waiting for each response before returning.

pub mod pubsub_client;
pub use pubsub_client::{BrokerClient, ClientError};
