//! # mqbroker
//!
//! `mqbroker` is a minimal in-memory message broker. Clients connect over
//! TCP, subscribe to named topics, publish text messages into them, and poll
//! their own per-topic queues for delivered messages.
//!
//! ## Core Modules
//!
//! - `protocol`: length-prefixed framing and the `COMMAND|APPID|TOPIC[|MESSAGE]` grammar.
//! - `broker`: the subscription registry and per-subscriber FIFO queues.
//! - `processor`: dispatches parsed commands against the broker.
//! - `transport`: the TCP accept loop and per-connection request loop.
//! - `client`: an async client for the wire protocol.
//! - `config`: layered configuration loading.
//! - `utils`: error types and logging setup.
//!
//! Nothing is persisted: all topics and queues live in memory and vanish on
//! restart. Delivery is pull-only; a subscriber sees a message only by
//! sending `RECEIVE`.

pub mod broker;
pub mod client;
pub mod config;
pub mod processor;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use broker::{Broker, SubscriberId};
pub use client::BrokerClient;
pub use processor::CommandProcessor;
pub use transport::Server;
