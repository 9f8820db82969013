//! The `broker` module holds the subscription registry and the per-subscriber
//! queue store.
//!
//! Both live behind one [`Broker`] value that is shared between connection
//! tasks through an `Arc`. All operations take `&self`; locking is internal.

pub mod engine;
pub mod message;
pub mod queue;
pub mod topic;

pub use engine::{Broker, SubscribeOutcome};
pub use message::Message;
pub use topic::SubscriberId;
