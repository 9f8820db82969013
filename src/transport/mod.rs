//! The `transport` module serves the broker over TCP.
//!
//! [`server::Server`] accepts connections and spawns one task per
//! connection; [`connection::Connection`] runs the strictly alternating
//! request/response loop for a single peer and releases that peer's
//! subscriptions however the loop ends.

pub mod connection;
pub mod server;

pub use connection::{Connection, SubscriberGuard};
pub use server::{Server, start_server};

#[cfg(test)]
mod tests;
