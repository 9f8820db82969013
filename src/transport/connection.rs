//! Per-connection handler.
//!
//! A connection reads one frame, dispatches it, writes one response frame,
//! and repeats until the peer closes, breaks framing, goes idle past the
//! configured limit, or the task dies. Pipelined requests are simply read
//! one at a time; responses never go out of order.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::broker::{Broker, SubscriberId};
use crate::config::BrokerSettings;
use crate::processor::CommandProcessor;
use crate::protocol::{read_body, read_header, write_frame};
use crate::utils::error::ConnectionError;

/// Releases every subscription held by one subscriber when dropped.
///
/// Owned by the connection future, so release happens on clean close, on
/// error returns, on panic unwinding and when the task is aborted.
#[derive(Debug)]
pub struct SubscriberGuard {
    broker: Arc<Broker>,
    subscriber: SubscriberId,
}

impl SubscriberGuard {
    pub fn new(broker: Arc<Broker>, subscriber: SubscriberId) -> Self {
        Self { broker, subscriber }
    }

    pub fn subscriber(&self) -> &SubscriberId {
        &self.subscriber
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let released = self.broker.release(&self.subscriber);
        info!(subscriber = %self.subscriber, released, "cleaned up subscriber");
    }
}

pub struct Connection<S> {
    stream: S,
    processor: CommandProcessor,
    guard: SubscriberGuard,
    max_frame_len: usize,
    idle_timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        subscriber: SubscriberId,
        processor: CommandProcessor,
        settings: &BrokerSettings,
    ) -> Self {
        let guard = SubscriberGuard::new(processor.broker().clone(), subscriber);
        Self {
            stream,
            processor,
            guard,
            max_frame_len: settings.max_frame_len,
            idle_timeout: settings.idle_timeout(),
        }
    }

    pub fn subscriber(&self) -> &SubscriberId {
        self.guard.subscriber()
    }

    /// Runs the request loop to completion. `Ok(())` means the peer closed
    /// cleanly. Subscriptions are released when `self` drops, which happens
    /// before this future completes.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        while let Some(request) = self.next_request().await? {
            let response = self
                .processor
                .process(self.guard.subscriber(), &request)
                .to_string();
            debug!(subscriber = %self.guard.subscriber(), %request, %response, "handled request");
            write_frame(&mut self.stream, &response).await?;
        }
        Ok(())
    }

    /// The idle deadline covers only the wait for the next header. A body
    /// that follows a header is read without it.
    async fn next_request(&mut self) -> Result<Option<String>, ConnectionError> {
        let header = read_header(&mut self.stream, self.max_frame_len);
        let len = match self.idle_timeout {
            Some(limit) => match timeout(limit, header).await {
                Ok(len) => len?,
                Err(_) => return Err(ConnectionError::IdleTimeout(limit)),
            },
            None => header.await?,
        };

        match len {
            Some(len) => Ok(Some(read_body(&mut self.stream, len).await?)),
            None => Ok(None),
        }
    }
}
