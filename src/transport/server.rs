//! Accept loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::broker::{Broker, SubscriberId};
use crate::config::{BrokerSettings, Settings};
use crate::processor::CommandProcessor;
use crate::transport::connection::Connection;
use crate::utils::error::ServerError;

/// Pause after a failed accept before trying again.
pub(crate) const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    processor: CommandProcessor,
    settings: BrokerSettings,
    connections: Arc<Semaphore>,
}

impl Server {
    /// Binds to the configured address.
    pub async fn bind(settings: &Settings, broker: Arc<Broker>) -> Result<Self, ServerError> {
        let addr = settings.server.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self::from_listener(listener, broker, settings.broker.clone()))
    }

    pub fn from_listener(
        listener: TcpListener,
        broker: Arc<Broker>,
        settings: BrokerSettings,
    ) -> Self {
        let limit = settings.max_connections.min(Semaphore::MAX_PERMITS);
        let connections = Arc::new(Semaphore::new(limit));
        Self {
            listener,
            processor: CommandProcessor::new(broker),
            settings,
            connections,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Connections served at once; extras are closed on accept.
    pub fn connection_limit(&self) -> usize {
        self.settings.max_connections.min(Semaphore::MAX_PERMITS)
    }

    pub fn broker(&self) -> &Arc<Broker> {
        self.processor.broker()
    }

    /// Accepts connections until `shutdown` resolves. Connections already
    /// running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(addr = %self.local_addr()?, "broker listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => accept_failed(&e).await,
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let Ok(permit) = self.connections.clone().try_acquire_owned() else {
            warn!(
                %peer,
                max = self.connection_limit(),
                "connection limit reached, closing"
            );
            return;
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "could not set TCP_NODELAY");
        }

        let subscriber = SubscriberId::generate();
        let span = info_span!("connection", %peer, %subscriber);
        let connection =
            Connection::new(stream, subscriber, self.processor.clone(), &self.settings);

        tokio::spawn(
            async move {
                let _permit = permit;
                info!("client connected");
                match connection.run().await {
                    Ok(()) => info!("client disconnected"),
                    Err(e) if e.is_protocol_violation() => warn!(error = %e, "closing connection"),
                    Err(e) => info!(error = %e, "connection ended"),
                }
            }
            .instrument(span),
        );
    }
}

pub(crate) async fn accept_failed(error: &io::Error) {
    warn!(%error, "failed to accept connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Binds using `settings` and serves until `shutdown` resolves.
pub async fn start_server<F>(
    settings: &Settings,
    broker: Arc<Broker>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()>,
{
    Server::bind(settings, broker).await?.run_until(shutdown).await
}
