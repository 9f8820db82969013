use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::protocol::response::EMPTY;
use crate::protocol::{Command, DEFAULT_MAX_FRAME_LEN, ProtocolError, read_frame, write_frame};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("broker closed the connection")]
    ConnectionClosed,

    #[error("broker rejected request: {0}")]
    Rejected(String),
}

/// A connected client bound to one app id.
#[derive(Debug)]
pub struct BrokerClient<S = TcpStream> {
    app_id: String,
    stream: S,
}

impl BrokerClient<TcpStream> {
    pub async fn connect(
        addr: impl ToSocketAddrs,
        app_id: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, app_id))
    }
}

impl<S> BrokerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already connected stream.
    pub fn new(stream: S, app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            stream,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Sends one command and returns the raw response text.
    pub async fn send(&mut self, command: &Command) -> Result<String, ClientError> {
        self.request(&command.encode()).await
    }

    /// Sends a raw payload and returns the raw response text.
    pub async fn request(&mut self, payload: &str) -> Result<String, ClientError> {
        write_frame(&mut self.stream, payload).await?;
        let response = read_frame(&mut self.stream, DEFAULT_MAX_FRAME_LEN)
            .await?
            .ok_or(ClientError::ConnectionClosed)?;
        debug!(app_id = %self.app_id, %payload, %response, "request completed");
        Ok(response)
    }

    /// Returns `true` for a new subscription, `false` if it already existed.
    pub async fn subscribe(&mut self, topic: &str) -> Result<bool, ClientError> {
        let response = self
            .send(&Command::Subscribe {
                app_id: self.app_id.clone(),
                topic: topic.to_string(),
            })
            .await?;

        if response.starts_with("SUSCRITO_A|") {
            Ok(true)
        } else if response.starts_with("YA_SUSCRITO_A|") {
            Ok(false)
        } else {
            Err(ClientError::Rejected(response))
        }
    }

    pub async fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        let response = self
            .send(&Command::Unsubscribe {
                app_id: self.app_id.clone(),
                topic: topic.to_string(),
            })
            .await?;
        expect_prefix(response, "DESUSCRITO_DE|")
    }

    pub async fn publish(&mut self, topic: &str, message: &str) -> Result<(), ClientError> {
        let response = self
            .send(&Command::Publish {
                app_id: self.app_id.clone(),
                topic: topic.to_string(),
                message: message.to_string(),
            })
            .await?;
        expect_prefix(response, "PUBLICADO_EN|")
    }

    /// Polls for the next message. `None` means nothing is queued.
    ///
    /// A queued payload is returned as-is, even one that happens to start
    /// with `ERROR: `; only transport failures are errors here.
    pub async fn receive(&mut self, topic: &str) -> Result<Option<String>, ClientError> {
        let response = self
            .send(&Command::Receive {
                app_id: self.app_id.clone(),
                topic: topic.to_string(),
            })
            .await?;
        Ok((response != EMPTY).then_some(response))
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn expect_prefix(response: String, prefix: &str) -> Result<(), ClientError> {
    if response.starts_with(prefix) {
        Ok(())
    } else {
        Err(ClientError::Rejected(response))
    }
}
