use std::fmt;

use crate::protocol::error::CommandError;

/// Literal reply for a `RECEIVE` that found nothing queued.
pub const EMPTY: &str = "EMPTY";

/// A broker reply. `Display` produces the exact wire text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Subscribed(String),
    AlreadySubscribed(String),
    Unsubscribed(String),
    Published(String),
    /// A dequeued payload, returned verbatim.
    Message(String),
    Empty,
    Error(CommandError),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Subscribed(topic) => write!(f, "SUSCRITO_A|{topic}"),
            Response::AlreadySubscribed(topic) => write!(f, "YA_SUSCRITO_A|{topic}"),
            Response::Unsubscribed(topic) => write!(f, "DESUSCRITO_DE|{topic}"),
            Response::Published(topic) => write!(f, "PUBLICADO_EN|{topic}"),
            Response::Message(payload) => f.write_str(payload),
            Response::Empty => f.write_str(EMPTY),
            Response::Error(err) => write!(f, "ERROR: {err}"),
        }
    }
}

impl From<CommandError> for Response {
    fn from(err: CommandError) -> Self {
        Response::Error(err)
    }
}
