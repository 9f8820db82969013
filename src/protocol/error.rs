use thiserror::Error;

/// Framing violations. Any of these terminates the connection without a
/// response, since the byte stream can no longer be trusted.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame length {0}")]
    InvalidLength(i32),

    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error("connection closed mid-frame, expected {expected} bytes")]
    Truncated { expected: usize },

    #[error("frame payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Grammar errors in a well-framed payload. The `Display` text is the exact
/// reason sent back to the client after the `ERROR: ` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Formato inválido")]
    InvalidFormat,

    #[error("Comando desconocido")]
    UnknownCommand(String),

    #[error("Falta mensaje")]
    MissingMessage,
}
