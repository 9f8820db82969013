//! Parsing of the pipe-delimited request grammar.
//!
//! A request is `COMMAND|APPID|TOPIC` with a fourth `MESSAGE` field for
//! `PUBLISH`. Splitting stops after the fourth field, so a message may itself
//! contain `|`.

use crate::protocol::error::CommandError;

const FIELD_SEPARATOR: char = '|';
const MIN_FIELDS: usize = 3;

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe { app_id: String, topic: String },
    Unsubscribe { app_id: String, topic: String },
    Publish { app_id: String, topic: String, message: String },
    Receive { app_id: String, topic: String },
}

impl Command {
    /// Parses a request payload. Validation order matters for which error a
    /// malformed request reports: field count first, then the command name,
    /// then the `PUBLISH` message field.
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let fields: Vec<&str> = input.splitn(MIN_FIELDS + 1, FIELD_SEPARATOR).collect();
        if fields.len() < MIN_FIELDS {
            return Err(CommandError::InvalidFormat);
        }

        let app_id = fields[1].to_string();
        let topic = fields[2].to_string();

        match fields[0] {
            "SUBSCRIBE" => Ok(Command::Subscribe { app_id, topic }),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe { app_id, topic }),
            "PUBLISH" => {
                // A zero-length payload cannot be framed as a response.
                let message = fields
                    .get(3)
                    .filter(|m| !m.is_empty())
                    .ok_or(CommandError::MissingMessage)?;
                Ok(Command::Publish {
                    app_id,
                    topic,
                    message: (*message).to_string(),
                })
            }
            "RECEIVE" => Ok(Command::Receive { app_id, topic }),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    /// Renders the command back into its wire form.
    pub fn encode(&self) -> String {
        match self {
            Command::Subscribe { app_id, topic } => format!("SUBSCRIBE|{app_id}|{topic}"),
            Command::Unsubscribe { app_id, topic } => format!("UNSUBSCRIBE|{app_id}|{topic}"),
            Command::Publish {
                app_id,
                topic,
                message,
            } => format!("PUBLISH|{app_id}|{topic}|{message}"),
            Command::Receive { app_id, topic } => format!("RECEIVE|{app_id}|{topic}"),
        }
    }

    pub fn app_id(&self) -> &str {
        match self {
            Command::Subscribe { app_id, .. }
            | Command::Unsubscribe { app_id, .. }
            | Command::Publish { app_id, .. }
            | Command::Receive { app_id, .. } => app_id,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Command::Subscribe { topic, .. }
            | Command::Unsubscribe { topic, .. }
            | Command::Publish { topic, .. }
            | Command::Receive { topic, .. } => topic,
        }
    }

    /// Upper-case command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Subscribe { .. } => "SUBSCRIBE",
            Command::Unsubscribe { .. } => "UNSUBSCRIBE",
            Command::Publish { .. } => "PUBLISH",
            Command::Receive { .. } => "RECEIVE",
        }
    }
}
