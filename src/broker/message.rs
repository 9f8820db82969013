use std::fmt;

/// An opaque text payload. The broker never inspects or annotates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: String,
}

impl Message {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}

impl From<&str> for Message {
    fn from(payload: &str) -> Self {
        Self::new(payload)
    }
}

impl From<String> for Message {
    fn from(payload: String) -> Self {
        Self::new(payload)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload)
    }
}
