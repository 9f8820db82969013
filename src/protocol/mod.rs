//! The `protocol` module implements the wire codec spoken between clients and
//! the broker.
//!
//! Every unit of communication is a frame: a 4-byte little-endian signed
//! length followed by that many bytes of UTF-8 text. Request frames carry a
//! pipe-delimited command (`COMMAND|APPID|TOPIC[|MESSAGE]`), response frames
//! carry the broker's textual reply.

pub mod command;
pub mod error;
pub mod frame;
pub mod response;

pub use command::Command;
pub use error::{CommandError, ProtocolError};
pub use frame::{
    DEFAULT_MAX_FRAME_LEN, HEADER_LEN, encode_frame, read_body, read_frame, read_header, write_frame,
};
pub use response::Response;
