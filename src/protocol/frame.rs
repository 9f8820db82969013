//! Length-prefixed framing over any async byte stream.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::ProtocolError;

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 4;

/// Default upper bound on an incoming payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Encodes `payload` as a single frame: little-endian `i32` length, then the
/// UTF-8 bytes.
pub fn encode_frame(payload: &str) -> Result<Vec<u8>, ProtocolError> {
    let bytes = payload.as_bytes();
    let len = i32::try_from(bytes.len()).map_err(|_| ProtocolError::FrameTooLarge {
        len: bytes.len(),
        max: i32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + bytes.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(bytes);
    Ok(frame)
}

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` when the peer closes before a complete header arrives,
/// which is a clean end of stream. A non-positive or oversized length, a body
/// cut short, or a payload that is not UTF-8 are all fatal.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<String>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match read_header(reader, max_len).await? {
        Some(len) => read_body(reader, len).await.map(Some),
        None => Ok(None),
    }
}

/// Reads and validates a length header. `Ok(None)` on clean end of stream.
pub async fn read_header<R>(reader: &mut R, max_len: usize) -> Result<Option<usize>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = i32::from_le_bytes(header);
    if len <= 0 {
        return Err(ProtocolError::InvalidLength(len));
    }
    let len = len as usize;
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }
    Ok(Some(len))
}

/// Reads exactly `len` payload bytes that follow a header.
pub async fn read_body<R>(reader: &mut R, len: usize) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::Truncated { expected: len });
        }
        Err(e) => return Err(e.into()),
    }

    Ok(String::from_utf8(body)?)
}

/// Writes `payload` as one frame and flushes the writer.
pub async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
