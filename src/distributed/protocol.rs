//! Coordinator/worker wire protocol
//!
//! Messages are serialized with MessagePack (rmp-serde, map encoding so that
//! tagged enums and `serde_json::Value` payloads round-trip) and framed with a
//! length prefix.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Worker                        Coordinator
//!   |                              |
//!   |-------- HELLO -------------->|
//!   |<------- WELCOME -------------|
//!   |                              |
//!   |-------- PULL --------------->|
//!   |<------- TASK / NO_TASK ------|
//!   |                              |
//!   |-------- FINISH(id, outcome)->|
//!   |<------- ACK -----------------|
//!   |            ...               |
//! ```
//!
//! # Message Framing
//!
//! ```text
//! [4 bytes: message length (little-endian u32)][N bytes: MessagePack message]
//! ```

use crate::error::{TransportError, TransportResult};
use crate::task::{Computation, Outcome, Task, TaskId};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Increment this when making breaking changes to the protocol.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 100 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum Message<C: Computation> {
    /// First message on every connection (Worker → Coordinator)
    Hello(HelloMessage),

    /// Handshake accepted (Coordinator → Worker)
    Welcome(WelcomeMessage),

    /// Request the next task (Worker → Coordinator)
    Pull,

    /// A task to execute (Coordinator → Worker)
    Task(Task<C>),

    /// Nothing to hand out right now (Coordinator → Worker)
    ///
    /// `completed` is set once every task has finished; idle workers may
    /// exit when they see it.
    NoTask { completed: bool },

    /// Outcome of an executed task (Worker → Coordinator)
    Finish(FinishMessage<C::Output>),

    /// Finish received (Coordinator → Worker)
    Ack,

    /// Request rejected
    Error(ErrorMessage),
}

impl<C: Computation> Message<C> {
    /// Message name for logs and error reports
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello(_) => "HELLO",
            Message::Welcome(_) => "WELCOME",
            Message::Pull => "PULL",
            Message::Task(_) => "TASK",
            Message::NoTask { .. } => "NO_TASK",
            Message::Finish(_) => "FINISH",
            Message::Ack => "ACK",
            Message::Error(_) => "ERROR",
        }
    }
}

/// Handshake request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Worker identifier (hostname plus loop index)
    pub worker_id: String,
}

/// Handshake response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeMessage {
    pub protocol_version: u32,
}

/// Finished task report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishMessage<R> {
    pub task_id: TaskId,
    pub outcome: Outcome<R>,
}

/// Error report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

/// Serialize a message with its length prefix
pub fn serialize_message<C: Computation>(msg: &Message<C>) -> TransportResult<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec_named(msg)?;

    if msg_bytes.len() > MAX_MESSAGE_LEN {
        return Err(TransportError::FrameTooLarge {
            size: msg_bytes.len(),
            max: MAX_MESSAGE_LEN,
        });
    }

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Deserialize one framed message from the front of `buf`
///
/// Returns `None` if `buf` does not yet hold a complete frame, otherwise the
/// message and the number of bytes it occupied (prefix included).
pub fn deserialize_message<C: Computation>(buf: &[u8]) -> TransportResult<Option<(Message<C>, usize)>> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let msg_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if msg_len > MAX_MESSAGE_LEN {
        return Err(TransportError::FrameTooLarge {
            size: msg_len,
            max: MAX_MESSAGE_LEN,
        });
    }

    if buf.len() < 4 + msg_len {
        return Ok(None);
    }

    let msg = rmp_serde::from_slice(&buf[4..4 + msg_len])?;
    Ok(Some((msg, 4 + msg_len)))
}

/// Read a complete message from a stream
///
/// A clean end-of-stream before the length prefix is reported as
/// `TransportError::Closed`.
pub async fn read_message<C, R>(stream: &mut R) -> TransportResult<Message<C>>
where
    C: Computation,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    if let Err(e) = stream.read_exact(&mut len_buf).await {
        return Err(match e.kind() {
            std::io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(e),
        });
    }

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_LEN {
        return Err(TransportError::FrameTooLarge {
            size: msg_len,
            max: MAX_MESSAGE_LEN,
        });
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream.read_exact(&mut msg_buf).await?;

    Ok(rmp_serde::from_slice(&msg_buf)?)
}

/// Write a message to a stream and flush it
pub async fn write_message<C, W>(stream: &mut W, msg: &Message<C>) -> TransportResult<()>
where
    C: Computation,
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;
    stream.write_all(&framed).await?;
    stream.flush().await?;
    Ok(())
}
