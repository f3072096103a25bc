//! Error types for the protocol layer.
//!
//! Every variant of [`ProtocolError`] is a *framing* fault: the bytes on
//! the wire do not describe a valid frame or payload. A connection that
//! produces one is broken and gets torn down. [`StreamError`] adds the
//! I/O failures that the stream adapters can hit on top of that.

use crate::MessageType;

/// Errors raised while encoding or decoding frames and payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The header declares a frame shorter than the header itself.
    #[error("invalid header size {0}")]
    InvalidHeaderSize(u16),

    /// The recomputed `check1`/`check2` bytes disagree with the wire.
    #[error("header checksum failed")]
    ChecksumFailed,

    /// The header's type tag is not part of the registry.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// The payload ended before the decoder read everything it needs.
    #[error("truncated {kind} payload: need {needed} bytes, got {actual}")]
    Truncated {
        kind: MessageType,
        needed: usize,
        actual: usize,
    },

    /// The peer speaks a protocol version this client cannot handle.
    #[error("unsupported protocol version {actual} (need at least {required})")]
    UnsupportedVersion { required: u8, actual: u8 },

    /// A seat index outside `0..=3`.
    #[error("invalid seat {0}")]
    InvalidSeat(i8),

    /// A shape id outside the shape catalog.
    #[error("invalid shape {0}")]
    InvalidShape(u8),

    /// A rotation value outside `0..=3`.
    #[error("invalid rotation {0}")]
    InvalidRotation(u8),

    /// A game mode value the registry doesn't know.
    #[error("unknown game mode {0}")]
    UnknownGameMode(u8),

    /// Chat text does not fit the one-byte length field.
    #[error("chat text too long: {len} bytes (max {max})")]
    ChatTooLong { len: usize, max: usize },

    /// The encoded frame would not fit the 16-bit size field.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A well-formed message that the receiving side has no use for.
    #[error("unexpected message {0}")]
    UnexpectedMessage(MessageType),
}

/// Errors raised by [`MessageReader`](crate::MessageReader) and
/// [`MessageWriter`](crate::MessageWriter).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The underlying byte channel failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes read (or the message written) are not a valid frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
