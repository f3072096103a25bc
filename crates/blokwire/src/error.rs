//! Error types for the client.

use blokwire_protocol::{ProtocolError, StreamError};
use blokwire_transport::TransportError;

/// Why a connection was torn down.
///
/// This is the cause handed to
/// [`GameEventObserver::on_disconnected`](crate::GameEventObserver::on_disconnected).
/// `#[from]` lets `?` lift the lower layers' errors into it.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The byte channel failed, timed out, or was closed by the peer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer sent bytes that are not a valid frame or payload.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer sent a well-formed message the current phase forbids.
    #[error("phase violation: {0}")]
    Phase(String),
}

impl ClientError {
    /// Maps a read-side stream failure: I/O becomes a receive failure.
    pub(crate) fn from_read(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => TransportError::ReceiveFailed(e).into(),
            StreamError::Protocol(e) => e.into(),
        }
    }
}

/// Errors returned by [`MessageHandler::handle`](crate::MessageHandler::handle).
///
/// Kept apart from [`ClientError`] so a caller can tell a protocol bug
/// from a peer that is out of step with the game.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A guard in the transition table rejected the message. The game
    /// model was not touched.
    #[error("phase violation: {0}")]
    Phase(String),

    /// The message makes no sense for a client at all.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<HandlerError> for ClientError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Phase(reason) => Self::Phase(reason),
            HandlerError::Protocol(e) => Self::Protocol(e),
        }
    }
}

/// Errors raised while loading a [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
