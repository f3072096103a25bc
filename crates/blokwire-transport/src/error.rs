use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// None of these are protocol faults: they describe a byte channel that
/// could not be opened, broke, or was shut down.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer refused the connection or could not be reached.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The connect attempt did not finish in time.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The radio adapter exists but is switched off.
    #[error("radio adapter is disabled")]
    AdapterDisabled,

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,

    /// The transport is not available on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}
