//! Remote stream sockets: [`TcpConnector`] and [`TcpAcceptor`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::channel::{RawSocket, SocketLink};
use crate::{Channel, Connector, Listener, TransportError, TransportKind};

/// Port the game server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 59995;

/// How long a connect attempt may take before it counts as failed.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Opens a TCP connection to `host:port`. No host means loopback.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: Option<String>,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: Option<String>, port: u16) -> Self {
        Self {
            host,
            port,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn loopback(port: u16) -> Self {
        Self::new(None, port)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::loopback(DEFAULT_PORT)
    }
}

impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Channel, TransportError> {
        let host = self.host();
        tracing::debug!(host, port = self.port, "connecting");

        let stream = tokio::time::timeout(
            self.timeout,
            TcpStream::connect((host, self.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.timeout))?
        .map_err(TransportError::ConnectFailed)?;

        channel_from_tcp(stream).map_err(TransportError::ConnectFailed)
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host(), self.port)
    }
}

/// Builds a channel from a connected stream, keeping a duplicate handle
/// to the socket so the channel can be shut down from outside.
pub(crate) fn channel_from_tcp(
    stream: TcpStream,
) -> std::io::Result<Channel> {
    stream.set_nodelay(true)?;
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".into());

    let std_stream = stream.into_std()?;
    let raw = std_stream.try_clone()?;
    let stream = TcpStream::from_std(std_stream)?;
    let (reader, writer) = stream.into_split();

    Ok(Channel::new(
        TransportKind::Tcp,
        peer,
        Box::new(reader),
        Box::new(writer),
        Arc::new(SocketLink::new(RawSocket::Tcp(raw))),
    ))
}

/// Accepts TCP connections, mostly for hosting on the local network and
/// for tests.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Binds to `addr`, e.g. `"127.0.0.1:0"`.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "tcp acceptor listening");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

impl Listener for TcpAcceptor {
    async fn accept(&mut self) -> Result<Channel, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::debug!(%addr, "accepted tcp connection");
        channel_from_tcp(stream).map_err(TransportError::AcceptFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let connector = TcpConnector::default();
        assert_eq!(connector.host(), "127.0.0.1");
        assert_eq!(connector.port(), 59995);
        assert_eq!(connector.timeout(), Duration::from_secs(5));
        assert_eq!(connector.describe(), "tcp://127.0.0.1:59995");
    }

    #[test]
    fn test_explicit_host_and_timeout() {
        let connector = TcpConnector::new(Some("game.example".into()), 4000)
            .with_timeout(Duration::from_millis(250));
        assert_eq!(connector.host(), "game.example");
        assert_eq!(connector.timeout(), Duration::from_millis(250));
    }
}
