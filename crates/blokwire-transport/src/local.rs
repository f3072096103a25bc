//! Local inter-process sockets in the abstract namespace.
//!
//! An abstract socket is addressed by a name, not a filesystem path, and
//! disappears with the last descriptor. Only Linux and Android have them;
//! elsewhere the connector reports [`TransportError::Unsupported`].

use crate::{Channel, Connector, TransportError};

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use abstract_socket::LocalAcceptor;

/// Connects to a local server listening on an abstract socket name.
#[derive(Debug, Clone)]
pub struct LocalConnector {
    name: String,
}

impl LocalConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Connector for LocalConnector {
    async fn connect(&self) -> Result<Channel, TransportError> {
        tracing::debug!(name = %self.name, "connecting to local endpoint");
        connect_abstract(&self.name).await
    }

    fn describe(&self) -> String {
        format!("local:@{}", self.name)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
async fn connect_abstract(name: &str) -> Result<Channel, TransportError> {
    let addr = abstract_socket::address(name)
        .map_err(TransportError::ConnectFailed)?;
    let stream = tokio::task::spawn_blocking(move || {
        std::os::unix::net::UnixStream::connect_addr(&addr)
    })
    .await
    .map_err(|e| TransportError::ConnectFailed(std::io::Error::other(e)))?
    .map_err(TransportError::ConnectFailed)?;

    abstract_socket::channel_from_std(stream, name)
        .map_err(TransportError::ConnectFailed)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
async fn connect_abstract(_name: &str) -> Result<Channel, TransportError> {
    Err(TransportError::Unsupported("abstract local socket"))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod abstract_socket {
    use std::os::unix::net::{SocketAddr, UnixListener as StdUnixListener};
    use std::sync::Arc;

    #[cfg(target_os = "android")]
    use std::os::android::net::SocketAddrExt;
    #[cfg(target_os = "linux")]
    use std::os::linux::net::SocketAddrExt;

    use tokio::net::{UnixListener, UnixStream};

    use crate::channel::{RawSocket, SocketLink};
    use crate::{Channel, Listener, TransportError, TransportKind};

    pub(super) fn address(name: &str) -> std::io::Result<SocketAddr> {
        SocketAddr::from_abstract_name(name.as_bytes())
    }

    pub(super) fn channel_from_std(
        stream: std::os::unix::net::UnixStream,
        name: &str,
    ) -> std::io::Result<Channel> {
        stream.set_nonblocking(true)?;
        let raw = stream.try_clone()?;
        let stream = UnixStream::from_std(stream)?;
        let (reader, writer) = stream.into_split();
        Ok(Channel::new(
            TransportKind::Local,
            format!("@{name}"),
            Box::new(reader),
            Box::new(writer),
            Arc::new(SocketLink::new(RawSocket::Unix(raw))),
        ))
    }

    /// Listens on an abstract socket name.
    #[derive(Debug)]
    pub struct LocalAcceptor {
        listener: UnixListener,
        name: String,
    }

    impl LocalAcceptor {
        /// Binds the abstract name. Must be called inside a runtime.
        pub fn bind(name: impl Into<String>) -> Result<Self, TransportError> {
            let name = name.into();
            let listener = address(&name)
                .and_then(|addr| StdUnixListener::bind_addr(&addr))
                .and_then(|listener| {
                    listener.set_nonblocking(true)?;
                    UnixListener::from_std(listener)
                })
                .map_err(TransportError::AcceptFailed)?;
            tracing::info!(%name, "local acceptor listening");
            Ok(Self { listener, name })
        }
    }

    impl Listener for LocalAcceptor {
        async fn accept(&mut self) -> Result<Channel, TransportError> {
            let (stream, _) = self
                .listener
                .accept()
                .await
                .map_err(TransportError::AcceptFailed)?;
            let stream =
                stream.into_std().map_err(TransportError::AcceptFailed)?;
            channel_from_std(stream, &self.name)
                .map_err(TransportError::AcceptFailed)
        }
    }
}
