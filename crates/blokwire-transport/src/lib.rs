//! Transport layer for Blokwire.
//!
//! Provides the [`Connector`] and [`Listener`] traits and the byte
//! [`Channel`] they produce, with three connectors:
//!
//! - [`TcpConnector`]: remote stream socket, `host:port` with a connect
//!   timeout (default port [`DEFAULT_PORT`]).
//! - [`LocalConnector`]: local socket addressed by a name in the abstract
//!   namespace (Linux/Android).
//! - [`RfcommConnector`]: insecure RFCOMM socket to [`SERVICE_UUID`] on a
//!   paired radio device.
//!
//! On the accepting side, [`spawn_accept_loop`] runs any [`Listener`]
//! ([`TcpAcceptor`], `LocalAcceptor`, [`RadioListener`]) until it is shut
//! down. Failures are returned as [`TransportError`] values; nothing here
//! panics on a broken peer.

#![allow(async_fn_in_trait)]

mod accept;
mod channel;
mod error;
mod local;
mod radio;
mod tcp;

pub use accept::{AcceptLoopHandle, ShutdownTrigger, spawn_accept_loop};
pub use channel::{
    BoxReader, BoxWriter, Channel, ChannelControl, ChannelId, Link,
    TransportKind,
};
pub use error::TransportError;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use local::LocalAcceptor;
pub use local::LocalConnector;
pub use radio::{
    RadioAdapter, RadioDevice, RadioListener, RfcommConnector, RfcommServer,
    SERVICE_NAME, SERVICE_UUID,
};
pub use tcp::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, TcpAcceptor, TcpConnector};

use std::future::Future;

/// One way of obtaining a [`Channel`] to a server.
///
/// Implementations are picked once by the caller; the client never
/// branches on the concrete kind.
pub trait Connector: Send + Sync {
    /// Opens a new channel. Refusal, timeout and I/O failures come back as
    /// errors, never as panics.
    fn connect(
        &self,
    ) -> impl Future<Output = Result<Channel, TransportError>> + Send;

    /// Address description for logs.
    fn describe(&self) -> String;
}

/// Accepts incoming channels.
pub trait Listener: Send + 'static {
    /// Waits for and accepts the next incoming channel.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Channel, TransportError>> + Send;

    /// Releases the listening socket. Called once when the accept loop
    /// exits.
    fn close(&mut self) {}
}
