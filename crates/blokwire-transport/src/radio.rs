//! Short-range radio (RFCOMM) sockets.
//!
//! The platform radio stack is reached through two small traits:
//! [`RadioDevice`] for dialing a paired peer and [`RadioAdapter`] for
//! listening. Both speak to the same fixed service identifier so a
//! hosting device and a joining device find each other.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use crate::{Channel, Connector, Listener, TransportError, TransportKind};

/// Service identifier advertised by the hosting device.
pub const SERVICE_UUID: Uuid =
    Uuid::from_u128(0xB4C7_2729_2E7F_48B2_B15C_BDD7_3CED_0D13);

/// Service name registered next to [`SERVICE_UUID`].
pub const SERVICE_NAME: &str = "freebloks";

/// A paired remote device.
pub trait RadioDevice: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Human-readable device name, used as the channel's peer.
    fn name(&self) -> String;

    /// Opens an insecure (unauthenticated) RFCOMM socket to `service`.
    fn connect_insecure_rfcomm(
        &self,
        service: Uuid,
    ) -> impl Future<Output = std::io::Result<Self::Stream>> + Send;
}

/// Dials [`SERVICE_UUID`] on a paired device.
#[derive(Debug, Clone)]
pub struct RfcommConnector<D> {
    device: D,
}

impl<D: RadioDevice> RfcommConnector<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: RadioDevice> Connector for RfcommConnector<D> {
    async fn connect(&self) -> Result<Channel, TransportError> {
        let name = self.device.name();
        tracing::debug!(device = %name, service = %SERVICE_UUID, "connecting over radio");
        let stream = self
            .device
            .connect_insecure_rfcomm(SERVICE_UUID)
            .await
            .map_err(TransportError::ConnectFailed)?;
        Ok(Channel::from_stream(TransportKind::Radio, name, stream))
    }

    fn describe(&self) -> String {
        format!("rfcomm://{}/{}", self.device.name(), SERVICE_UUID)
    }
}

/// A listening RFCOMM server socket.
pub trait RfcommServer: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Waits for the next client, returning its stream and device name.
    fn accept(
        &mut self,
    ) -> impl Future<Output = std::io::Result<(Self::Stream, String)>> + Send;

    /// Releases the server socket.
    fn close(&mut self);
}

/// The local radio adapter.
pub trait RadioAdapter {
    type Server: RfcommServer;

    fn is_enabled(&self) -> bool;

    fn listen_insecure_rfcomm(
        &self,
        name: &str,
        service: Uuid,
    ) -> std::io::Result<Self::Server>;
}

/// Accepts radio clients on [`SERVICE_UUID`].
#[derive(Debug)]
pub struct RadioListener<S> {
    server: S,
}

impl<S: RfcommServer> RadioListener<S> {
    /// Registers the service on `adapter` and starts listening.
    ///
    /// # Errors
    /// [`TransportError::AdapterDisabled`] if the radio is switched off,
    /// [`TransportError::AcceptFailed`] if the service can't be registered.
    pub fn open<A>(adapter: &A) -> Result<Self, TransportError>
    where
        A: RadioAdapter<Server = S>,
    {
        if !adapter.is_enabled() {
            return Err(TransportError::AdapterDisabled);
        }
        let server = adapter
            .listen_insecure_rfcomm(SERVICE_NAME, SERVICE_UUID)
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(service = %SERVICE_UUID, "radio listener started");
        Ok(Self { server })
    }
}

impl<S: RfcommServer> Listener for RadioListener<S> {
    async fn accept(&mut self) -> Result<Channel, TransportError> {
        let (stream, device) = self
            .server
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%device, "radio client connected");
        Ok(Channel::from_stream(TransportKind::Radio, device, stream))
    }

    fn close(&mut self) {
        tracing::info!("radio listener stopped");
        self.server.close();
    }
}
