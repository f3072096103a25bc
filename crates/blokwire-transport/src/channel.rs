//! The bidirectional byte channel every connector produces.

use std::fmt;
use std::net::Shutdown;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};

/// Counter for generating unique channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Read half of a [`Channel`], type-erased over the transport.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a [`Channel`], type-erased over the transport.
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opaque identifier for a channel, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

/// Which connector produced a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Local,
    Radio,
    /// In-process streams, e.g. `tokio::io::duplex`.
    Memory,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tcp => "tcp",
            Self::Local => "local",
            Self::Radio => "radio",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Out-of-band control over the socket behind a channel.
///
/// The reader and writer halves are owned by whoever pumps them; the link
/// lets a third party stop both without holding either half.
pub trait Link: Send + Sync {
    /// Best-effort half-close of the read side. Pending reads return EOF.
    fn shutdown_read(&self);

    /// Closes the socket. Calling it again does nothing.
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// A connected, bidirectional byte channel plus its disposer.
pub struct Channel {
    reader: BoxReader,
    writer: BoxWriter,
    control: ChannelControl,
}

impl Channel {
    /// Assembles a channel from already split halves and a link that can
    /// shut the underlying socket down.
    pub fn new(
        kind: TransportKind,
        peer: impl Into<String>,
        reader: BoxReader,
        writer: BoxWriter,
        link: Arc<dyn Link>,
    ) -> Self {
        let control = ChannelControl {
            id: ChannelId::next(),
            kind,
            peer: peer.into().into(),
            link,
        };
        tracing::debug!(id = %control.id, %kind, peer = %control.peer, "channel opened");
        Self {
            reader,
            writer,
            control,
        }
    }

    /// Wraps any async stream. Closing the channel only marks it closed;
    /// the stream itself is released when both halves are dropped.
    pub fn from_stream<S>(
        kind: TransportKind,
        peer: impl Into<String>,
        stream: S,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(
            kind,
            peer,
            Box::new(reader),
            Box::new(writer),
            Arc::new(FlagLink::default()),
        )
    }

    pub fn id(&self) -> ChannelId {
        self.control.id
    }

    pub fn kind(&self) -> TransportKind {
        self.control.kind
    }

    pub fn peer(&self) -> &str {
        &self.control.peer
    }

    pub fn is_open(&self) -> bool {
        self.control.is_open()
    }

    pub fn close(&self) {
        self.control.close();
    }

    /// A cloneable handle for closing the channel after it is split.
    pub fn control(&self) -> ChannelControl {
        self.control.clone()
    }

    pub fn into_split(self) -> (BoxReader, BoxWriter, ChannelControl) {
        (self.reader, self.writer, self.control)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.control.id)
            .field("kind", &self.control.kind)
            .field("peer", &self.control.peer)
            .finish_non_exhaustive()
    }
}

/// Shared handle to a channel's [`Link`].
#[derive(Clone)]
pub struct ChannelControl {
    id: ChannelId,
    kind: TransportKind,
    peer: Arc<str>,
    link: Arc<dyn Link>,
}

impl ChannelControl {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    pub fn shutdown_read(&self) {
        self.link.shutdown_read();
    }

    pub fn close(&self) {
        if self.link.is_open() {
            tracing::debug!(id = %self.id, kind = %self.kind, "closing channel");
        }
        self.link.close();
    }
}

impl fmt::Debug for ChannelControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelControl")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Link for streams without an out-of-band shutdown.
#[derive(Debug)]
struct FlagLink {
    open: AtomicBool,
}

impl Default for FlagLink {
    fn default() -> Self {
        Self {
            open: AtomicBool::new(true),
        }
    }
}

impl Link for FlagLink {
    fn shutdown_read(&self) {}

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// A duplicate handle to an OS socket, kept only for `shutdown(2)`.
#[derive(Debug)]
pub(crate) enum RawSocket {
    Tcp(std::net::TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl RawSocket {
    fn shutdown(&self, how: Shutdown) -> std::io::Result<()> {
        match self {
            Self::Tcp(s) => s.shutdown(how),
            #[cfg(unix)]
            Self::Unix(s) => s.shutdown(how),
        }
    }
}

/// Link backed by a real socket.
#[derive(Debug)]
pub(crate) struct SocketLink {
    socket: RawSocket,
    open: AtomicBool,
}

impl SocketLink {
    pub(crate) fn new(socket: RawSocket) -> Self {
        Self {
            socket,
            open: AtomicBool::new(true),
        }
    }
}

impl Link for SocketLink {
    fn shutdown_read(&self) {
        if !self.is_open() {
            return;
        }
        if let Err(e) = self.socket.shutdown(Shutdown::Read) {
            tracing::trace!(error = %e, "read shutdown failed");
        }
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        // The peer may already be gone; that is still a close.
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            tracing::trace!(error = %e, "socket shutdown failed");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
