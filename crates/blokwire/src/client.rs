//! The connection manager: one channel, one outbound queue, two pumps.
//!
//! ```text
//!  send() ──► unbounded queue ──► writer pump ──► channel
//!  channel ──► decoder ──► read-ahead (2) ──► handler pump ──► MessageHandler
//! ```
//!
//! Any failure in a pump ends in [`GameClient::disconnect`], which is the
//! only way a connection is torn down.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use blokwire_protocol::{
    GameMode, Message, MessageReader, MessageWriter, ProtocolError, Seat,
    ServerStatus, StoneCounts, StreamError, Turn,
};
use blokwire_transport::{
    BoxReader, BoxWriter, Channel, ChannelControl, Connector, TransportError,
};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    ClientError, ClientView, GameEventObserver, GameModel, MessageHandler,
    ObserverHandle, ObserverRegistry, Phase,
};

/// Decoded frames allowed to wait for the handler.
const READ_AHEAD: usize = 2;

/// Connection state guarded by one lock.
struct ConnState<M> {
    outbound: Option<mpsc::UnboundedSender<Message>>,
    /// Queue consumer, handed to the writer pump on connect.
    queued: Option<mpsc::UnboundedReceiver<Message>>,
    /// Handed to the handler pump on connect.
    handler: Option<MessageHandler<M>>,
    control: Option<ChannelControl>,
    tasks: Vec<JoinHandle<()>>,
    torn_down: bool,
}

struct Inner<M> {
    observers: Arc<ObserverRegistry>,
    view: ClientView,
    state: Mutex<ConnState<M>>,
}

/// A game client bound to at most one connection over its lifetime.
///
/// Messages passed to [`send`](Self::send) before the connection exists
/// are queued and written once it does. Dropping the client disconnects
/// it.
pub struct GameClient<M> {
    inner: Arc<Inner<M>>,
}

impl<M: GameModel> GameClient<M> {
    pub fn new(model: M) -> Self {
        let observers = Arc::new(ObserverRegistry::new());
        let view = ClientView::default();
        let handler =
            MessageHandler::with_view(model, observers.clone(), view.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                observers,
                view,
                state: Mutex::new(ConnState {
                    outbound: Some(tx),
                    queued: Some(rx),
                    handler: Some(handler),
                    control: None,
                    tasks: Vec::new(),
                    torn_down: false,
                }),
            }),
        }
    }

    // ---- observers ----

    /// Registers an observer. Add observers before connecting so no
    /// early event is missed.
    pub fn add_observer(
        &self,
        observer: Arc<dyn GameEventObserver>,
    ) -> ObserverHandle {
        self.inner.observers.add(observer)
    }

    pub fn remove_observer(&self, handle: ObserverHandle) -> bool {
        self.inner.observers.remove(handle)
    }

    // ---- lifecycle ----

    /// Opens a channel through `connector` and binds it.
    ///
    /// On failure observers get `on_connection_failed` and the client is
    /// left as it was. Retrying is up to the caller.
    pub async fn connect<C: Connector>(&self, connector: &C) -> bool {
        let endpoint = connector.describe();

        let busy = {
            let state = self.inner.lock();
            if state.torn_down {
                Some(TransportError::Shutdown)
            } else if state.control.is_some() {
                Some(TransportError::ConnectFailed(std::io::Error::other(
                    "client is already connected",
                )))
            } else {
                None
            }
        };
        if let Some(error) = busy {
            self.inner.connection_failed(&endpoint, &error);
            return false;
        }

        tracing::info!(%endpoint, "connecting");
        match connector.connect().await {
            Ok(channel) => self.connected(channel),
            Err(error) => {
                self.inner.connection_failed(&endpoint, &error);
                false
            }
        }
    }

    /// Binds an already open channel, tells observers the connection is
    /// up, then starts both pumps. `on_connected` therefore precedes every
    /// handler event and the disconnect notification. If an observer
    /// disconnects from inside `on_connected`, the pumps never start.
    ///
    /// Returns `false` (and closes `channel`) if this client already has,
    /// or had, a connection.
    pub fn connected(&self, channel: Channel) -> bool {
        let (reader, writer, control) = channel.into_split();
        let weak = Arc::downgrade(&self.inner);

        let (queued, handler) = {
            let mut state = self.inner.lock();
            let parts = match (state.torn_down, state.control.is_some()) {
                (false, false) => state.queued.take().zip(state.handler.take()),
                _ => None,
            };
            let Some((queued, handler)) = parts else {
                drop(state);
                tracing::warn!(id = %control.id(), "client already used, closing new channel");
                control.close();
                return false;
            };

            state.control = Some(control.clone());
            (queued, handler)
        };

        // Observers hear about the connection before any pump runs, so no
        // handler event or pump failure can overtake `on_connected`.
        tracing::info!(id = %control.id(), kind = %control.kind(), peer = control.peer(), "connected");
        self.inner.observers.broadcast(|o| o.on_connected());

        let mut state = self.inner.lock();
        if state.torn_down {
            tracing::debug!(id = %control.id(), "disconnected before pumps started");
            return true;
        }
        let (ahead_tx, ahead_rx) = mpsc::channel(READ_AHEAD);
        state.tasks = vec![
            tokio::spawn(write_pump(queued, writer, weak.clone())),
            tokio::spawn(decode_pump(reader, ahead_tx)),
            tokio::spawn(handle_pump(ahead_rx, handler, weak)),
        ];
        true
    }

    /// Tears the connection down. Only the first call does anything, and
    /// only if a channel is bound.
    pub fn disconnect(&self, cause: Option<ClientError>) {
        self.inner.disconnect(cause);
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .control
            .as_ref()
            .is_some_and(ChannelControl::is_open)
    }

    /// Queues a message. Dropped silently once the client is torn down.
    pub fn send(&self, message: Message) {
        self.inner.send(message);
    }

    // ---- view ----

    /// Shared view of what the handler knows.
    pub fn view(&self) -> &ClientView {
        &self.inner.view
    }

    pub fn last_status(&self) -> Option<Arc<ServerStatus>> {
        self.inner.view.last_status()
    }

    pub fn current_player(&self) -> Option<Seat> {
        self.inner.view.current_player()
    }

    pub fn is_local_player(&self, seat: Seat) -> bool {
        self.inner.view.is_local_player(seat)
    }

    pub fn phase(&self) -> Phase {
        self.inner.view.phase()
    }

    // ---- requests ----

    /// Asks for `seat`, or any free seat if `None`. Names longer than 16
    /// bytes are cut.
    pub fn request_player(&self, seat: Option<Seat>, name: Option<&str>) {
        self.send(Message::RequestPlayer {
            seat,
            name: name.map(str::to_owned),
        });
    }

    /// Gives up a seat this client controls. Ignored for other seats.
    pub fn revoke_player(&self, seat: Seat) {
        if !self.is_local_player(seat) {
            tracing::debug!(%seat, "not revoking seat that is not local");
            return;
        }
        self.send(Message::RevokePlayer { seat });
    }

    pub fn request_game_mode(
        &self,
        width: u8,
        height: u8,
        game_mode: GameMode,
        stones: StoneCounts,
    ) {
        self.send(Message::RequestGameMode {
            width,
            height,
            game_mode,
            stones,
        });
    }

    /// Asks for a hint for the current player, if that player is local.
    pub fn request_hint(&self) {
        if !self.is_connected() {
            return;
        }
        match self.current_player() {
            Some(seat) if self.is_local_player(seat) => {
                self.send(Message::RequestHint { seat });
            }
            _ => tracing::debug!("no local player to hint"),
        }
    }

    /// Asks the server to take back the last move, if it's our turn.
    pub fn request_undo(&self) {
        if !self.is_connected() || !self.inner.view.is_local_turn() {
            return;
        }
        self.send(Message::RequestUndo);
    }

    /// Sends a chat line. The server fills in the sender and relays it to
    /// every client, this one included.
    ///
    /// # Errors
    /// [`ProtocolError::ChatTooLong`] if `text` exceeds 254 bytes.
    pub fn send_chat(&self, text: &str) -> Result<(), ProtocolError> {
        self.send(Message::chat(0, text)?);
        Ok(())
    }

    /// Submits a move for a local seat. The board is only updated when the
    /// server echoes the stone back; until it names the next player,
    /// nobody is current.
    pub fn place_stone(&self, turn: Turn) {
        self.inner.view.update(|v| v.current_player = None);
        self.send(Message::SetStone(turn));
    }

    pub fn request_game_start(&self) {
        self.send(Message::StartGame);
    }
}

impl<M> Drop for GameClient<M> {
    fn drop(&mut self) {
        self.inner.disconnect(None);
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl<M> Inner<M> {
    fn lock(&self) -> MutexGuard<'_, ConnState<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, message: Message) {
        let state = self.lock();
        let kind = message.kind();
        let queued = state
            .outbound
            .as_ref()
            .is_some_and(|tx| tx.send(message).is_ok());
        if queued {
            tracing::debug!(%kind, ">> queued");
        } else {
            tracing::trace!(%kind, "dropping message after disconnect");
        }
    }

    fn connection_failed(&self, endpoint: &str, error: &TransportError) {
        tracing::warn!(%endpoint, %error, "connection failed");
        self.observers.broadcast(|o| o.on_connection_failed(error));
    }

    fn disconnect(&self, cause: Option<ClientError>) {
        let (control, tasks) = {
            let mut state = self.lock();
            let Some(control) = state.control.take() else {
                return;
            };
            state.torn_down = true;
            // Closes the queue; later sends are dropped.
            state.outbound = None;
            (control, std::mem::take(&mut state.tasks))
        };

        for task in &tasks {
            task.abort();
        }
        control.shutdown_read();
        control.close();

        match &cause {
            Some(error) => tracing::info!(id = %control.id(), %error, "disconnected"),
            None => tracing::info!(id = %control.id(), "disconnected"),
        }
        self.observers
            .broadcast(|o| o.on_disconnected(cause.as_ref()));
        self.observers.clear();
    }
}

// ---------------------------------------------------------------------------
// Pumps
// ---------------------------------------------------------------------------

/// Writes queued messages in order until the queue closes.
async fn write_pump<M>(
    mut queued: mpsc::UnboundedReceiver<Message>,
    writer: BoxWriter,
    client: Weak<Inner<M>>,
) {
    let mut writer = MessageWriter::new(writer);
    while let Some(message) = queued.recv().await {
        match writer.write(&message).await {
            Ok(()) => tracing::debug!(kind = %message.kind(), ">> sent"),
            Err(StreamError::Protocol(error)) => {
                tracing::warn!(kind = %message.kind(), %error, "skipping unencodable message");
            }
            Err(StreamError::Io(error)) => {
                if let Some(client) = client.upgrade() {
                    client.disconnect(Some(TransportError::SendFailed(error).into()));
                }
                return;
            }
        }
    }
}

/// Decodes frames ahead of the handler, at most [`READ_AHEAD`] at a time.
async fn decode_pump(
    reader: BoxReader,
    ahead: mpsc::Sender<Result<Message, ClientError>>,
) {
    let mut frames = Box::pin(MessageReader::new(reader).into_stream());
    while let Some(item) = frames.next().await {
        let item = item.map_err(ClientError::from_read);
        if ahead.send(item).await.is_err() {
            return;
        }
    }
    // Dropping `ahead` tells the handler pump the stream ended.
}

/// Feeds decoded messages to the handler in arrival order.
async fn handle_pump<M: GameModel>(
    mut ahead: mpsc::Receiver<Result<Message, ClientError>>,
    mut handler: MessageHandler<M>,
    client: Weak<Inner<M>>,
) {
    let cause = loop {
        match ahead.recv().await {
            Some(Ok(message)) => {
                if let Err(error) = handler.handle(message) {
                    break ClientError::from(error);
                }
            }
            Some(Err(error)) => break error,
            None => {
                break TransportError::ConnectionClosed(
                    "server closed the connection".into(),
                )
                .into();
            }
        }
    };

    tracing::debug!(error = %cause, "reader stopping");
    if let Some(client) = client.upgrade() {
        client.disconnect(Some(cause));
    }
}
