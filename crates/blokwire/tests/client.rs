use std::sync::{Arc, Mutex};
use std::time::Duration;

use blokwire::prelude::*;
use blokwire::ShutdownOnStart;
use blokwire_protocol::{MessageReader, MessageWriter, encode_header};
use blokwire_transport::{
    BoxReader, BoxWriter, Listener, TcpAcceptor, TransportKind,
    spawn_accept_loop,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Board that accepts every turn; moves and history are shared with the
/// test so they can be inspected after the model moved into the client.
#[derive(Clone, Default)]
struct SharedBoard {
    applied: Arc<Mutex<Vec<Turn>>>,
    mode: GameMode,
}

impl GameModel for SharedBoard {
    fn reset(&mut self, mode: GameMode) {
        self.mode = mode;
    }
    fn start_new_game(&mut self, mode: GameMode, _: &StoneCounts, _: u8, _: u8) {
        self.mode = mode;
    }
    fn set_game_mode(&mut self, mode: GameMode) {
        self.mode = mode;
    }
    fn game_mode(&self) -> GameMode {
        self.mode
    }
    fn set_current_player(&mut self, _: Option<Seat>) {}
    fn set_player_kind(&mut self, _: Seat, _: PlayerKind) {}
    fn clear_stones(&mut self, _: Seat) {}
    fn is_valid_turn(&self, _: &Turn) -> bool {
        true
    }
    fn apply_turn(&mut self, turn: &Turn) {
        self.applied.lock().unwrap().push(*turn);
    }
    fn push_history(&mut self, _: Turn) {}
    fn clear_history(&mut self) {}
    fn undo_last(&mut self, _: GameMode) -> Option<Turn> {
        self.applied.lock().unwrap().pop()
    }
    fn remaining_moves(&self, _: Seat) -> usize {
        10
    }
}

/// Forwards events to the test as strings.
struct Events(mpsc::UnboundedSender<String>);

impl Events {
    fn emit(&self, event: impl Into<String>) {
        let _ = self.0.send(event.into());
    }
}

impl GameEventObserver for Events {
    fn on_connected(&self) {
        self.emit("connected");
    }
    fn on_connection_failed(&self, error: &TransportError) {
        self.emit(format!("connection_failed {error}"));
    }
    fn on_disconnected(&self, cause: Option<&ClientError>) {
        let cause = match cause {
            None => "none",
            Some(ClientError::Transport(_)) => "transport",
            Some(ClientError::Protocol(_)) => "protocol",
            Some(ClientError::Phase(_)) => "phase",
        };
        self.emit(format!("disconnected {cause}"));
    }
    fn game_started(&self) {
        self.emit("started");
    }
    fn server_status(&self, _: &ServerStatus) {
        self.emit("status");
    }
    fn player_joined(&self, client: u8, seat: Seat, name: Option<&str>) {
        self.emit(format!("joined {client} {seat} {}", name.unwrap_or("-")));
    }
    fn new_current_player(&self, seat: Option<Seat>) {
        self.emit(format!("current {seat:?}"));
    }
    fn stone_has_been_set(&self, turn: &Turn) {
        self.emit(format!("set {}", turn.shape));
    }
    fn chat_received(&self, _: &ServerStatus, client: i8, _: Option<Seat>, text: &str) {
        self.emit(format!("chat {client} {text}"));
    }
}

/// Logs to the test output; `RUST_LOG=blokwire=debug` shows the pumps.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

struct Harness {
    client: GameClient<SharedBoard>,
    board: SharedBoard,
    events: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let board = SharedBoard::default();
        let client = GameClient::new(board.clone());
        let (tx, events) = mpsc::unbounded_channel();
        client.add_observer(Arc::new(Events(tx)));
        Self {
            client,
            board,
            events,
        }
    }

    async fn next_event(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    /// Connects over an in-memory pipe and returns the server's halves.
    fn connect_memory(&self) -> (MessageReader<BoxReader>, MessageWriter<BoxWriter>) {
        let (client_end, server_end) = tokio::io::duplex(4096);
        assert!(self.client.connected(Channel::from_stream(
            TransportKind::Memory,
            "server",
            client_end,
        )));
        let (reader, writer, _) =
            Channel::from_stream(TransportKind::Memory, "client", server_end)
                .into_split();
        (MessageReader::new(reader), MessageWriter::new(writer))
    }
}

fn seat(index: u8) -> Seat {
    Seat::new(index).unwrap()
}

fn status_with_seat0(client: Option<u8>) -> ServerStatus {
    let mut status = ServerStatus::default();
    status.client_for_player[0] = client;
    status.client_names[0] = Some("Ada".into());
    status
}

// ---------------------------------------------------------------------------
// TCP end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_tcp_session_end_to_end() {
    let mut acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let port = acceptor.local_addr().unwrap().port();
    let mut h = Harness::new();

    // Queued before any connection exists.
    h.client.request_player(Some(seat(0)), Some("Ada"));

    let connector = TcpConnector::loopback(port);
    let (connected, server) =
        tokio::join!(h.client.connect(&connector), acceptor.accept());
    assert!(connected);
    assert!(h.client.is_connected());
    assert_eq!(h.next_event().await, "connected");

    let (reader, writer, _) = server.unwrap().into_split();
    let mut from_client = MessageReader::new(reader);
    let mut to_client = MessageWriter::new(writer);

    assert_eq!(
        from_client.read().await.unwrap(),
        Some(Message::RequestPlayer {
            seat: Some(seat(0)),
            name: Some("Ada".into())
        })
    );

    for message in [
        Message::ServerStatus(status_with_seat0(None)),
        Message::ServerStatus(status_with_seat0(Some(0))),
        Message::GrantPlayer { seat: seat(0) },
        Message::StartGame,
        Message::CurrentPlayer { seat: Some(seat(0)) },
    ] {
        to_client.write(&message).await.unwrap();
    }
    assert_eq!(h.next_event().await, "status");
    assert_eq!(h.next_event().await, "status");
    assert_eq!(h.next_event().await, "joined 0 seat-0 Ada");
    assert_eq!(h.next_event().await, "started");
    assert_eq!(h.next_event().await, format!("current {:?}", Some(seat(0))));

    assert!(h.client.is_local_player(seat(0)));
    assert_eq!(h.client.phase(), Phase::Started);
    assert_eq!(h.client.current_player(), Some(seat(0)));

    // Local player's turn: hint and undo requests go out, in order.
    h.client.request_hint();
    h.client.request_undo();
    let turn = Turn::new(seat(0), 7, false, Rotation::Right, 3, 4).unwrap();
    h.client.place_stone(turn);
    assert_eq!(h.client.current_player(), None);

    assert_eq!(
        from_client.read().await.unwrap(),
        Some(Message::RequestHint { seat: seat(0) })
    );
    assert_eq!(from_client.read().await.unwrap(), Some(Message::RequestUndo));
    assert_eq!(
        from_client.read().await.unwrap(),
        Some(Message::SetStone(turn))
    );

    to_client.write(&Message::SetStone(turn)).await.unwrap();
    assert_eq!(h.next_event().await, "set 7");
    assert_eq!(*h.board.applied.lock().unwrap(), [turn]);

    // Peer hangs up.
    drop(to_client);
    drop(from_client);
    assert_eq!(h.next_event().await, "disconnected transport");
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn test_connect_failure_is_reported_and_client_stays_usable() {
    let port = {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        acceptor.local_addr().unwrap().port()
    };
    let mut h = Harness::new();

    assert!(!h.client.connect(&TcpConnector::loopback(port)).await);
    assert!(h.next_event().await.starts_with("connection_failed"));
    assert!(!h.client.is_connected());

    // Nothing was bound, so a later attempt can still succeed.
    let _ = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");
}

// ---------------------------------------------------------------------------
// Disconnect semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_disconnect_twice_notifies_once() {
    let mut h = Harness::new();
    let (_reader, _writer) = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");

    h.client.disconnect(None);
    h.client.disconnect(None);
    assert_eq!(h.next_event().await, "disconnected none");

    // The registry was cleared, so the observer was dropped and its
    // sender with it.
    assert_eq!(h.events.recv().await, None);
}

#[tokio::test]
async fn test_send_after_disconnect_never_hits_the_wire() {
    let mut h = Harness::new();
    let (mut from_client, _writer) = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");

    h.client.request_game_start();
    assert_eq!(from_client.read().await.unwrap(), Some(Message::StartGame));

    h.client.disconnect(None);
    h.client.request_game_start();
    h.client.send_chat("anyone?").unwrap();

    // The client's end of the pipe is gone: clean EOF, nothing else.
    assert_eq!(from_client.read().await.unwrap(), None);
}

#[tokio::test]
async fn test_disconnect_without_connection_is_noop() {
    let mut h = Harness::new();
    h.client.disconnect(None);
    assert!(h.events.try_recv().is_err());

    // Still connectable afterwards.
    let _ = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");
}

#[tokio::test]
async fn test_client_serves_only_one_connection() {
    let mut h = Harness::new();
    let _first = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");

    let (second, _peer) = tokio::io::duplex(64);
    let channel = Channel::from_stream(TransportKind::Memory, "again", second);
    let control = channel.control();
    assert!(!h.client.connected(channel));
    assert!(!control.is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_connected_precedes_events_from_an_eager_peer() {
    let frame = Message::ServerStatus(ServerStatus::default())
        .encode()
        .unwrap();

    for _ in 0..200 {
        let mut h = Harness::new();
        let (client_end, mut server_end) = tokio::io::duplex(4096);
        // The peer has spoken and hung up before the client binds.
        server_end.write_all(&frame).await.unwrap();
        drop(server_end);

        assert!(h.client.connected(Channel::from_stream(
            TransportKind::Memory,
            "server",
            client_end,
        )));
        assert_eq!(h.next_event().await, "connected");
        assert_eq!(h.next_event().await, "status");
        assert_eq!(h.next_event().await, "disconnected transport");
    }
}

// ---------------------------------------------------------------------------
// Faults from the peer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_bad_checksum_disconnects_with_protocol_cause() {
    let mut h = Harness::new();
    let (client_end, mut server_end) = tokio::io::duplex(64);
    h.client
        .connected(Channel::from_stream(TransportKind::Memory, "server", client_end));
    assert_eq!(h.next_event().await, "connected");

    let mut header = encode_header(4, 5);
    header[4] ^= 0x10;
    server_end.write_all(&header).await.unwrap();

    assert_eq!(h.next_event().await, "disconnected protocol");
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn test_stone_before_start_disconnects_with_phase_cause() {
    let mut h = Harness::new();
    let (_reader, mut to_client) = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");

    let turn = Turn::new(seat(1), 0, false, Rotation::None, 0, 0).unwrap();
    to_client.write(&Message::SetStone(turn)).await.unwrap();

    assert_eq!(h.next_event().await, "disconnected phase");
    assert!(h.board.applied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_server_chat_is_delivered_after_status() {
    let mut h = Harness::new();
    let (_reader, mut to_client) = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");

    to_client.write(&Message::chat(-1, "early").unwrap()).await.unwrap();
    to_client
        .write(&Message::ServerStatus(ServerStatus::default()))
        .await
        .unwrap();
    to_client.write(&Message::chat(-1, "welcome").unwrap()).await.unwrap();

    assert_eq!(h.next_event().await, "status");
    assert_eq!(h.next_event().await, "chat -1 welcome");
    assert!(h.client.last_status().is_some());
}

// ---------------------------------------------------------------------------
// Request guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_guarded_requests_are_not_sent_for_remote_seats() {
    let mut h = Harness::new();
    let (mut from_client, _writer) = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");

    // Nothing is local and nobody is current.
    h.client.revoke_player(seat(2));
    h.client.request_hint();
    h.client.request_undo();
    h.client.request_game_start();

    assert_eq!(from_client.read().await.unwrap(), Some(Message::StartGame));
}

#[tokio::test]
async fn test_hint_and_undo_need_a_connection() {
    let h = Harness::new();
    h.client.request_hint();
    h.client.request_undo();
    h.client.request_game_mode(14, 14, GameMode::Junior, GameMode::Junior.default_stones());

    let (mut from_client, _writer) = h.connect_memory();
    assert_eq!(
        from_client.read().await.unwrap(),
        Some(Message::RequestGameMode {
            width: 14,
            height: 14,
            game_mode: GameMode::Junior,
            stones: GameMode::Junior.default_stones(),
        })
    );
}

// ---------------------------------------------------------------------------
// Hosting bridge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_accept_loop_stops_when_game_starts() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let accept_loop = spawn_accept_loop(acceptor, |_| {});

    let mut h = Harness::new();
    h.client
        .add_observer(Arc::new(ShutdownOnStart::new(accept_loop.trigger())));
    let (_reader, mut to_client) = h.connect_memory();
    assert_eq!(h.next_event().await, "connected");

    to_client.write(&Message::StartGame).await.unwrap();
    assert_eq!(h.next_event().await, "started");

    tokio::time::timeout(Duration::from_secs(5), accept_loop.join())
        .await
        .expect("accept loop kept running");
}
