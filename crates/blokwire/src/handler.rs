//! Applies inbound messages to the game model, one at a time.
//!
//! The handler is the only writer of the game model and of the protocol
//! phase. Every guard runs before anything is mutated, so a rejected
//! message leaves the model exactly as it was.
//!
//! | Message       | Guard                               | Events                                          |
//! |---------------|-------------------------------------|-------------------------------------------------|
//! | StartGame     | not started                         | `game_started`                                  |
//! | ServerStatus  | version ≥ 3                         | `server_status`, then `player_joined`/`left`    |
//! | GrantPlayer   | not started                         |                                                 |
//! | RevokePlayer  | not started, seat is local          |                                                 |
//! | CurrentPlayer |                                     | `new_current_player`                            |
//! | SetStone      | started, legal move                 | `stone_will_be_set`, `stone_has_been_set`, ...  |
//! | StoneHint     |                                     | `hint_received`                                 |
//! | UndoStone     | started or finished, history exists | `stone_undone`                                  |
//! | GameFinish    | started, not finished               | `game_finished`                                 |
//! | Chat          | a snapshot was seen (else dropped)  | `chat_received`                                 |

use std::sync::Arc;

use blokwire_protocol::{
    GameMode, Message, ProtocolError, Seat, ServerStatus, Turn,
};

use crate::{
    ClientView, GameModel, HandlerError, ObserverRegistry, Phase, PlayerKind,
};

/// Returns a phase error unless `condition` holds.
fn ensure(
    condition: bool,
    reason: impl FnOnce() -> String,
) -> Result<(), HandlerError> {
    if condition {
        Ok(())
    } else {
        Err(HandlerError::Phase(reason()))
    }
}

/// The client-side state machine.
pub struct MessageHandler<M> {
    model: M,
    observers: Arc<ObserverRegistry>,
    view: ClientView,
    phase: Phase,
    local_seats: [bool; Seat::COUNT],
    last_status: Option<Arc<ServerStatus>>,
}

impl<M: GameModel> MessageHandler<M> {
    pub fn new(model: M, observers: Arc<ObserverRegistry>) -> Self {
        Self::with_view(model, observers, ClientView::default())
    }

    /// Like [`new`](Self::new), mirroring state into an existing view.
    pub fn with_view(
        model: M,
        observers: Arc<ObserverRegistry>,
        view: ClientView,
    ) -> Self {
        Self {
            model,
            observers,
            view,
            phase: Phase::NotStarted,
            local_seats: [false; Seat::COUNT],
            last_status: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    pub fn last_status(&self) -> Option<&ServerStatus> {
        self.last_status.as_deref()
    }

    pub fn is_local_player(&self, seat: Seat) -> bool {
        self.local_seats[seat.index()]
    }

    /// Applies one message.
    ///
    /// # Errors
    /// [`HandlerError::Phase`] when a guard rejects the message,
    /// [`HandlerError::Protocol`] for messages only a server handles or a
    /// status snapshot from an unsupported version.
    pub fn handle(&mut self, message: Message) -> Result<(), HandlerError> {
        tracing::debug!(kind = %message.kind(), "<< received");

        match message {
            Message::StartGame => self.start_game(),
            Message::ServerStatus(status) => self.server_status(status),
            Message::GrantPlayer { seat } => self.grant_player(seat),
            Message::RevokePlayer { seat } => self.revoke_player(seat),
            Message::CurrentPlayer { seat } => {
                self.model.set_current_player(seat);
                self.view.update(|v| v.current_player = seat);
                self.observers.broadcast(|o| o.new_current_player(seat));
                Ok(())
            }
            Message::SetStone(turn) => self.set_stone(turn),
            Message::StoneHint(turn) => {
                self.observers.broadcast(|o| o.hint_received(&turn));
                Ok(())
            }
            Message::UndoStone => self.undo_stone(),
            Message::GameFinish => {
                ensure(self.phase == Phase::Started, || {
                    format!("received GameFinish while {:?}", self.phase)
                })?;
                self.set_phase(Phase::Finished);
                self.observers.broadcast(|o| o.game_finished());
                Ok(())
            }
            Message::Chat { client, text } => {
                self.chat(client, &text);
                Ok(())
            }
            other @ (Message::RequestPlayer { .. }
            | Message::RequestUndo
            | Message::RequestHint { .. }
            | Message::RequestGameMode { .. }) => {
                Err(ProtocolError::UnexpectedMessage(other.kind()).into())
            }
        }
    }

    // ---- transitions ----

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.model.phase_changed(phase);
        self.view.update(|v| v.phase = phase);
    }

    fn start_game(&mut self) -> Result<(), HandlerError> {
        ensure(!self.phase.is_started(), || "game already started".into())?;

        let mode = self.model.game_mode();
        self.model.reset(mode);
        self.model.clear_history();
        self.set_phase(Phase::Started);
        self.model.set_current_player(None);
        self.view.update(|v| v.current_player = None);

        tracing::info!(%mode, "game started");
        self.observers.broadcast(|o| o.game_started());
        Ok(())
    }

    fn server_status(&mut self, status: ServerStatus) -> Result<(), HandlerError> {
        if !status.is_at_least_version(ServerStatus::MIN_SUPPORTED_VERSION) {
            return Err(ProtocolError::UnsupportedVersion {
                required: ServerStatus::MIN_SUPPORTED_VERSION,
                actual: status.version,
            }
            .into());
        }

        if !self.phase.is_started() {
            self.model.start_new_game(
                status.game_mode,
                &status.stone_numbers,
                status.width,
                status.height,
            );
        }
        self.model.set_game_mode(status.game_mode);
        if status.game_mode.is_two_seat() {
            for seat in [1, 3].into_iter().filter_map(Seat::new) {
                self.model.clear_stones(seat);
            }
        }

        let status = Arc::new(status);
        let previous = self.last_status.replace(Arc::clone(&status));
        self.view
            .update(|v| v.last_status = Some(Arc::clone(&status)));

        self.observers.broadcast(|o| o.server_status(&status));

        if let Some(previous) = previous {
            self.diff_seats(&previous, &status);
        }
        Ok(())
    }

    /// Emits join/leave events for seats whose client assignment appeared
    /// or disappeared between two snapshots.
    fn diff_seats(&self, previous: &ServerStatus, current: &ServerStatus) {
        for seat in Seat::all() {
            match (previous.client_for(seat), current.client_for(seat)) {
                (None, Some(client)) => {
                    let name = current.client_name(client);
                    tracing::info!(%seat, client, name, "player joined");
                    self.observers
                        .broadcast(|o| o.player_joined(client, seat, name));
                }
                (Some(client), None) => {
                    let name = previous.client_name(client);
                    tracing::info!(%seat, client, name, "player left");
                    self.observers
                        .broadcast(|o| o.player_left(client, seat, name));
                }
                _ => {}
            }
        }
    }

    fn grant_player(&mut self, seat: Seat) -> Result<(), HandlerError> {
        ensure(!self.phase.is_started(), || {
            format!("received GrantPlayer for {seat} but game is running")
        })?;
        self.set_local(seat, true);
        self.model.set_player_kind(seat, PlayerKind::Local);
        Ok(())
    }

    fn revoke_player(&mut self, seat: Seat) -> Result<(), HandlerError> {
        ensure(!self.phase.is_started(), || {
            format!("received RevokePlayer for {seat} but game is running")
        })?;
        ensure(self.is_local_player(seat), || {
            format!("revoked {seat} is not local")
        })?;
        self.set_local(seat, false);
        self.model.set_player_kind(seat, PlayerKind::Computer);
        Ok(())
    }

    fn set_local(&mut self, seat: Seat, local: bool) {
        self.local_seats[seat.index()] = local;
        self.view.update(|v| v.local_seats[seat.index()] = local);
    }

    fn set_stone(&mut self, turn: Turn) -> Result<(), HandlerError> {
        ensure(self.phase.is_started(), || {
            "received SetStone but game not started".into()
        })?;
        ensure(self.model.is_valid_turn(&turn), || {
            format!("invalid turn {turn}")
        })?;

        self.model.push_history(turn);
        // Observers see the stone before the board does.
        self.observers.broadcast(|o| o.stone_will_be_set(&turn));

        let before = remaining_per_seat(&self.model);
        self.model.apply_turn(&turn);
        self.observers.broadcast(|o| o.stone_has_been_set(&turn));

        let after = remaining_per_seat(&self.model);
        for seat in Seat::all() {
            if before[seat.index()] > 0 && after[seat.index()] == 0 {
                tracing::debug!(%seat, "player out of moves");
                self.observers.broadcast(|o| o.player_is_out_of_moves(seat));
            }
        }
        Ok(())
    }

    fn undo_stone(&mut self) -> Result<(), HandlerError> {
        ensure(self.phase.is_started(), || {
            "received UndoStone but game not running".into()
        })?;
        let mode: GameMode = self.model.game_mode();
        let turn = self
            .model
            .undo_last(mode)
            .ok_or_else(|| HandlerError::Phase("undo with empty history".into()))?;
        self.observers.broadcast(|o| o.stone_undone(&turn));
        Ok(())
    }

    fn chat(&self, client: i8, text: &str) {
        // Without a snapshot there is no way to name the sender.
        let Some(status) = self.last_status.as_deref() else {
            tracing::warn!(client, "dropping chat received before any server status");
            return;
        };
        let seat = u8::try_from(client)
            .ok()
            .and_then(|client| status.seat_of(client));
        self.observers
            .broadcast(|o| o.chat_received(status, client, seat, text));
    }
}

fn remaining_per_seat<M: GameModel>(model: &M) -> [usize; Seat::COUNT] {
    let mut counts = [0; Seat::COUNT];
    for seat in Seat::all() {
        counts[seat.index()] = model.remaining_moves(seat);
    }
    counts
}
