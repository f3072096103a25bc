//! The boundary to the game-rules model.
//!
//! The client never looks inside the board. It drives the model through
//! [`GameModel`] and reacts to its answers.

use blokwire_protocol::{GameMode, Seat, StoneCounts, Turn};
use serde::{Deserialize, Serialize};

/// Coarse game lifecycle. A finished game still counts as started.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Phase {
    #[default]
    NotStarted,
    Started,
    Finished,
}

impl Phase {
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started | Self::Finished)
    }

    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }
}

/// Who moves for a seat, from this client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKind {
    /// Controlled by a player on this device.
    Local,
    /// Controlled by someone else: the server's AI or another client.
    Computer,
}

/// The game state the message handler mutates.
///
/// Implemented by the application. All calls come from a single task, one
/// message at a time.
pub trait GameModel: Send + 'static {
    /// Clears the board for a fresh game of `mode`, keeping its geometry.
    fn reset(&mut self, mode: GameMode);

    /// Rebuilds the board with new geometry and stone availability.
    fn start_new_game(
        &mut self,
        mode: GameMode,
        stones: &StoneCounts,
        width: u8,
        height: u8,
    );

    fn set_game_mode(&mut self, mode: GameMode);

    fn game_mode(&self) -> GameMode;

    /// Called whenever the handler moves to a new phase. Default: no-op.
    fn phase_changed(&mut self, _phase: Phase) {}

    fn set_current_player(&mut self, seat: Option<Seat>);

    fn set_player_kind(&mut self, seat: Seat, kind: PlayerKind);

    /// Makes every shape unavailable to `seat`.
    fn clear_stones(&mut self, seat: Seat);

    /// Move legality against the current board.
    fn is_valid_turn(&self, turn: &Turn) -> bool;

    fn apply_turn(&mut self, turn: &Turn);

    fn push_history(&mut self, turn: Turn);

    fn clear_history(&mut self);

    /// Takes back the last recorded move, returning it, or `None` if the
    /// history is empty.
    fn undo_last(&mut self, mode: GameMode) -> Option<Turn>;

    /// How many legal placements `seat` has left.
    fn remaining_moves(&self, seat: Seat) -> usize;
}
