//! A read-only mirror of the handler's state, shared with the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use blokwire_protocol::{Seat, ServerStatus};

use crate::Phase;

#[derive(Debug, Default)]
pub(crate) struct ViewState {
    pub(crate) last_status: Option<Arc<ServerStatus>>,
    pub(crate) local_seats: [bool; Seat::COUNT],
    pub(crate) current_player: Option<Seat>,
    pub(crate) phase: Phase,
}

/// What the client knows about the game, as last written by the handler.
///
/// Cloning is cheap; all clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct ClientView {
    state: Arc<Mutex<ViewState>>,
}

impl ClientView {
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut ViewState)) {
        f(&mut self.lock());
    }

    /// The most recent [`ServerStatus`] snapshot.
    pub fn last_status(&self) -> Option<Arc<ServerStatus>> {
        self.lock().last_status.clone()
    }

    pub fn current_player(&self) -> Option<Seat> {
        self.lock().current_player
    }

    pub fn is_local_player(&self, seat: Seat) -> bool {
        self.lock().local_seats[seat.index()]
    }

    /// Whether the seat whose turn it is belongs to this client.
    pub fn is_local_turn(&self) -> bool {
        let state = self.lock();
        state
            .current_player
            .is_some_and(|seat| state.local_seats[seat.index()])
    }

    pub fn local_seats(&self) -> Vec<Seat> {
        let state = self.lock();
        Seat::all().filter(|s| state.local_seats[s.index()]).collect()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }
}
