//! Game events and the registry that fans them out.
//!
//! Observers are held strongly and live until they are removed through
//! the [`ObserverHandle`] returned by [`ObserverRegistry::add`], or until
//! the registry is cleared on disconnect.
//!
//! Broadcasts walk the slot list by index without holding the lock while
//! an observer runs, so observers may add or remove observers (themselves
//! included) from inside a callback. Removal only empties a slot; empty
//! slots are compacted once no broadcast is in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use blokwire_protocol::{Seat, ServerStatus, Turn};
use blokwire_transport::TransportError;

use crate::ClientError;

/// Receives game and connection events. Every method defaults to a no-op,
/// so implementors only override what they care about.
///
/// Callbacks run on the client's tasks; keep them short.
pub trait GameEventObserver: Send + Sync {
    fn on_connected(&self) {}

    /// `connect` failed; nothing was bound.
    fn on_connection_failed(&self, _error: &TransportError) {}

    /// The connection is gone. Sent at most once per client; `cause` is
    /// `None` for a requested disconnect.
    fn on_disconnected(&self, _cause: Option<&ClientError>) {}

    fn game_started(&self) {}

    fn server_status(&self, _status: &ServerStatus) {}

    fn player_joined(&self, _client: u8, _seat: Seat, _name: Option<&str>) {}

    fn player_left(&self, _client: u8, _seat: Seat, _name: Option<&str>) {}

    fn new_current_player(&self, _seat: Option<Seat>) {}

    /// Before the stone is applied to the board.
    fn stone_will_be_set(&self, _turn: &Turn) {}

    /// After the stone is applied to the board.
    fn stone_has_been_set(&self, _turn: &Turn) {}

    fn player_is_out_of_moves(&self, _seat: Seat) {}

    fn hint_received(&self, _turn: &Turn) {}

    fn stone_undone(&self, _turn: &Turn) {}

    fn game_finished(&self) {}

    /// A relayed chat line.
    ///
    /// Server-generated text is delivered too, not filtered out: it
    /// arrives with a negative `client` and `seat == None`. Observers that
    /// only want player chat should skip `client < 0`. `seat` is also
    /// `None` for a client that holds no seat. Lines received before the
    /// first [`server_status`](Self::server_status) are never delivered.
    fn chat_received(
        &self,
        _status: &ServerStatus,
        _client: i8,
        _seat: Option<Seat>,
        _text: &str,
    ) {
    }
}

/// Returned by [`ObserverRegistry::add`]; pass it to
/// [`ObserverRegistry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

struct Slot {
    id: u64,
    observer: Option<Arc<dyn GameEventObserver>>,
}

#[derive(Default)]
struct Slots {
    list: Vec<Slot>,
    /// Broadcasts currently walking `list`.
    in_flight: usize,
    /// Set by `clear`; nothing is delivered afterwards.
    closed: bool,
}

impl Slots {
    fn compact(&mut self) {
        if self.in_flight == 0 {
            self.list.retain(|slot| slot.observer.is_some());
        }
    }
}

/// Ordered list of observers.
#[derive(Default)]
pub struct ObserverRegistry {
    slots: Mutex<Slots>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an observer. Observers added to a cleared registry never
    /// receive anything.
    pub fn add(&self, observer: Arc<dyn GameEventObserver>) -> ObserverHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.lock();
        if slots.closed {
            tracing::debug!("observer added after registry was cleared");
            return ObserverHandle(id);
        }
        slots.list.push(Slot {
            id,
            observer: Some(observer),
        });
        ObserverHandle(id)
    }

    /// Empties the observer's slot. Returns `false` if it was already gone.
    pub fn remove(&self, handle: ObserverHandle) -> bool {
        let mut slots = self.lock();
        let removed = slots
            .list
            .iter_mut()
            .find(|slot| slot.id == handle.0)
            .and_then(|slot| slot.observer.take())
            .is_some();
        slots.compact();
        removed
    }

    /// Number of live observers.
    pub fn len(&self) -> usize {
        self.lock()
            .list
            .iter()
            .filter(|slot| slot.observer.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes `event` on every live observer in registration order.
    pub fn broadcast(&self, event: impl Fn(&dyn GameEventObserver)) {
        let _flight = InFlight::enter(self);
        let mut index = 0;
        loop {
            let observer = {
                let slots = self.lock();
                match slots.list.get(index) {
                    Some(slot) => slot.observer.clone(),
                    None => break,
                }
            };
            if let Some(observer) = observer {
                event(observer.as_ref());
            }
            index += 1;
        }
    }

    /// Drops every observer for good.
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.closed = true;
        for slot in &mut slots.list {
            slot.observer = None;
        }
        slots.compact();
    }
}

/// Marks a broadcast in flight; compacts on the way out, even on panic.
struct InFlight<'a> {
    registry: &'a ObserverRegistry,
}

impl<'a> InFlight<'a> {
    fn enter(registry: &'a ObserverRegistry) -> Self {
        registry.lock().in_flight += 1;
        Self { registry }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut slots = self.registry.lock();
        slots.in_flight -= 1;
        slots.compact();
    }
}
