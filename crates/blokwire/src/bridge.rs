//! Glue between a hosting accept loop and the client's event stream.

use blokwire_transport::ShutdownTrigger;

use crate::{ClientError, GameEventObserver};

/// Stops an accept loop once the game starts or the client disconnects,
/// so no late joiner is accepted into a running game.
#[derive(Debug, Clone)]
pub struct ShutdownOnStart {
    trigger: ShutdownTrigger,
}

impl ShutdownOnStart {
    pub fn new(trigger: ShutdownTrigger) -> Self {
        Self { trigger }
    }
}

impl GameEventObserver for ShutdownOnStart {
    fn game_started(&self) {
        tracing::debug!("game started, stopping accept loop");
        self.trigger.shutdown();
    }

    fn on_disconnected(&self, _cause: Option<&ClientError>) {
        self.trigger.shutdown();
    }
}
