//! # Blokwire
//!
//! Client side of the Blokwire board-game protocol.
//!
//! A [`GameClient`] owns one connection obtained from any
//! [`Connector`](blokwire_transport::Connector), writes queued requests in
//! order, and feeds every inbound message through a [`MessageHandler`]
//! that updates the application's [`GameModel`] and notifies registered
//! [`GameEventObserver`]s.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blokwire::prelude::*;
//!
//! # struct Board;
//! # impl GameModel for Board {
//! #     fn reset(&mut self, _: GameMode) {}
//! #     fn start_new_game(&mut self, _: GameMode, _: &StoneCounts, _: u8, _: u8) {}
//! #     fn set_game_mode(&mut self, _: GameMode) {}
//! #     fn game_mode(&self) -> GameMode { GameMode::default() }
//! #     fn set_current_player(&mut self, _: Option<Seat>) {}
//! #     fn set_player_kind(&mut self, _: Seat, _: PlayerKind) {}
//! #     fn clear_stones(&mut self, _: Seat) {}
//! #     fn is_valid_turn(&self, _: &Turn) -> bool { true }
//! #     fn apply_turn(&mut self, _: &Turn) {}
//! #     fn push_history(&mut self, _: Turn) {}
//! #     fn clear_history(&mut self) {}
//! #     fn undo_last(&mut self, _: GameMode) -> Option<Turn> { None }
//! #     fn remaining_moves(&self, _: Seat) -> usize { 0 }
//! # }
//! struct Printer;
//! impl GameEventObserver for Printer {
//!     fn game_started(&self) {
//!         println!("go!");
//!     }
//! }
//!
//! # async fn run() {
//! let config = ClientConfig::default();
//! let client = GameClient::new(Board);
//! client.add_observer(Arc::new(Printer));
//!
//! if client.connect(&config.tcp_connector()).await {
//!     client.request_player(None, config.player_name.as_deref());
//!     client.request_game_start();
//! }
//! # }
//! ```

mod bridge;
mod client;
mod config;
mod error;
mod handler;
mod model;
mod observer;
mod view;

pub use bridge::ShutdownOnStart;
pub use client::GameClient;
pub use config::ClientConfig;
pub use error::{ClientError, ConfigError, HandlerError};
pub use handler::MessageHandler;
pub use model::{GameModel, Phase, PlayerKind};
pub use observer::{GameEventObserver, ObserverHandle, ObserverRegistry};
pub use view::ClientView;

/// Re-exports of the commonly used types from every layer.
pub mod prelude {
    pub use crate::{
        ClientConfig, ClientError, GameClient, GameEventObserver, GameModel,
        HandlerError, MessageHandler, ObserverHandle, Phase, PlayerKind,
    };
    pub use blokwire_protocol::{
        GameMode, Message, ProtocolError, Rotation, Seat, ServerStatus,
        StoneCounts, Turn,
    };
    pub use blokwire_transport::{
        Channel, Connector, LocalConnector, RfcommConnector, TcpConnector,
        TransportError,
    };
}
