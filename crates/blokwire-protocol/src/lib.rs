//! Wire protocol for Blokwire.
//!
//! This crate defines the bytes that clients and servers exchange:
//!
//! - **Header** ([`Header`], [`encode_header`], [`decode_header`]): the
//!   fixed 5-byte frame header and its two check bytes.
//! - **Messages** ([`Message`], [`MessageType`]): the closed registry of
//!   message variants with their stable type tags and payload layouts.
//! - **Streams** ([`MessageReader`], [`MessageWriter`]): adapters that
//!   turn an async byte channel into a sequence of messages and back.
//! - **Errors** ([`ProtocolError`], [`StreamError`]).
//!
//! # Frame layout
//!
//! ```text
//! [check1:1][size:2 BE][rawType:1][check2:1][payload: size-5 bytes]
//! ```
//!
//! The protocol layer knows nothing about sockets or game rules. It only
//! turns messages into frames and frames into messages.
//!
//! # Example
//!
//! ```rust
//! use blokwire_protocol::{Message, Seat, HEADER_SIZE, decode_header};
//!
//! let seat = Seat::new(3).unwrap();
//! let frame = Message::GrantPlayer { seat }.encode().unwrap();
//!
//! let header = decode_header(frame[..HEADER_SIZE].try_into().unwrap()).unwrap();
//! let decoded = Message::decode(header.raw_type(), &frame[HEADER_SIZE..]).unwrap();
//! assert_eq!(decoded, Message::GrantPlayer { seat });
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod header;
mod io;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::{ProtocolError, StreamError};
pub use header::{HEADER_SIZE, Header, decode_header, encode_header};
pub use io::{MessageReader, MessageWriter};
pub use message::{MAX_CHAT_LEN, Message, MessageType};
pub use types::{
    GameMode, MAX_CLIENTS, NAME_LEN, Rotation, SHAPE_COUNT, Seat,
    ServerStatus, StoneCounts, Turn,
};
