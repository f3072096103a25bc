//! The message registry: a closed set of variants with stable type tags.
//!
//! [`Message::encode`] writes a complete frame (header + payload) and
//! [`Message::decode`] dispatches a payload to the matching variant's
//! decoder. The tag values and payload layouts are shared with the peer
//! implementation; changing either breaks compatibility.

use std::fmt;

use crate::header::{HEADER_SIZE, Header};
use crate::types::{
    GameMode, MAX_CLIENTS, NAME_LEN, Rotation, SHAPE_COUNT, Seat,
    ServerStatus, StoneCounts, Turn,
};
use crate::ProtocolError;

/// Longest chat text (in UTF-8 bytes) the length byte can describe.
pub const MAX_CHAT_LEN: usize = 254;

/// Legacy per-size stone counts still present in some layouts.
const LEGACY_STONE_BYTES: usize = 5;

const TURN_LEN: usize = 6;
const REQUEST_PLAYER_LEN: usize = 1 + NAME_LEN;
const REQUEST_GAME_MODE_LEN: usize = 2 + LEGACY_STONE_BYTES + 1 + SHAPE_COUNT;
const SERVER_STATUS_LEN: usize = 3
    + 2
    + LEGACY_STONE_BYTES
    + 1
    + Seat::COUNT
    + MAX_CLIENTS * NAME_LEN
    + 2
    + SHAPE_COUNT;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Type tag carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    RequestPlayer = 0,
    GrantPlayer = 1,
    CurrentPlayer = 2,
    SetStone = 3,
    StartGame = 4,
    GameFinish = 5,
    ServerStatus = 6,
    Chat = 7,
    RequestUndo = 8,
    UndoStone = 9,
    RequestHint = 10,
    StoneHint = 11,
    RequestGameMode = 12,
    RevokePlayer = 13,
}

impl MessageType {
    pub fn from_raw(raw: u8) -> Result<Self, ProtocolError> {
        let kind = match raw {
            0 => Self::RequestPlayer,
            1 => Self::GrantPlayer,
            2 => Self::CurrentPlayer,
            3 => Self::SetStone,
            4 => Self::StartGame,
            5 => Self::GameFinish,
            6 => Self::ServerStatus,
            7 => Self::Chat,
            8 => Self::RequestUndo,
            9 => Self::UndoStone,
            10 => Self::RequestHint,
            11 => Self::StoneHint,
            12 => Self::RequestGameMode,
            13 => Self::RevokePlayer,
            other => return Err(ProtocolError::UnknownMessageType(other)),
        };
        Ok(kind)
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Every message either side can put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client asks for a seat. `None` lets the server pick a free one.
    RequestPlayer {
        seat: Option<Seat>,
        name: Option<String>,
    },
    /// Server hands a seat to this client.
    GrantPlayer { seat: Seat },
    /// Whose turn it is; `None` while nobody may move.
    CurrentPlayer { seat: Option<Seat> },
    SetStone(Turn),
    StartGame,
    GameFinish,
    ServerStatus(ServerStatus),
    /// Chat relayed by the server. Negative client ids are server text.
    Chat { client: i8, text: String },
    RequestUndo,
    UndoStone,
    RequestHint { seat: Seat },
    /// Advisory move suggested by the server.
    StoneHint(Turn),
    RequestGameMode {
        width: u8,
        height: u8,
        game_mode: GameMode,
        stones: StoneCounts,
    },
    /// Either direction: give up a seat, or the server took it away.
    RevokePlayer { seat: Seat },
}

impl Message {
    /// Builds a chat message, rejecting text the length byte can't carry.
    pub fn chat(
        client: i8,
        text: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let text = text.into();
        check_chat_len(&text)?;
        Ok(Self::Chat { client, text })
    }

    pub fn kind(&self) -> MessageType {
        match self {
            Self::RequestPlayer { .. } => MessageType::RequestPlayer,
            Self::GrantPlayer { .. } => MessageType::GrantPlayer,
            Self::CurrentPlayer { .. } => MessageType::CurrentPlayer,
            Self::SetStone(_) => MessageType::SetStone,
            Self::StartGame => MessageType::StartGame,
            Self::GameFinish => MessageType::GameFinish,
            Self::ServerStatus(_) => MessageType::ServerStatus,
            Self::Chat { .. } => MessageType::Chat,
            Self::RequestUndo => MessageType::RequestUndo,
            Self::UndoStone => MessageType::UndoStone,
            Self::RequestHint { .. } => MessageType::RequestHint,
            Self::StoneHint(_) => MessageType::StoneHint,
            Self::RequestGameMode { .. } => MessageType::RequestGameMode,
            Self::RevokePlayer { .. } => MessageType::RevokePlayer,
        }
    }

    /// Encodes the message as a complete frame.
    ///
    /// # Errors
    /// [`ProtocolError::ChatTooLong`] for oversized chat text,
    /// [`ProtocolError::FrameTooLarge`] if the frame overflows the
    /// 16-bit size field.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut payload = Vec::new();
        self.write_payload(&mut payload)?;

        let size = HEADER_SIZE + payload.len();
        let size = u16::try_from(size).map_err(|_| {
            ProtocolError::FrameTooLarge {
                size,
                max: usize::from(u16::MAX),
            }
        })?;

        let mut frame = Vec::with_capacity(usize::from(size));
        frame.extend_from_slice(&Header::new(self.kind().raw(), size).encode());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decodes a payload for the given header type tag.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownMessageType`] for tags outside the
    /// registry, otherwise whatever the variant's decoder rejects.
    pub fn decode(raw_type: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let kind = MessageType::from_raw(raw_type)?;
        let mut r = PayloadReader::new(kind, payload);

        let message = match kind {
            MessageType::RequestPlayer => {
                r.require(REQUEST_PLAYER_LEN)?;
                let seat = Seat::optional_from_wire(r.u8())?;
                let name = read_name(&mut r);
                Self::RequestPlayer { seat, name }
            }
            MessageType::GrantPlayer => {
                r.require(1)?;
                Self::GrantPlayer {
                    seat: Seat::from_wire(r.u8())?,
                }
            }
            MessageType::CurrentPlayer => {
                r.require(1)?;
                Self::CurrentPlayer {
                    seat: Seat::optional_from_wire(r.u8())?,
                }
            }
            MessageType::SetStone => Self::SetStone(read_turn(&mut r)?),
            MessageType::StartGame => Self::StartGame,
            MessageType::GameFinish => Self::GameFinish,
            MessageType::ServerStatus => {
                Self::ServerStatus(read_server_status(&mut r)?)
            }
            MessageType::Chat => read_chat(&mut r)?,
            MessageType::RequestUndo => Self::RequestUndo,
            MessageType::UndoStone => Self::UndoStone,
            MessageType::RequestHint => {
                r.require(1)?;
                Self::RequestHint {
                    seat: Seat::from_wire(r.u8())?,
                }
            }
            MessageType::StoneHint => Self::StoneHint(read_turn(&mut r)?),
            MessageType::RequestGameMode => {
                r.require(REQUEST_GAME_MODE_LEN)?;
                let width = r.u8();
                let height = r.u8();
                r.skip(LEGACY_STONE_BYTES);
                let game_mode = GameMode::from_raw(r.u8())?;
                let stones = r.array();
                Self::RequestGameMode {
                    width,
                    height,
                    game_mode,
                    stones,
                }
            }
            MessageType::RevokePlayer => {
                r.require(1)?;
                Self::RevokePlayer {
                    seat: Seat::from_wire(r.u8())?,
                }
            }
        };

        if r.remaining() > 0 && kind != MessageType::Chat {
            tracing::trace!(
                %kind,
                excess = r.remaining(),
                "ignoring trailing payload bytes"
            );
        }
        Ok(message)
    }

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        match self {
            Self::RequestPlayer { seat, name } => {
                out.push(Seat::optional_to_wire(*seat));
                write_name(out, name.as_deref());
            }
            Self::GrantPlayer { seat }
            | Self::RequestHint { seat }
            | Self::RevokePlayer { seat } => out.push(u8::from(*seat)),
            Self::CurrentPlayer { seat } => {
                out.push(Seat::optional_to_wire(*seat));
            }
            Self::SetStone(turn) | Self::StoneHint(turn) => {
                write_turn(out, turn);
            }
            Self::StartGame
            | Self::GameFinish
            | Self::RequestUndo
            | Self::UndoStone => {}
            Self::ServerStatus(status) => write_server_status(out, status),
            Self::Chat { client, text } => {
                check_chat_len(text)?;
                out.push(*client as u8);
                out.push(text.len() as u8);
                out.extend_from_slice(text.as_bytes());
                out.push(0);
            }
            Self::RequestGameMode {
                width,
                height,
                game_mode,
                stones,
            } => {
                out.push(*width);
                out.push(*height);
                out.extend_from_slice(&[0; LEGACY_STONE_BYTES]);
                out.push(game_mode.raw());
                out.extend_from_slice(stones);
            }
        }
        Ok(())
    }
}

fn check_chat_len(text: &str) -> Result<(), ProtocolError> {
    if text.len() > MAX_CHAT_LEN {
        return Err(ProtocolError::ChatTooLong {
            len: text.len(),
            max: MAX_CHAT_LEN,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// Forward-only cursor over a payload. Reads past the end are prevented by
/// calling [`PayloadReader::require`] first.
struct PayloadReader<'a> {
    kind: MessageType,
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(kind: MessageType, data: &'a [u8]) -> Self {
        Self { kind, data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn require(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.remaining() < needed {
            return Err(ProtocolError::Truncated {
                kind: self.kind,
                needed: self.pos + needed,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> u8 {
        let byte = self.data[self.pos];
        self.pos += 1;
        byte
    }

    fn bytes(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(self.bytes(N));
        out
    }

    fn skip(&mut self, len: usize) {
        self.pos += len;
    }

    fn rest(&mut self) -> &'a [u8] {
        let remaining = self.remaining();
        self.bytes(remaining)
    }
}

fn read_turn(r: &mut PayloadReader<'_>) -> Result<Turn, ProtocolError> {
    r.require(TURN_LEN)?;
    let seat = Seat::from_wire(r.u8())?;
    let shape = r.u8();
    let mirrored = r.u8() == 1;
    let rotation = Rotation::from_raw(r.u8())?;
    let x = r.u8() as i8;
    let y = r.u8() as i8;
    Turn::new(seat, shape, mirrored, rotation, x, y)
}

fn write_turn(out: &mut Vec<u8>, turn: &Turn) {
    out.extend_from_slice(&[
        u8::from(turn.seat),
        turn.shape,
        u8::from(turn.mirrored),
        turn.rotation.raw(),
        turn.x as u8,
        turn.y as u8,
    ]);
}

/// Reads a NUL-padded name field. Empty names decode as `None`.
fn read_name(r: &mut PayloadReader<'_>) -> Option<String> {
    let field = r.bytes(NAME_LEN);
    let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    let name = String::from_utf8_lossy(&field[..end]);
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Writes a name into a NUL-padded field, cutting it on a character
/// boundary if it is too long.
fn write_name(out: &mut Vec<u8>, name: Option<&str>) {
    let name = name.unwrap_or("");
    let mut end = name.len().min(NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let mut field = [0u8; NAME_LEN];
    field[..end].copy_from_slice(&name.as_bytes()[..end]);
    out.extend_from_slice(&field);
}

fn read_chat(r: &mut PayloadReader<'_>) -> Result<Message, ProtocolError> {
    r.require(2)?;
    let client = r.u8() as i8;
    let len = usize::from(r.u8());
    r.require(len)?;
    let bytes = r.bytes(len);

    // Peers pad with at least one byte, sometimes more.
    let excess = r.rest();
    if excess.iter().any(|&b| b != 0) {
        tracing::trace!(excess = excess.len(), "ignoring excess chat bytes");
    }

    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_end_matches(|c: char| c.is_whitespace() || c.is_control());
    Ok(Message::Chat {
        client,
        text: text.to_string(),
    })
}

fn read_server_status(
    r: &mut PayloadReader<'_>,
) -> Result<ServerStatus, ProtocolError> {
    r.require(SERVER_STATUS_LEN)?;
    let players = r.u8();
    let computers = r.u8();
    let clients = r.u8();
    let width = r.u8();
    let height = r.u8();
    r.skip(LEGACY_STONE_BYTES);
    let game_mode_raw = r.u8();

    let mut client_for_player = [None; Seat::COUNT];
    for slot in &mut client_for_player {
        let client = r.u8() as i8;
        *slot = u8::try_from(client).ok();
    }

    let mut client_names: [Option<String>; MAX_CLIENTS] = Default::default();
    for name in &mut client_names {
        *name = read_name(r);
    }

    let version = r.u8();
    let min_version = r.u8();
    if version < ServerStatus::MIN_SUPPORTED_VERSION {
        return Err(ProtocolError::UnsupportedVersion {
            required: ServerStatus::MIN_SUPPORTED_VERSION,
            actual: version,
        });
    }
    let stone_numbers = r.array();

    Ok(ServerStatus {
        players,
        computers,
        clients,
        width,
        height,
        game_mode: GameMode::from_raw(game_mode_raw)?,
        client_for_player,
        client_names,
        version,
        min_version,
        stone_numbers,
    })
}

fn write_server_status(out: &mut Vec<u8>, status: &ServerStatus) {
    out.extend_from_slice(&[
        status.players,
        status.computers,
        status.clients,
        status.width,
        status.height,
    ]);
    out.extend_from_slice(&[0; LEGACY_STONE_BYTES]);
    out.push(status.game_mode.raw());
    for client in status.client_for_player {
        out.push(client.map_or(-1i8 as u8, |c| c));
    }
    for name in &status.client_names {
        write_name(out, name.as_deref());
    }
    out.push(status.version);
    out.push(status.min_version);
    out.extend_from_slice(&status.stone_numbers);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
