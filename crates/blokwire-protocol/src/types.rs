//! Value types that travel inside message payloads.
//!
//! These are small, `Copy` where possible, and validated on construction
//! so that a decoded message never carries an out-of-range seat or shape.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

/// Number of shapes in the stone catalog.
pub const SHAPE_COUNT: usize = 21;

/// Availability count per shape, indexed by shape id.
pub type StoneCounts = [u8; SHAPE_COUNT];

/// Maximum number of client names carried by a status snapshot.
pub const MAX_CLIENTS: usize = 8;

/// Fixed width of a name field on the wire.
pub const NAME_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// One of the four fixed player positions on the board.
///
/// A seat says nothing about *who* plays it; the server maps seats to
/// connected clients in [`ServerStatus::client_for_player`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Seat(u8);

impl Seat {
    /// Number of seats at the table.
    pub const COUNT: usize = 4;

    /// Returns the seat at `index`, or `None` if it is not in `0..=3`.
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < Self::COUNT).then_some(Self(index))
    }

    /// All four seats in order.
    pub fn all() -> impl Iterator<Item = Seat> {
        (0..Self::COUNT as u8).map(Seat)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Decodes a seat byte (signed on the wire).
    pub(crate) fn from_wire(byte: u8) -> Result<Self, ProtocolError> {
        Self::new(byte).ok_or(ProtocolError::InvalidSeat(byte as i8))
    }

    /// Decodes an optional seat, where any negative value means "none".
    pub(crate) fn optional_from_wire(
        byte: u8,
    ) -> Result<Option<Self>, ProtocolError> {
        if (byte as i8) < 0 {
            Ok(None)
        } else {
            Self::from_wire(byte).map(Some)
        }
    }

    pub(crate) fn optional_to_wire(seat: Option<Self>) -> u8 {
        seat.map_or(-1i8 as u8, |s| s.0)
    }
}

impl TryFrom<u8> for Seat {
    type Error = ProtocolError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::from_wire(index)
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> u8 {
        seat.0
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GameMode
// ---------------------------------------------------------------------------

/// The game variants the server can run. The discriminants are the wire
/// values and must not be reordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum GameMode {
    TwoColorsTwoPlayers = 0,
    FourColorsTwoPlayers = 1,
    #[default]
    FourColorsFourPlayers = 2,
    Duo = 3,
    Junior = 4,
}

/// Every shape available once.
const CLASSIC_STONES: StoneCounts = [1; SHAPE_COUNT];

/// The reduced Junior set: small shapes twice, most large ones removed.
const JUNIOR_STONES: StoneCounts = [
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 2, 2, 0, 0,
];

impl GameMode {
    pub fn from_raw(raw: u8) -> Result<Self, ProtocolError> {
        match raw {
            0 => Ok(Self::TwoColorsTwoPlayers),
            1 => Ok(Self::FourColorsTwoPlayers),
            2 => Ok(Self::FourColorsFourPlayers),
            3 => Ok(Self::Duo),
            4 => Ok(Self::Junior),
            other => Err(ProtocolError::UnknownGameMode(other)),
        }
    }

    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Modes played with only seats 0 and 2. Seats 1 and 3 never get
    /// stones in these modes.
    pub fn is_two_seat(self) -> bool {
        matches!(self, Self::TwoColorsTwoPlayers | Self::Duo | Self::Junior)
    }

    /// Board edge length a fresh game of this mode uses.
    pub fn default_board_size(self) -> u8 {
        match self {
            Self::FourColorsFourPlayers | Self::FourColorsTwoPlayers => 20,
            Self::TwoColorsTwoPlayers => 15,
            Self::Duo | Self::Junior => 14,
        }
    }

    /// Shape availability a fresh game of this mode uses.
    pub fn default_stones(self) -> StoneCounts {
        match self {
            Self::Junior => JUNIOR_STONES,
            _ => CLASSIC_STONES,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TwoColorsTwoPlayers => "2 colors, 2 players",
            Self::FourColorsTwoPlayers => "4 colors, 2 players",
            Self::FourColorsFourPlayers => "4 colors, 4 players",
            Self::Duo => "duo",
            Self::Junior => "junior",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// Quarter-turn rotation of a shape, clockwise.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Rotation {
    #[default]
    None = 0,
    Right = 1,
    Half = 2,
    Left = 3,
}

impl Rotation {
    pub fn from_raw(raw: u8) -> Result<Self, ProtocolError> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Right),
            2 => Ok(Self::Half),
            3 => Ok(Self::Left),
            other => Err(ProtocolError::InvalidRotation(other)),
        }
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

/// One stone placement: who places which shape, how it is oriented and
/// where it lands.
///
/// Coordinates are signed because a shape's origin may sit outside the
/// board while its cells are inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    pub seat: Seat,
    pub shape: u8,
    pub mirrored: bool,
    pub rotation: Rotation,
    pub x: i8,
    pub y: i8,
}

impl Turn {
    /// Builds a turn, rejecting shape ids outside the catalog.
    pub fn new(
        seat: Seat,
        shape: u8,
        mirrored: bool,
        rotation: Rotation,
        x: i8,
        y: i8,
    ) -> Result<Self, ProtocolError> {
        if usize::from(shape) >= SHAPE_COUNT {
            return Err(ProtocolError::InvalidShape(shape));
        }
        Ok(Self {
            seat,
            shape,
            mirrored,
            rotation,
            x,
            y,
        })
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shape {} at ({}, {}) {:?}{}",
            self.seat,
            self.shape,
            self.x,
            self.y,
            self.rotation,
            if self.mirrored { " mirrored" } else { "" }
        )
    }
}

// ---------------------------------------------------------------------------
// ServerStatus
// ---------------------------------------------------------------------------

/// The server's periodic snapshot of the lobby and game setup.
///
/// Successive snapshots are diffed seat by seat to find out who joined
/// and who left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    /// Seats taken by humans.
    pub players: u8,
    /// Seats taken by the computer.
    pub computers: u8,
    /// Connected clients.
    pub clients: u8,
    pub width: u8,
    pub height: u8,
    pub game_mode: GameMode,
    /// Which client controls each seat.
    pub client_for_player: [Option<u8>; Seat::COUNT],
    /// Display names, indexed by client id.
    pub client_names: [Option<String>; MAX_CLIENTS],
    pub version: u8,
    pub min_version: u8,
    pub stone_numbers: StoneCounts,
}

impl ServerStatus {
    /// Oldest snapshot layout this client understands.
    pub const MIN_SUPPORTED_VERSION: u8 = 3;

    /// Version this client declares when it builds snapshots itself.
    pub const VERSION: u8 = 3;

    pub fn is_at_least_version(&self, version: u8) -> bool {
        self.version >= version
    }

    /// Display name of `client`, if the server announced one.
    pub fn client_name(&self, client: u8) -> Option<&str> {
        self.client_names
            .get(usize::from(client))
            .and_then(|name| name.as_deref())
    }

    /// First seat controlled by `client`.
    pub fn seat_of(&self, client: u8) -> Option<Seat> {
        Seat::all().find(|seat| {
            self.client_for_player[seat.index()] == Some(client)
        })
    }

    /// Client controlling `seat`, if any.
    pub fn client_for(&self, seat: Seat) -> Option<u8> {
        self.client_for_player[seat.index()]
    }
}

impl Default for ServerStatus {
    fn default() -> Self {
        let mode = GameMode::default();
        let size = mode.default_board_size();
        Self {
            players: 0,
            computers: 0,
            clients: 0,
            width: size,
            height: size,
            game_mode: mode,
            client_for_player: [None; Seat::COUNT],
            client_names: Default::default(),
            version: Self::VERSION,
            min_version: Self::MIN_SUPPORTED_VERSION,
            stone_numbers: mode.default_stones(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_range() {
        assert!(Seat::new(0).is_some());
        assert!(Seat::new(3).is_some());
        assert!(Seat::new(4).is_none());
        assert_eq!(Seat::all().count(), 4);
    }

    #[test]
    fn test_optional_seat_wire_form() {
        assert_eq!(Seat::optional_to_wire(None), 0xFF);
        assert_eq!(Seat::optional_from_wire(0xFF).unwrap(), None);
        assert_eq!(Seat::optional_from_wire(2).unwrap(), Seat::new(2));
        assert!(matches!(
            Seat::optional_from_wire(9),
            Err(ProtocolError::InvalidSeat(9))
        ));
    }

    #[test]
    fn test_seat_serializes_as_plain_number() {
        let json = serde_json::to_string(&Seat::new(2).unwrap()).unwrap();
        assert_eq!(json, "2");
        assert!(serde_json::from_str::<Seat>("7").is_err());
    }

    #[test]
    fn test_two_seat_modes() {
        assert!(GameMode::TwoColorsTwoPlayers.is_two_seat());
        assert!(GameMode::Duo.is_two_seat());
        assert!(GameMode::Junior.is_two_seat());
        assert!(!GameMode::FourColorsTwoPlayers.is_two_seat());
        assert!(!GameMode::FourColorsFourPlayers.is_two_seat());
    }

    #[test]
    fn test_game_mode_defaults() {
        assert_eq!(GameMode::default(), GameMode::FourColorsFourPlayers);
        assert_eq!(GameMode::Duo.default_board_size(), 14);
        assert_eq!(GameMode::TwoColorsTwoPlayers.default_board_size(), 15);
        assert_eq!(GameMode::Junior.default_stones()[10], 0);
        assert!(GameMode::Duo.default_stones().iter().all(|&n| n == 1));
        assert!(matches!(
            GameMode::from_raw(5),
            Err(ProtocolError::UnknownGameMode(5))
        ));
    }

    #[test]
    fn test_turn_rejects_unknown_shape() {
        let seat = Seat::new(1).unwrap();
        assert!(Turn::new(seat, 20, false, Rotation::None, 0, 0).is_ok());
        assert!(matches!(
            Turn::new(seat, 21, false, Rotation::None, 0, 0),
            Err(ProtocolError::InvalidShape(21))
        ));
    }

    #[test]
    fn test_status_lookups() {
        let mut status = ServerStatus::default();
        status.client_for_player = [None, Some(3), None, Some(3)];
        status.client_names[3] = Some("Ada".into());

        assert_eq!(status.seat_of(3), Seat::new(1));
        assert_eq!(status.seat_of(0), None);
        assert_eq!(status.client_name(3), Some("Ada"));
        assert_eq!(status.client_name(0), None);
        assert_eq!(status.client_name(200), None);
        assert!(status.is_at_least_version(3));
    }
}
