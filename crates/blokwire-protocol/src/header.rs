//! The fixed 5-byte frame header.
//!
//! ```text
//! ┌────────┬───────────────┬─────────┬────────┐
//! │ check1 │ size (u16 BE) │ rawType │ check2 │
//! └────────┴───────────────┴─────────┴────────┘
//! ```
//!
//! `size` counts the whole frame, header included. The two check bytes
//! are derived from `(rawType, size)` and are never stored on their own:
//!
//! - `check1 = (size & 0x0055) ^ rawType`
//! - `check2 = ((check1 ^ 0xD6) + rawType) & 0xFF`

use crate::ProtocolError;

/// Number of bytes taken by the header on the wire.
pub const HEADER_SIZE: usize = 5;

/// A decoded (or to-be-encoded) frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    raw_type: u8,
    size: u16,
}

impl Header {
    /// Creates a header for a frame of `size` total bytes.
    pub fn new(raw_type: u8, size: u16) -> Self {
        Self { raw_type, size }
    }

    /// The message type tag, not yet checked against the registry.
    pub fn raw_type(&self) -> u8 {
        self.raw_type
    }

    /// Total frame length including the header.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Number of payload bytes following the header.
    pub fn payload_len(&self) -> usize {
        usize::from(self.size).saturating_sub(HEADER_SIZE)
    }

    pub fn check1(&self) -> u8 {
        // `size & 0x55` only keeps bits of the low byte.
        (self.size & 0x0055) as u8 ^ self.raw_type
    }

    pub fn check2(&self) -> u8 {
        (self.check1() ^ 0xD6).wrapping_add(self.raw_type)
    }

    /// Serializes the header into its wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let [hi, lo] = self.size.to_be_bytes();
        [self.check1(), hi, lo, self.raw_type, self.check2()]
    }

    /// Parses and validates a header read off the wire.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidHeaderSize`] if the declared size is below
    /// [`HEADER_SIZE`], [`ProtocolError::ChecksumFailed`] if either check
    /// byte disagrees with the recomputed value.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self, ProtocolError> {
        let size = u16::from_be_bytes([bytes[1], bytes[2]]);
        if usize::from(size) < HEADER_SIZE {
            return Err(ProtocolError::InvalidHeaderSize(size));
        }

        let header = Self::new(bytes[3], size);
        if header.check1() != bytes[0] || header.check2() != bytes[4] {
            return Err(ProtocolError::ChecksumFailed);
        }
        Ok(header)
    }
}

/// Convenience wrapper around [`Header::encode`].
pub fn encode_header(raw_type: u8, size: u16) -> [u8; HEADER_SIZE] {
    Header::new(raw_type, size).encode()
}

/// Convenience wrapper around [`Header::decode`].
pub fn decode_header(
    bytes: &[u8; HEADER_SIZE],
) -> Result<Header, ProtocolError> {
    Header::decode(bytes)
}
