//! Identity types: room codes, player slots, player addresses.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// RoomCode
// ---------------------------------------------------------------------------

/// A six-digit room code such as `"123456"`.
///
/// Players type this into the lobby, so it stays a short decimal string
/// rather than an opaque integer. Validation happens on construction and on
/// deserialization (`try_from = "String"`), so a `RoomCode` held anywhere in
/// the system is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of digits in every room code.
    pub const LEN: usize = 6;

    /// Parses and validates a room code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] unless `s` is exactly six
    /// ASCII digits.
    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        if s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(ProtocolError::InvalidRoomCode(s.to_string()))
        }
    }

    /// Draws a random code in `100000..=999999`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random_range(100_000u32..1_000_000).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One of the two player positions in a session.
///
/// The host created the room; the guest joined it. Slots double as array
/// indices (`Host = 0`, `Guest = 1`) for per-slot tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Host,
    Guest,
}

impl Slot {
    /// Both slots in index order.
    pub const ALL: [Slot; 2] = [Slot::Host, Slot::Guest];

    pub fn index(self) -> usize {
        match self {
            Self::Host => 0,
            Self::Guest => 1,
        }
    }

    /// The opposite slot.
    pub fn other(self) -> Self {
        match self {
            Self::Host => Self::Guest,
            Self::Guest => Self::Host,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Guest => f.write_str("guest"),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerAddress
// ---------------------------------------------------------------------------

/// The player's external identity (a wallet address).
///
/// Opaque to this crate; compared byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerAddress(pub String);

impl PlayerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
