//! # Types
//!
//! Shared data structures used across all modules of the card registry.
//!
//! ## Design decisions
//!
//! ### Identities
//!
//! An [`Address`] is a plain 20-byte identity. The all-zero address is the
//! *null* identity: it may never own a card, so `mint` and `trade` reject it
//! with `Error::InvalidAddress`. Addresses travel as `0x`-prefixed hex strings
//! whenever they are serialized.
//!
//! ### Card lifecycle
//!
//! A [`Card`] only ever moves forward:
//!
//! ```text
//! mint ──► level 1 ──► upgrade ──► level 2 ──► … ──► level MAX_LEVEL
//!             │                        │
//!             └──── trade (owner) ─────┘
//! ```
//!
//! There is no burn. `character_type` is fixed at mint.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ConfigError;

/// Highest level a card can be upgraded to.
pub const MAX_LEVEL: u32 = 10;

/// Highest valid character type; valid types are `1..=MAX_CHARACTER_TYPE`.
pub const MAX_CHARACTER_TYPE: u32 = 5;

/// Identifier of a minted card. Allocated from 1 upward, never reused.
pub type CardId = u64;

// ── Address ──────────────────────────────────────────────────────────

/// A 20-byte caller or owner identity.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The null identity.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Failure to parse an [`Address`] from text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)?;
        let bytes: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Card ─────────────────────────────────────────────────────────────

/// One issued card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier (auto-incremented from 1).
    pub id: CardId,
    /// Character type, in `1..=max_character_type`. Immutable.
    pub character_type: u32,
    /// Current level, in `1..=max_level`. Never decreases.
    pub level: u32,
    /// Current holder.
    pub owner: Address,
}

// ── Configuration ────────────────────────────────────────────────────

/// Bounds applied by the registry when minting and upgrading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub max_level: u32,
    pub max_character_type: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_level: MAX_LEVEL,
            max_character_type: MAX_CHARACTER_TYPE,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_level == 0 {
            return Err(ConfigError::ZeroMaxLevel);
        }
        if self.max_character_type == 0 {
            return Err(ConfigError::ZeroMaxCharacterType);
        }
        Ok(())
    }

    pub fn is_valid_character_type(&self, character_type: u32) -> bool {
        (1..=self.max_character_type).contains(&character_type)
    }
}
