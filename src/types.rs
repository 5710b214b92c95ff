// src/types.rs

use core::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uint::construct_uint;

construct_uint! {
    /// Fixed-width 256-bit unsigned integer used for all token amounts and
    /// curve constants. `virtual_k` squares ~166-bit values, so nothing
    /// narrower is safe.
    pub struct U256(4);
}

/// Fixed-point scale: one whole unit of price (10^18).
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Maximum basis points (100%).
pub const MAX_BPS: u16 = 10_000;

/// Lowest accepted `desired_average_price`, WAD-scaled.
///
/// sqrt(0.75) * 10^18, rounded up so every accepted price squares to at
/// least 0.75.
pub const MIN_AVERAGE_PRICE: u128 = 866_025_403_784_438_647;

/// Relative invariant tolerance denominator (1e-12).
pub const INVARIANT_TOLERANCE_DENOM: u128 = 1_000_000_000_000;

impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(|e| de::Error::custom(format!("invalid U256: {e:?}")))
    }
}

/// Opaque 32-byte account identifier for callers, collaborators, and tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Convenience constructor filling all bytes with `byte`.
    pub fn repeat(byte: u8) -> Self {
        Address([byte; 32])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
