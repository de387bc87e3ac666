//! # Primitive Types
//!
//! Addresses, amounts, instants and lock kinds. Everything that crosses the
//! ledger boundary is expressed in these types, so the arithmetic and
//! validation rules live in one place.
//!
//! Amounts are `u128` in the smallest denomination. A negative amount is
//! unrepresentable once parsed; the only place one can appear is the wire,
//! and [`parse_amount`] rejects it there.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TokenError;

/// Token quantity in the smallest denomination.
pub type Amount = u128;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An account identifier.
///
/// The ledger treats addresses as opaque strings. The only structural rule
/// is that they are non-empty and contain no whitespace; the physical
/// encoding belongs to the host.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validates and wraps an address string.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidAddress`] for empty input or input
    /// containing whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, TokenError> {
        let raw = raw.into();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(TokenError::InvalidAddress(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// LockKind
// ---------------------------------------------------------------------------

/// Origin of a lock entry.
///
/// The kind never changes how a lock is evaluated. It only matters for
/// bookkeeping and as half of the `(kind, end)` key used to find an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockKind {
    /// Administrative lock, usually a percentage of the balance.
    Normal,
    /// Self-imposed lock placed by the holder.
    Stake,
    /// Lock attached to a reward grant from the privileged-grant address.
    RewardVesting,
}

impl LockKind {
    /// Numeric code used on the wire and in diagnostics.
    pub fn code(self) -> u8 {
        match self {
            LockKind::Normal => 1,
            LockKind::Stake => 2,
            LockKind::RewardVesting => 3,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u64) -> Result<Self, TokenError> {
        match code {
            1 => Ok(LockKind::Normal),
            2 => Ok(LockKind::Stake),
            3 => Ok(LockKind::RewardVesting),
            other => Err(TokenError::Validation(format!("unknown lock kind {}", other))),
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::Normal => write!(f, "Normal"),
            LockKind::Stake => write!(f, "Stake"),
            LockKind::RewardVesting => write!(f, "RewardVesting"),
        }
    }
}

// ---------------------------------------------------------------------------
// Amount helpers
// ---------------------------------------------------------------------------

/// Parses a decimal amount string from the wire.
///
/// Only plain ASCII digits are accepted. A leading sign (including `-`),
/// an empty string, or a value above `u128::MAX` is a validation failure.
pub fn parse_amount(raw: &str) -> Result<Amount, TokenError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TokenError::Validation("amount is missing".into()));
    }
    if trimmed.starts_with('-') {
        return Err(TokenError::Validation(format!(
            "amount must not be negative: {}",
            trimmed
        )));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::Validation(format!(
            "amount is not a decimal integer: {}",
            trimmed
        )));
    }
    trimmed
        .parse::<Amount>()
        .map_err(|_| TokenError::Validation(format!("amount out of range: {}", trimmed)))
}

/// Returns `10^decimals` as an [`Amount`], or `None` on overflow.
pub fn unit_scale(decimals: u8) -> Option<Amount> {
    10u128.checked_pow(u32::from(decimals))
}

/// Serializes amounts as decimal strings so that consumers without 128-bit
/// integers do not lose precision.
pub mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_amount, Amount};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw).map_err(serde::de::Error::custom)
    }
}
