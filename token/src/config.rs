//! # Token Configuration & Constants
//!
//! Every fixed parameter of the ledger lives here, together with the
//! [`TokenConfig`] used to construct a fresh token. The node loads a
//! `TokenConfig` from a JSON genesis file.

use serde::{Deserialize, Serialize};

use crate::error::TokenError;
use crate::types::{unit_scale, Address, Amount};

// ---------------------------------------------------------------------------
// Ledger Parameters
// ---------------------------------------------------------------------------

/// Maximum number of lock entries a single account may hold.
pub const MAX_LOCKS_PER_ACCOUNT: usize = 100;

/// Denominator for percentage locks. `locked = base * pct / 100`.
pub const PERCENT_DENOMINATOR: u32 = 100;

/// Decimal precision of the token.
pub const DEFAULT_DECIMALS: u8 = 8;

/// Initial supply in whole tokens.
pub const DEFAULT_INITIAL_SUPPLY: u64 = 1_000_000_000;

/// Crate version, reported by the node.
pub const LEDGER_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC / REST port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Name of the snapshot file inside the node's data directory.
pub const SNAPSHOT_FILE_NAME: &str = "state.json";

// ---------------------------------------------------------------------------
// TokenConfig
// ---------------------------------------------------------------------------

/// One construction-time grant. The amount is in whole tokens and is scaled
/// by `10^decimals` when applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub recipient: Address,
    pub amount: u64,
}

/// Parameters for constructing a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Initial supply in whole tokens.
    #[serde(default = "default_initial_supply")]
    pub initial_supply: u64,
    pub owner: Address,
    pub manager: Address,
    /// Recipients funded at construction. Each becomes a protected address.
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_initial_supply() -> u64 {
    DEFAULT_INITIAL_SUPPLY
}

impl TokenConfig {
    /// A config with default supply and precision and no allocations.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, owner: Address, manager: Address) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: DEFAULT_DECIMALS,
            initial_supply: DEFAULT_INITIAL_SUPPLY,
            owner,
            manager,
            allocations: Vec::new(),
        }
    }

    /// Adds an allocation, builder style.
    pub fn with_allocation(mut self, recipient: Address, amount: u64) -> Self {
        self.allocations.push(Allocation { recipient, amount });
        self
    }

    /// `10^decimals`.
    pub fn scale(&self) -> Result<Amount, TokenError> {
        unit_scale(self.decimals).ok_or(TokenError::Overflow("scaling by decimals"))
    }

    /// Total supply in the smallest denomination.
    pub fn total_supply(&self) -> Result<Amount, TokenError> {
        Amount::from(self.initial_supply)
            .checked_mul(self.scale()?)
            .ok_or(TokenError::Overflow("computing total supply"))
    }

    /// Checks the config can produce a consistent ledger.
    ///
    /// Name and symbol must be non-empty, the scaled supply must fit, and
    /// the scaled allocations must not exceed it.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.name.trim().is_empty() {
            return Err(TokenError::Validation("token name is empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(TokenError::Validation("token symbol is empty".into()));
        }
        let supply = self.total_supply()?;
        let allocated = self.allocated_total()?;
        if allocated > supply {
            return Err(TokenError::Validation(format!(
                "allocations total {} exceeds supply {}",
                allocated, supply
            )));
        }
        Ok(())
    }

    /// Sum of all allocations, scaled.
    pub fn allocated_total(&self) -> Result<Amount, TokenError> {
        let scale = self.scale()?;
        self.allocations.iter().try_fold(0u128, |acc, a| {
            Amount::from(a.amount)
                .checked_mul(scale)
                .and_then(|scaled| acc.checked_add(scaled))
                .ok_or(TokenError::Overflow("summing allocations"))
        })
    }
}
