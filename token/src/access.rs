//! # Access Guard
//!
//! Two capabilities gate privileged operations: **owner** and
//! **owner-or-manager**. The guard is a plain value owned by the service and
//! consulted before any privileged mutation; nothing inherits from it.

use serde::{Deserialize, Serialize};

use crate::error::TokenError;
use crate::types::Address;

/// Holds the owner and manager identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGuard {
    owner: Address,
    manager: Address,
}

impl AccessGuard {
    pub fn new(owner: Address, manager: Address) -> Self {
        Self { owner, manager }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn manager(&self) -> &Address {
        &self.manager
    }

    pub fn is_owner(&self, who: &Address) -> bool {
        *who == self.owner
    }

    pub fn is_owner_or_manager(&self, who: &Address) -> bool {
        *who == self.owner || *who == self.manager
    }

    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] unless `who` is the owner.
    pub fn require_owner(&self, who: &Address) -> Result<(), TokenError> {
        if self.is_owner(who) {
            Ok(())
        } else {
            tracing::warn!(caller = %who, "owner capability denied");
            Err(TokenError::Unauthorized {
                caller: who.clone(),
                required: "owner",
            })
        }
    }

    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] unless `who` is the owner or the manager.
    pub fn require_owner_or_manager(&self, who: &Address) -> Result<(), TokenError> {
        if self.is_owner_or_manager(who) {
            Ok(())
        } else {
            tracing::warn!(caller = %who, "manager capability denied");
            Err(TokenError::Unauthorized {
                caller: who.clone(),
                required: "owner or manager",
            })
        }
    }
}
