// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration of permission resolution for sessions.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::GlobalPermission;

/// Default maximum nesting depth of sub-portfolios.
pub const DEFAULT_MAX_PORTFOLIO_DEPTH: usize = 25;

/// Configuration parameters shared by all sessions of a server.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Maximum nesting depth of sub-portfolios when flattening a portfolio into its projects.
    /// Deeper hierarchies resolve to no members at all.
    ///
    /// Default: 25.
    pub max_portfolio_depth: usize,

    /// Resolve the grants of all elements of a collection with a single batched lookup when
    /// filtering collections.
    ///
    /// Default: true.
    pub batch_lookups: bool,

    /// Global permission conferring system-administrator status to its holders.
    ///
    /// Default: `Administer`.
    pub administrator_permission: GlobalPermission,
}

impl SessionConfig {
    /// Return a default instance of `SessionConfig`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Define the maximum nesting depth of sub-portfolios.
    pub fn max_portfolio_depth(mut self, depth: usize) -> Self {
        self.max_portfolio_depth = depth;
        self
    }

    /// Enable or disable batched grant lookups when filtering collections.
    pub fn batch_lookups(mut self, enabled: bool) -> Self {
        self.batch_lookups = enabled;
        self
    }

    /// Define the global permission conferring system-administrator status.
    pub fn administrator_permission(mut self, permission: GlobalPermission) -> Self {
        self.administrator_permission = permission;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_portfolio_depth: DEFAULT_MAX_PORTFOLIO_DEPTH,
            batch_lookups: true,
            administrator_permission: GlobalPermission::Administer,
        }
    }
}
