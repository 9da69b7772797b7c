//! Budget configuration types.
//!
//! `BudgetConfig` represents the top-level `config.toml` that controls
//! default ceilings and per-analysis cost estimates.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the budget subsystem.
///
/// Loaded from `~/.edubudget/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Ceiling given to new admins when none is requested.
    #[serde(default = "default_admin_limit")]
    pub default_admin_limit: u64,

    /// Estimated cost of one analysis, checked before dispatching it.
    #[serde(default = "default_estimated_analysis_tokens")]
    pub estimated_analysis_tokens: u64,

    /// Minimum remaining tokens for `can_analyze` to be true.
    #[serde(default = "default_min_analysis_tokens")]
    pub min_analysis_tokens: u64,
}

fn default_admin_limit() -> u64 {
    900_000
}

fn default_estimated_analysis_tokens() -> u64 {
    2_000
}

fn default_min_analysis_tokens() -> u64 {
    2_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_admin_limit: default_admin_limit(),
            estimated_analysis_tokens: default_estimated_analysis_tokens(),
            min_analysis_tokens: default_min_analysis_tokens(),
        }
    }
}
