//! Engine configuration

use serde::{Deserialize, Serialize};

/// Limits and policy switches for the coordination engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest accepted slot value, measured as serialized JSON bytes
    pub max_value_bytes: usize,
    /// Upper bound on participants per run, across all roles
    pub max_participants_per_run: usize,
    /// Reject invites beyond a role's `max_participants`
    pub enforce_role_max: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_value_bytes: 64 * 1024,
            max_participants_per_run: 100,
            enforce_role_max: true,
        }
    }
}
