//! Participant roles declared by a template
//!
//! Roles are unique by name within a template. Every participant of a run
//! is bound to exactly one role for the lifetime of the run.

use serde::{Deserialize, Serialize};

/// Name of a role, unique within a template
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(pub String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant category within a template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Role {
    /// Unique role name (e.g. `requester`, `approver`)
    pub name: RoleName,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Minimum participants needed for the role to be staffed
    #[serde(default = "default_min_participants")]
    pub min_participants: u32,
    /// Maximum participants allowed (`None` = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
    /// Opaque capability tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

fn default_min_participants() -> u32 {
    1
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: RoleName::new(name),
            description: String::new(),
            min_participants: 1,
            max_participants: None,
            capabilities: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_min_participants(mut self, min: u32) -> Self {
        self.min_participants = min;
        self
    }

    pub fn with_max_participants(mut self, max: u32) -> Self {
        self.max_participants = Some(max);
        self
    }

    /// Add a capability tag; duplicates are ignored
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Whether one more participant can join given the current count
    pub fn has_capacity(&self, current: usize) -> bool {
        match self.max_participants {
            Some(max) => (current as u64) < max as u64,
            None => true,
        }
    }
}
