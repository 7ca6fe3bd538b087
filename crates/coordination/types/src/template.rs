//! Blueprint templates: the static definition of a coordination protocol
//!
//! A template declares roles, ordered states, data slots and the transition
//! rules between states. Templates are immutable once registered; a changed
//! protocol is registered as a new template version.

use crate::{
    CoordinationError, CoordinationResult, Role, RoleName, Slot, SlotName, StateDefinition,
    StateName,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

static ROLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("role name pattern must compile"));
static STATE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-zA-Z0-9_-]*$").expect("state name pattern must compile"));
static SLOT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-zA-Z0-9_]*$").expect("slot name pattern must compile"));
static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("version pattern must compile"));

// ── Template Identifier ──────────────────────────────────────────────

/// Unique identifier for a template version
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl TemplateId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Template ─────────────────────────────────────────────────────────

/// A versioned blueprint for coordination runs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    /// Unique template identifier
    #[serde(default = "TemplateId::generate")]
    pub id: TemplateId,
    /// Human-readable name, shared by all versions of the template
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// `major.minor[.patch]`
    #[serde(default = "default_version")]
    pub version: String,
    /// Inactive templates cannot be instantiated
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub roles: Vec<Role>,
    pub states: Vec<StateDefinition>,
    #[serde(default)]
    pub slots: Vec<Slot>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

fn default_version() -> String {
    "1.0".into()
}

fn default_active() -> bool {
    true
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TemplateId::generate(),
            name: name.into(),
            description: String::new(),
            version: default_version(),
            is_active: true,
            category: None,
            tags: Vec::new(),
            roles: Vec::new(),
            states: Vec::new(),
            slots: Vec::new(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: TemplateId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn get_state(&self, name: &StateName) -> Option<&StateDefinition> {
        self.states.iter().find(|s| &s.name == name)
    }

    pub fn get_role(&self, name: &RoleName) -> Option<&Role> {
        self.roles.iter().find(|r| &r.name == name)
    }

    pub fn get_slot(&self, name: &SlotName) -> Option<&Slot> {
        self.slots.iter().find(|s| &s.name == name)
    }

    /// The state with the lowest sequence index
    pub fn first_state(&self) -> Option<&StateDefinition> {
        self.states.iter().min_by_key(|s| s.sequence)
    }

    /// States ordered by sequence index; ties keep declaration order
    pub fn states_in_sequence(&self) -> Vec<&StateDefinition> {
        let mut ordered: Vec<&StateDefinition> = self.states.iter().collect();
        ordered.sort_by_key(|s| s.sequence);
        ordered
    }

    /// States whose required-slot set names `slot`
    pub fn states_requiring(&self, slot: &SlotName) -> Vec<&StateDefinition> {
        self.states.iter().filter(|s| s.requires_slot(slot)).collect()
    }

    /// Explicit edges whose target does not resolve, as `(from, target)` pairs
    pub fn dangling_transitions(&self) -> Vec<(StateName, StateName)> {
        let names: HashSet<&StateName> = self.states.iter().map(|s| &s.name).collect();
        self.states
            .iter()
            .flat_map(|state| {
                state
                    .transitions
                    .edges()
                    .iter()
                    .filter(|edge| !names.contains(&edge.target))
                    .map(move |edge| (state.name.clone(), edge.target.clone()))
            })
            .collect()
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Validate the structural integrity of the template.
    ///
    /// Dangling transition targets are tolerated here; they are dropped at
    /// resolution time and reported by [`Template::dangling_transitions`].
    pub fn validate(&self) -> CoordinationResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("Template name must not be empty"));
        }
        if !VERSION.is_match(&self.version) {
            return Err(invalid(format!(
                "Version '{}' must look like major.minor[.patch]",
                self.version
            )));
        }
        if self.roles.is_empty() {
            return Err(invalid("Template must declare at least one role"));
        }
        if self.states.is_empty() {
            return Err(invalid("Template must declare at least one state"));
        }

        // Roles
        let mut role_names = HashSet::new();
        for role in &self.roles {
            if !ROLE_NAME.is_match(role.name.as_str()) {
                return Err(invalid(format!("Invalid role name '{}'", role.name)));
            }
            if !role_names.insert(&role.name) {
                return Err(invalid(format!("Duplicate role '{}'", role.name)));
            }
            if let Some(max) = role.max_participants {
                if max < role.min_participants {
                    return Err(invalid(format!(
                        "Role '{}' has max_participants {} below min_participants {}",
                        role.name, max, role.min_participants
                    )));
                }
            }
        }

        // Slots
        let mut slot_names = HashSet::new();
        for slot in &self.slots {
            if !SLOT_NAME.is_match(slot.name.as_str()) {
                return Err(invalid(format!("Invalid slot name '{}'", slot.name)));
            }
            if !slot_names.insert(&slot.name) {
                return Err(invalid(format!("Duplicate slot '{}'", slot.name)));
            }
            for role in slot.visibility.iter().chain(slot.editable_by.iter()) {
                if !role_names.contains(role) {
                    return Err(invalid(format!(
                        "Slot '{}' references unknown role '{}'",
                        slot.name, role
                    )));
                }
            }
            if let Some(pattern) = slot.validation.as_ref().and_then(|v| v.pattern.as_ref()) {
                if let Err(e) = Regex::new(pattern) {
                    return Err(invalid(format!(
                        "Slot '{}' has an invalid pattern: {}",
                        slot.name, e
                    )));
                }
            }
        }

        // States
        let mut state_names = HashSet::new();
        for state in &self.states {
            if !STATE_NAME.is_match(state.name.as_str()) {
                return Err(invalid(format!("Invalid state name '{}'", state.name)));
            }
            if !state_names.insert(&state.name) {
                return Err(invalid(format!("Duplicate state '{}'", state.name)));
            }
            for role in &state.allowed_roles {
                if !role_names.contains(role) {
                    return Err(invalid(format!(
                        "State '{}' allows unknown role '{}'",
                        state.name, role
                    )));
                }
            }
            for slot in &state.required_slots {
                if !slot_names.contains(slot) {
                    return Err(invalid(format!(
                        "State '{}' requires unknown slot '{}'",
                        state.name, slot
                    )));
                }
            }
        }

        // Sequence indices must be exactly 0..n
        let mut sequences: Vec<u32> = self.states.iter().map(|s| s.sequence).collect();
        sequences.sort_unstable();
        for (expected, actual) in sequences.iter().enumerate() {
            if *actual as usize != expected {
                return Err(invalid(
                    "State sequence numbers must be unique and consecutive from 0",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> CoordinationError {
    CoordinationError::InvalidTemplate(reason.into())
}
