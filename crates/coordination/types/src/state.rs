//! Template states and their transition rules
//!
//! A state is one phase of the coordination protocol. How a run leaves a
//! state is described by [`Transitions`]: either an explicit, ordered list
//! of edges (branching graphs) or the implicit sequence order (linear
//! checklists that need no graph at all).

use crate::{RoleName, SlotName};
use serde::{Deserialize, Serialize};

/// Name of a state, unique within a template
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateName(pub String);

impl StateName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase tag of a state. A UI/behavior hint, never enforced by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    /// Gathering initial requirements and expressions
    #[default]
    Collect,
    /// Discussion and refinement of proposals
    Negotiate,
    /// Formal agreements and commitments
    Commit,
    /// Proof of work or completion
    Evidence,
    /// Final validation and closure
    Signoff,
}

/// Condition tag carried on an explicit edge.
///
/// Surfaced to clients as a hint; the resolver does not evaluate it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCondition {
    #[default]
    Always,
    Approved,
    Rejected,
    Timeout,
    Manual,
}

/// An explicit edge naming a target state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEdge {
    /// Target state name. May be dangling; dangling edges are dropped at resolution.
    pub target: StateName,
    #[serde(default)]
    pub condition: TransitionCondition,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl TransitionEdge {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: StateName::new(target),
            condition: TransitionCondition::Always,
            label: String::new(),
        }
    }

    pub fn with_condition(mut self, condition: TransitionCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// How a run leaves a state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Transitions {
    /// Follow the template's sequence order
    #[default]
    Sequence,
    /// Follow the listed edges, in declared order
    Explicit { edges: Vec<TransitionEdge> },
}

impl Transitions {
    /// Build an explicit transition list. An empty list means sequence order.
    pub fn explicit(edges: Vec<TransitionEdge>) -> Self {
        if edges.is_empty() {
            Self::Sequence
        } else {
            Self::Explicit { edges }
        }
    }

    /// Shorthand for explicit `always` edges to the named targets
    pub fn to_states<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::explicit(targets.into_iter().map(TransitionEdge::to).collect())
    }

    /// Declared explicit edges (empty for sequence mode)
    pub fn edges(&self) -> &[TransitionEdge] {
        match self {
            Self::Sequence => &[],
            Self::Explicit { edges } => edges,
        }
    }
}

/// A state definition within a template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateDefinition {
    /// Unique state name
    pub name: StateName,
    /// Phase tag
    #[serde(rename = "type", default)]
    pub state_type: StateType,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Position in the total order fallback (0 = first state)
    pub sequence: u32,
    /// Slots that must hold a value before the run may leave this state
    #[serde(default)]
    pub required_slots: Vec<SlotName>,
    /// Roles permitted to act in this state
    #[serde(default)]
    pub allowed_roles: Vec<RoleName>,
    /// How the run leaves this state
    #[serde(default)]
    pub transitions: Transitions,
    /// Advisory timeout for external watchdogs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>, sequence: u32) -> Self {
        Self {
            name: StateName::new(name),
            state_type: StateType::Collect,
            description: String::new(),
            sequence,
            required_slots: Vec::new(),
            allowed_roles: Vec::new(),
            transitions: Transitions::Sequence,
            timeout_minutes: None,
        }
    }

    pub fn with_type(mut self, state_type: StateType) -> Self {
        self.state_type = state_type;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Require a slot; duplicates are ignored so the set stays ordered and unique
    pub fn requires(mut self, slot: impl Into<String>) -> Self {
        let slot = SlotName::new(slot);
        if !self.required_slots.contains(&slot) {
            self.required_slots.push(slot);
        }
        self
    }

    pub fn allow(mut self, role: impl Into<String>) -> Self {
        let role = RoleName::new(role);
        if !self.allowed_roles.contains(&role) {
            self.allowed_roles.push(role);
        }
        self
    }

    pub fn with_transitions(mut self, transitions: Transitions) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_timeout_minutes(mut self, minutes: u32) -> Self {
        self.timeout_minutes = Some(minutes);
        self
    }

    pub fn allows_role(&self, role: &RoleName) -> bool {
        self.allowed_roles.contains(role)
    }

    pub fn requires_slot(&self, slot: &SlotName) -> bool {
        self.required_slots.contains(slot)
    }
}
