//! Coordination runs: live instantiations of a template
//!
//! A run tracks its current template state and an `active → completed |
//! abandoned` status. Terminal statuses never change again.

use crate::{CoordinationError, CoordinationResult, StateName, TemplateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Run Identifier ───────────────────────────────────────────────────

/// Unique identifier for a run
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
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

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Run Status ───────────────────────────────────────────────────────

/// Lifecycle status of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepting slot writes and advances
    Active,
    /// The final state was left; terminal
    Completed,
    /// Cancelled by an operator or watchdog; terminal
    Abandoned,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

// ── Run ──────────────────────────────────────────────────────────────

/// Who started a run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Initiator {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Initiator {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A live coordination run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Run {
    /// Unique run identifier
    pub id: RunId,
    /// The template this run was created from; fixed for the run's lifetime
    pub template_id: TemplateId,
    /// Current template state
    pub current_state: StateName,
    /// Lifecycle status
    pub status: RunStatus,
    /// Who created the run
    pub initiator: Initiator,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abandoned_reason: Option<String>,
    /// Free-form run attributes
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Run {
    /// Create an active run positioned at `first_state`
    pub fn new(template_id: TemplateId, first_state: StateName, initiator: Initiator) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::generate(),
            template_id,
            current_state: first_state,
            status: RunStatus::Active,
            initiator,
            created_at: now,
            updated_at: now,
            completed_at: None,
            abandoned_reason: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == RunStatus::Active
    }

    /// Fail with `RunNotActive` unless the run accepts mutations
    pub fn ensure_active(&self) -> CoordinationResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoordinationError::RunNotActive(self.id.clone()))
        }
    }

    /// Move the current state pointer
    pub fn enter_state(&mut self, state: StateName) -> CoordinationResult<()> {
        self.ensure_active()?;
        self.current_state = state;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the run completed. The state pointer stays on the last state.
    pub fn complete(&mut self) -> CoordinationResult<()> {
        self.ensure_active()?;
        let now = Utc::now();
        self.status = RunStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Mark the run abandoned with a reason
    pub fn abandon(&mut self, reason: impl Into<String>) -> CoordinationResult<()> {
        self.ensure_active()?;
        let now = Utc::now();
        self.status = RunStatus::Abandoned;
        self.abandoned_reason = Some(reason.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
