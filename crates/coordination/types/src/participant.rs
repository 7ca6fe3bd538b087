//! Run participants and their magic tokens

use crate::{RoleName, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Participant Identifier ───────────────────────────────────────────

/// Unique identifier for a participant of a run
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
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

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Magic Token ──────────────────────────────────────────────────────

/// Opaque capability credential handed to a participant.
///
/// `Debug` never prints the secret; use [`MagicToken::expose`] at the
/// single point where it leaves the process.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MagicToken(String);

impl MagicToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hand out the raw secret
    pub fn expose(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for MagicToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MagicToken(<redacted>)")
    }
}

// ── Participant ──────────────────────────────────────────────────────

/// External identity metadata supplied at invite time
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl ParticipantIdentity {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Active,
    /// Token revoked; the record is kept for audit
    Revoked,
}

/// A run-scoped identity bound to exactly one role
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub run_id: RunId,
    pub role: RoleName,
    #[serde(default)]
    pub identity: ParticipantIdentity,
    pub status: ParticipantStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_reason: Option<String>,
}

impl Participant {
    pub fn new(run_id: RunId, role: RoleName, identity: ParticipantIdentity) -> Self {
        Self {
            id: ParticipantId::generate(),
            run_id,
            role,
            identity,
            status: ParticipantStatus::Active,
            created_at: Utc::now(),
            revoked_at: None,
            revoked_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }

    pub fn revoke(&mut self, reason: impl Into<String>) {
        self.status = ParticipantStatus::Revoked;
        self.revoked_at = Some(Utc::now());
        self.revoked_reason = Some(reason.into());
    }

    /// Display name, falling back to the short id
    pub fn display_name(&self) -> String {
        self.identity
            .display_name
            .clone()
            .unwrap_or_else(|| format!("participant-{}", self.id.short()))
    }
}

/// Result of resolving a token: who is acting, in which run, as which role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParticipant {
    pub run_id: RunId,
    pub participant_id: ParticipantId,
    pub role: RoleName,
}
