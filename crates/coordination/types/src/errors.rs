//! Error types for the coordination layer

use crate::{ParticipantId, RoleName, RunId, SlotName, StateName, TemplateId};

/// Errors that can occur in coordination operations.
///
/// Every variant is caller-visible and non-retryable without correction:
/// either the request was unauthorized or invalid, or a precondition on
/// the run was not met.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("Invalid or revoked magic token")]
    InvalidToken,

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Participant does not belong to run {0}")]
    ParticipantMismatch(RunId),

    #[error("Role '{role}' is not allowed in state '{state}'")]
    RoleNotAllowedInState { role: RoleName, state: StateName },

    #[error("Slot '{slot}' is not editable by role '{role}'")]
    SlotNotEditableByRole { slot: SlotName, role: RoleName },

    #[error("Slot '{slot}' validation failed: {reason}")]
    SlotValidationFailed { slot: SlotName, reason: String },

    #[error("State '{state}' is incomplete, missing slots: {missing:?}")]
    StateIncomplete {
        state: StateName,
        missing: Vec<SlotName>,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Ambiguous transition from '{from}', choose one of {candidates:?}")]
    AmbiguousTransition {
        from: StateName,
        candidates: Vec<StateName>,
    },

    #[error("Target state '{0}' is not a candidate transition")]
    InvalidTargetState(StateName),

    #[error("Run not active: {0}")]
    RunNotActive(RunId),

    #[error("Template integrity violation: {0}")]
    TemplateIntegrity(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("Template already registered: {0}")]
    TemplateAlreadyRegistered(TemplateId),

    #[error("Template is not active: {0}")]
    TemplateInactive(TemplateId),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Role not found: {0}")]
    RoleNotFound(RoleName),

    #[error("Role '{role}' already has {max} participants")]
    RoleCapacityReached { role: RoleName, max: u32 },

    #[error("Run {run} already has {max} participants")]
    RunCapacityReached { run: RunId, max: usize },

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoordinationError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::RunNotFound(_) => "RUN_NOT_FOUND",
            Self::ParticipantMismatch(_) => "PARTICIPANT_MISMATCH",
            Self::RoleNotAllowedInState { .. } => "ROLE_NOT_ALLOWED_IN_STATE",
            Self::SlotNotEditableByRole { .. } => "SLOT_NOT_EDITABLE_BY_ROLE",
            Self::SlotValidationFailed { .. } => "SLOT_VALIDATION_FAILED",
            Self::StateIncomplete { .. } => "STATE_INCOMPLETE",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::AmbiguousTransition { .. } => "AMBIGUOUS_TRANSITION",
            Self::InvalidTargetState(_) => "INVALID_TARGET_STATE",
            Self::RunNotActive(_) => "RUN_NOT_ACTIVE",
            Self::TemplateIntegrity(_) => "TEMPLATE_INTEGRITY_ERROR",
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::TemplateAlreadyRegistered(_) => "TEMPLATE_ALREADY_REGISTERED",
            Self::TemplateInactive(_) => "TEMPLATE_INACTIVE",
            Self::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Self::RoleNotFound(_) => "ROLE_NOT_FOUND",
            Self::RoleCapacityReached { .. } => "ROLE_CAPACITY_REACHED",
            Self::RunCapacityReached { .. } => "RUN_CAPACITY_REACHED",
            Self::ParticipantNotFound(_) => "PARTICIPANT_NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether this error denies access rather than reporting a bad precondition
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken
                | Self::ParticipantMismatch(_)
                | Self::RoleNotAllowedInState { .. }
                | Self::SlotNotEditableByRole { .. }
        )
    }
}

/// Result type alias for coordination operations
pub type CoordinationResult<T> = Result<T, CoordinationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(CoordinationError::InvalidToken.code(), "INVALID_TOKEN");
        assert_eq!(
            CoordinationError::TemplateIntegrity("x".into()).code(),
            "TEMPLATE_INTEGRITY_ERROR"
        );
        let err = CoordinationError::AmbiguousTransition {
            from: StateName::new("warmup"),
            candidates: vec![StateName::new("share_a"), StateName::new("share_b")],
        };
        assert_eq!(err.code(), "AMBIGUOUS_TRANSITION");
        assert!(err.to_string().contains("share_a"));
    }

    #[test]
    fn test_authorization_classification() {
        assert!(CoordinationError::InvalidToken.is_authorization());
        assert!(CoordinationError::ParticipantMismatch(RunId::new("r")).is_authorization());
        assert!(!CoordinationError::RunNotFound(RunId::new("r")).is_authorization());
        assert!(!CoordinationError::StateIncomplete {
            state: StateName::new("s"),
            missing: vec![],
        }
        .is_authorization());
    }
}
