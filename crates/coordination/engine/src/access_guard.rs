//! Access guard: pure authorization decisions for run actions
//!
//! Rules are checked in order and the first failure wins:
//!
//! 1. The participant must belong to the addressed run.
//! 2. Writing a slot requires the participant's role in the slot's
//!    editable-by set, the role allowed in the current state, and the slot
//!    not owned exclusively by states the run can no longer reach.
//! 3. Advancing requires the role allowed in the current state.
//!
//! Completeness is a precondition of advancing but is checked by the run
//! machine against live slot data, not here.

use crate::TransitionResolver;
use coordination_types::{
    CoordinationError, CoordinationResult, ResolvedParticipant, Run, SlotName, StateDefinition,
    Template,
};

/// An action a participant attempts on a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    ReadRunContext,
    WriteSlot(SlotName),
    AdvanceState,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadRunContext => write!(f, "read_run_context"),
            Self::WriteSlot(slot) => write!(f, "write_slot({})", slot),
            Self::AdvanceState => write!(f, "advance_state"),
        }
    }
}

/// Stateless authorization over a run and its template
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessGuard;

impl AccessGuard {
    /// Allow or deny `action`. Has no side effects.
    pub fn authorize(
        participant: &ResolvedParticipant,
        run: &Run,
        template: &Template,
        action: &Action,
    ) -> CoordinationResult<()> {
        if participant.run_id != run.id {
            return Err(CoordinationError::ParticipantMismatch(run.id.clone()));
        }

        match action {
            Action::ReadRunContext => Ok(()),
            Action::WriteSlot(slot_name) => {
                let slot = template.get_slot(slot_name).ok_or_else(|| {
                    CoordinationError::SlotValidationFailed {
                        slot: slot_name.clone(),
                        reason: "slot does not exist in template".into(),
                    }
                })?;
                if !slot.is_editable_by(&participant.role) {
                    return Err(CoordinationError::SlotNotEditableByRole {
                        slot: slot_name.clone(),
                        role: participant.role.clone(),
                    });
                }

                let current = current_state(run, template)?;
                Self::require_role_in_state(participant, current)?;

                let owners = template.states_requiring(slot_name);
                if owners.is_empty() {
                    return Ok(());
                }
                let open = TransitionResolver::reachable_from(template, &current.name)?;
                if owners.iter().any(|state| open.contains(&state.name)) {
                    Ok(())
                } else {
                    Err(CoordinationError::RoleNotAllowedInState {
                        role: participant.role.clone(),
                        state: current.name.clone(),
                    })
                }
            }
            Action::AdvanceState => {
                let current = current_state(run, template)?;
                Self::require_role_in_state(participant, current)
            }
        }
    }

    fn require_role_in_state(
        participant: &ResolvedParticipant,
        state: &StateDefinition,
    ) -> CoordinationResult<()> {
        if state.allows_role(&participant.role) {
            Ok(())
        } else {
            Err(CoordinationError::RoleNotAllowedInState {
                role: participant.role.clone(),
                state: state.name.clone(),
            })
        }
    }
}

fn current_state<'a>(run: &Run, template: &'a Template) -> CoordinationResult<&'a StateDefinition> {
    template.get_state(&run.current_state).ok_or_else(|| {
        CoordinationError::TemplateIntegrity(format!(
            "run {} points at unknown state '{}'",
            run.id, run.current_state
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination_types::{
        Initiator, ParticipantId, Role, RoleName, RunId, Slot, StateName, Transitions,
    };

    fn template() -> Template {
        Template::new("Approval")
            .with_role(Role::new("requester"))
            .with_role(Role::new("approver"))
            .with_slot(Slot::text("request").editable_by("requester"))
            .with_slot(Slot::text("decision").editable_by("approver").visible_to("requester"))
            .with_slot(Slot::text("notes").editable_by("requester").editable_by("approver"))
            .with_state(
                StateDefinition::new("submit", 0)
                    .requires("request")
                    .allow("requester")
                    .allow("approver"),
            )
            .with_state(
                StateDefinition::new("review", 1)
                    .requires("decision")
                    .allow("approver")
                    .with_transitions(Transitions::to_states(["submit"])),
            )
    }

    fn run_at(state: &str) -> Run {
        let mut run = Run::new(
            coordination_types::TemplateId::new("t"),
            StateName::new("submit"),
            Initiator::new("host"),
        );
        run.current_state = StateName::new(state);
        run
    }

    fn as_role(run: &Run, role: &str) -> ResolvedParticipant {
        ResolvedParticipant {
            run_id: run.id.clone(),
            participant_id: ParticipantId::new(format!("p-{}", role)),
            role: RoleName::new(role),
        }
    }

    #[test]
    fn test_mismatched_run_is_denied_first() {
        let t = template();
        let run = run_at("submit");
        let mut who = as_role(&run, "requester");
        who.run_id = RunId::new("other-run");

        for action in [
            Action::ReadRunContext,
            Action::WriteSlot(SlotName::new("request")),
            Action::AdvanceState,
        ] {
            assert!(matches!(
                AccessGuard::authorize(&who, &run, &t, &action),
                Err(CoordinationError::ParticipantMismatch(_))
            ));
        }
    }

    #[test]
    fn test_write_requires_editable_by() {
        let t = template();
        let run = run_at("submit");
        // approver is allowed in submit but cannot edit the request slot
        let approver = as_role(&run, "approver");
        let err = AccessGuard::authorize(
            &approver,
            &run,
            &t,
            &Action::WriteSlot(SlotName::new("request")),
        )
        .unwrap_err();
        assert!(matches!(err, CoordinationError::SlotNotEditableByRole { .. }));

        let requester = as_role(&run, "requester");
        assert!(AccessGuard::authorize(
            &requester,
            &run,
            &t,
            &Action::WriteSlot(SlotName::new("request"))
        )
        .is_ok());
    }

    #[test]
    fn test_write_requires_role_in_current_state() {
        let t = template();
        let run = run_at("review");
        let requester = as_role(&run, "requester");
        let err = AccessGuard::authorize(
            &requester,
            &run,
            &t,
            &Action::WriteSlot(SlotName::new("notes")),
        )
        .unwrap_err();
        assert!(matches!(err, CoordinationError::RoleNotAllowedInState { .. }));
    }

    #[test]
    fn test_write_to_future_state_slot_is_allowed() {
        let t = template();
        let run = run_at("submit");
        let approver = as_role(&run, "approver");
        assert!(AccessGuard::authorize(
            &approver,
            &run,
            &t,
            &Action::WriteSlot(SlotName::new("decision"))
        )
        .is_ok());
    }

    #[test]
    fn test_write_to_unreachable_state_slot_is_denied() {
        let mut t = template();
        // review no longer loops back, so submit is behind the run
        t.states[1].transitions = Transitions::Sequence;
        t.slots[0] = t.slots[0].clone().editable_by("approver");
        let run = run_at("review");
        let approver = as_role(&run, "approver");

        let err = AccessGuard::authorize(
            &approver,
            &run,
            &t,
            &Action::WriteSlot(SlotName::new("request")),
        )
        .unwrap_err();
        assert!(matches!(err, CoordinationError::RoleNotAllowedInState { .. }));

        // slots no state requires stay writable
        assert!(AccessGuard::authorize(
            &approver,
            &run,
            &t,
            &Action::WriteSlot(SlotName::new("notes"))
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_slot_fails_validation() {
        let t = template();
        let run = run_at("submit");
        let requester = as_role(&run, "requester");
        assert!(matches!(
            AccessGuard::authorize(&requester, &run, &t, &Action::WriteSlot(SlotName::new("nope"))),
            Err(CoordinationError::SlotValidationFailed { .. })
        ));
    }

    #[test]
    fn test_advance_requires_allowed_role() {
        let t = template();
        let run = run_at("review");
        assert!(AccessGuard::authorize(&as_role(&run, "approver"), &run, &t, &Action::AdvanceState).is_ok());
        assert!(matches!(
            AccessGuard::authorize(&as_role(&run, "requester"), &run, &t, &Action::AdvanceState),
            Err(CoordinationError::RoleNotAllowedInState { .. })
        ));
    }

    #[test]
    fn test_corrupt_state_pointer() {
        let t = template();
        let run = run_at("deleted");
        assert!(matches!(
            AccessGuard::authorize(&as_role(&run, "approver"), &run, &t, &Action::AdvanceState),
            Err(CoordinationError::TemplateIntegrity(_))
        ));
    }
}
