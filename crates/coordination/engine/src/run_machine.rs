//! Run state machine: state entry, completion, abandonment and history
//!
//! A run's status moves only `active → completed` or `active → abandoned`.
//! Within `active`, the current state pointer moves along the template's
//! transition graph as resolved by [`TransitionResolver`].
//!
//! Callers serialize operations per run; every method here assumes it is
//! the only writer of the run it was handed.

use crate::{store::CoordinationStore, AccessGuard, Action, SlotStore, TransitionResolver};
use coordination_types::{
    CoordinationError, CoordinationResult, EntryKind, Initiator, ResolvedParticipant, Run,
    RunStateEntry, RunStatus, StateName, Template,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters of an advance call
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceRequest {
    /// Target to take when more than one transition is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_state: Option<StateName>,
    /// State the caller believes the run is in; a stale value fails the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_state: Option<StateName>,
}

impl AdvanceRequest {
    pub fn to(state: impl Into<String>) -> Self {
        Self {
            chosen_state: Some(StateName::new(state)),
            from_state: None,
        }
    }

    pub fn expecting(mut self, state: impl Into<String>) -> Self {
        self.from_state = Some(StateName::new(state));
        self
    }
}

/// Result of a successful advance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// The run entered a new state
    Moved {
        from: StateName,
        to: StateName,
        history_sequence: u64,
    },
    /// The run left its last state and is now completed
    Completed {
        state: StateName,
        history_sequence: u64,
    },
}

/// Drives runs through their template's states
pub struct RunMachine {
    store: Arc<dyn CoordinationStore>,
    slots: Arc<SlotStore>,
}

impl RunMachine {
    pub fn new(store: Arc<dyn CoordinationStore>, slots: Arc<SlotStore>) -> Self {
        Self { store, slots }
    }

    /// Create an active run at the template's first state and record its
    /// creation in history.
    pub fn start(&self, template: &Template, initiator: Initiator) -> CoordinationResult<Run> {
        let first = template.first_state().ok_or_else(|| {
            CoordinationError::TemplateIntegrity(format!("template {} has no states", template.id))
        })?;

        let run = Run::new(template.id.clone(), first.name.clone(), initiator);
        self.store.insert_run(run.clone())?;
        self.store.append_history(RunStateEntry::new(
            0,
            run.id.clone(),
            first.name.clone(),
            EntryKind::Created,
        ))?;

        tracing::info!(
            run_id = %run.id,
            template = %template.id,
            state = %first.name,
            "Run created"
        );
        Ok(run)
    }

    /// Advance `run` out of its current state.
    ///
    /// Checks, in order: run membership, run status, the caller's expected
    /// state, the caller's role, completeness, and finally the target
    /// choice against the resolved candidates.
    pub fn advance(
        &self,
        mut run: Run,
        template: &Template,
        participant: &ResolvedParticipant,
        request: &AdvanceRequest,
    ) -> CoordinationResult<AdvanceOutcome> {
        if participant.run_id != run.id {
            return Err(CoordinationError::ParticipantMismatch(run.id.clone()));
        }
        match run.status {
            RunStatus::Active => {}
            RunStatus::Completed => {
                return Err(CoordinationError::InvalidTransition(format!(
                    "run {} is already completed",
                    run.id
                )))
            }
            RunStatus::Abandoned => return Err(CoordinationError::RunNotActive(run.id.clone())),
        }
        if let Some(expected) = &request.from_state {
            if expected != &run.current_state {
                return Err(CoordinationError::InvalidTransition(format!(
                    "run {} is in state '{}', not '{}'",
                    run.id, run.current_state, expected
                )));
            }
        }

        AccessGuard::authorize(participant, &run, template, &Action::AdvanceState)?;

        let current = template.get_state(&run.current_state).ok_or_else(|| {
            CoordinationError::TemplateIntegrity(format!(
                "run {} points at unknown state '{}'",
                run.id, run.current_state
            ))
        })?;
        let missing = self.slots.missing_slots(&run.id, current)?;
        if !missing.is_empty() {
            return Err(CoordinationError::StateIncomplete {
                state: current.name.clone(),
                missing,
            });
        }

        let candidates = TransitionResolver::next_states(template, &current.name)?;
        let target = match (candidates.as_slice(), &request.chosen_state) {
            ([], None) => None,
            ([], Some(chosen)) => return Err(CoordinationError::InvalidTargetState(chosen.clone())),
            ([only], None) => Some(*only),
            (_, None) => {
                return Err(CoordinationError::AmbiguousTransition {
                    from: current.name.clone(),
                    candidates: candidates.iter().map(|s| s.name.clone()).collect(),
                })
            }
            (_, Some(chosen)) => Some(
                candidates
                    .iter()
                    .find(|s| &s.name == chosen)
                    .copied()
                    .ok_or_else(|| CoordinationError::InvalidTargetState(chosen.clone()))?,
            ),
        };

        let from = current.name.clone();
        match target {
            None => {
                let snapshot = self.slots.snapshot(&run.id, current)?;
                run.complete()?;
                self.store.update_run(run.clone())?;
                let entry = self.store.append_history(
                    RunStateEntry::new(0, run.id.clone(), from.clone(), EntryKind::Completed)
                        .with_snapshot(snapshot)
                        .by(participant.participant_id.clone()),
                )?;

                tracing::info!(run_id = %run.id, state = %from, "Run completed");
                Ok(AdvanceOutcome::Completed {
                    state: from,
                    history_sequence: entry.sequence,
                })
            }
            Some(next) => {
                let snapshot = self.slots.snapshot(&run.id, next)?;
                run.enter_state(next.name.clone())?;
                self.store.update_run(run.clone())?;
                let entry = self.store.append_history(
                    RunStateEntry::new(0, run.id.clone(), next.name.clone(), EntryKind::Entered)
                        .with_snapshot(snapshot)
                        .by(participant.participant_id.clone()),
                )?;

                tracing::info!(
                    run_id = %run.id,
                    from = %from,
                    to = %next.name,
                    participant = %participant.participant_id,
                    "Run advanced"
                );
                Ok(AdvanceOutcome::Moved {
                    from,
                    to: next.name.clone(),
                    history_sequence: entry.sequence,
                })
            }
        }
    }

    /// Abandon an active run
    pub fn abandon(&self, mut run: Run, reason: &str) -> CoordinationResult<Run> {
        run.abandon(reason)?;
        self.store.update_run(run.clone())?;
        self.store.append_history(
            RunStateEntry::new(0, run.id.clone(), run.current_state.clone(), EntryKind::Abandoned)
                .with_note(reason),
        )?;

        tracing::info!(run_id = %run.id, state = %run.current_state, reason, "Run abandoned");
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryStore, SlotValidator};
    use coordination_types::{ParticipantId, Role, RoleName, Slot, SlotName, StateDefinition, Transitions};
    use serde_json::json;

    struct Fixture {
        store: Arc<dyn CoordinationStore>,
        slots: Arc<SlotStore>,
        machine: RunMachine,
        template: Template,
    }

    fn fixture(template: Template) -> Fixture {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let slots = Arc::new(SlotStore::new(store.clone(), SlotValidator::default()));
        let machine = RunMachine::new(store.clone(), slots.clone());
        Fixture {
            store,
            slots,
            machine,
            template,
        }
    }

    fn two_step() -> Template {
        Template::new("Two step")
            .with_role(Role::new("member"))
            .with_slot(Slot::text("note").editable_by("member"))
            .with_state(StateDefinition::new("draft", 0).requires("note").allow("member"))
            .with_state(StateDefinition::new("done", 1).allow("member"))
    }

    fn member(run: &Run) -> ResolvedParticipant {
        ResolvedParticipant {
            run_id: run.id.clone(),
            participant_id: ParticipantId::new("p-1"),
            role: RoleName::new("member"),
        }
    }

    fn reload(f: &Fixture, run: &Run) -> Run {
        f.store.get_run(&run.id).unwrap().unwrap()
    }

    #[test]
    fn test_start_records_creation() {
        let f = fixture(two_step());
        let run = f.machine.start(&f.template, Initiator::new("host")).unwrap();
        assert_eq!(run.current_state, StateName::new("draft"));

        let history = f.store.list_history(&run.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, EntryKind::Created);
        assert!(history[0].slot_snapshot.is_empty());
    }

    #[test]
    fn test_advance_then_complete() {
        let f = fixture(two_step());
        let run = f.machine.start(&f.template, Initiator::new("host")).unwrap();
        let who = member(&run);

        let err = f
            .machine
            .advance(reload(&f, &run), &f.template, &who, &AdvanceRequest::default())
            .unwrap_err();
        assert!(matches!(err, CoordinationError::StateIncomplete { .. }));

        f.slots
            .write(&f.template, &who, &SlotName::new("note"), json!("hello"))
            .unwrap();
        let moved = f
            .machine
            .advance(reload(&f, &run), &f.template, &who, &AdvanceRequest::default())
            .unwrap();
        assert_eq!(
            moved,
            AdvanceOutcome::Moved {
                from: StateName::new("draft"),
                to: StateName::new("done"),
                history_sequence: 1,
            }
        );

        let done = f
            .machine
            .advance(reload(&f, &run), &f.template, &who, &AdvanceRequest::default())
            .unwrap();
        assert!(matches!(done, AdvanceOutcome::Completed { .. }));

        let run = reload(&f, &run);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.current_state, StateName::new("done"));

        let again = f
            .machine
            .advance(run, &f.template, &who, &AdvanceRequest::default())
            .unwrap_err();
        assert!(matches!(again, CoordinationError::InvalidTransition(_)));
    }

    #[test]
    fn test_stale_from_state_is_rejected() {
        let f = fixture(two_step());
        let run = f.machine.start(&f.template, Initiator::new("host")).unwrap();
        let who = member(&run);
        f.slots
            .write(&f.template, &who, &SlotName::new("note"), json!("x"))
            .unwrap();

        let request = AdvanceRequest::default().expecting("done");
        let err = f
            .machine
            .advance(reload(&f, &run), &f.template, &who, &request)
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidTransition(_)));
        assert_eq!(reload(&f, &run).current_state, StateName::new("draft"));
    }

    #[test]
    fn test_branching_requires_choice() {
        let mut template = two_step().with_state(StateDefinition::new("alt", 2).allow("member"));
        template.states[0].transitions = Transitions::to_states(["done", "alt"]);
        let f = fixture(template);
        let run = f.machine.start(&f.template, Initiator::new("host")).unwrap();
        let who = member(&run);
        f.slots
            .write(&f.template, &who, &SlotName::new("note"), json!("x"))
            .unwrap();

        match f
            .machine
            .advance(reload(&f, &run), &f.template, &who, &AdvanceRequest::default())
        {
            Err(CoordinationError::AmbiguousTransition { candidates, .. }) => {
                assert_eq!(candidates, vec![StateName::new("done"), StateName::new("alt")]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }

        let err = f
            .machine
            .advance(reload(&f, &run), &f.template, &who, &AdvanceRequest::to("draft"))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidTargetState(_)));

        let moved = f
            .machine
            .advance(reload(&f, &run), &f.template, &who, &AdvanceRequest::to("alt"))
            .unwrap();
        assert!(matches!(moved, AdvanceOutcome::Moved { ref to, .. } if to.as_str() == "alt"));
    }

    #[test]
    fn test_abandon_is_terminal() {
        let f = fixture(two_step());
        let run = f.machine.start(&f.template, Initiator::new("host")).unwrap();
        let who = member(&run);

        let abandoned = f.machine.abandon(reload(&f, &run), "timeout").unwrap();
        assert_eq!(abandoned.status, RunStatus::Abandoned);

        let history = f.store.list_history(&run.id).unwrap();
        assert_eq!(history.last().unwrap().kind, EntryKind::Abandoned);
        assert_eq!(history.last().unwrap().note.as_deref(), Some("timeout"));

        assert!(matches!(
            f.machine
                .advance(reload(&f, &run), &f.template, &who, &AdvanceRequest::default()),
            Err(CoordinationError::RunNotActive(_))
        ));
        assert!(matches!(
            f.machine.abandon(reload(&f, &run), "again"),
            Err(CoordinationError::RunNotActive(_))
        ));
    }
}
