//! Coordinator: the engine's single entry point
//!
//! Wires the template registry, token authority, access guard, slot store
//! and run machine together. Every mutating operation on a run executes
//! under that run's lock, so a completeness check and the advance it
//! permits are one atomic step, and same-slot writes commit in a total
//! order.

use crate::{
    store::CoordinationStore, AccessGuard, Action, AdvanceOutcome, AdvanceRequest, EngineConfig,
    InMemoryStore, RunContext, RunMachine, SlotStore, SlotValidator, TemplateRegistry,
    TokenAuthority, TransitionResolver,
};
use coordination_types::{
    CoordinationError, CoordinationResult, Initiator, MagicToken, Participant, ParticipantId,
    ParticipantIdentity, ResolvedParticipant, RoleName, Run, RunId, RunStateEntry, SlotName,
    SlotValue, StateName, Template, TemplateId,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A freshly invited participant and the token for their magic link
#[derive(Clone, Debug, Serialize)]
pub struct Invitation {
    pub participant: Participant,
    pub token: MagicToken,
}

/// Coordination engine façade
pub struct Coordinator {
    config: EngineConfig,
    templates: TemplateRegistry,
    tokens: TokenAuthority,
    store: Arc<dyn CoordinationStore>,
    slots: Arc<SlotStore>,
    machine: RunMachine,
    run_locks: DashMap<RunId, Arc<Mutex<()>>>,
}

impl Coordinator {
    /// Create a coordinator persisting through `store`
    pub fn new(config: EngineConfig, store: Arc<dyn CoordinationStore>) -> Self {
        let templates =
            TemplateRegistry::with_validator(SlotValidator::new(config.max_value_bytes));
        let slots = Arc::new(SlotStore::new(
            store.clone(),
            SlotValidator::new(config.max_value_bytes),
        ));
        let machine = RunMachine::new(store.clone(), slots.clone());

        Self {
            config,
            templates,
            tokens: TokenAuthority::new(),
            store,
            slots,
            machine,
            run_locks: DashMap::new(),
        }
    }

    /// Create a coordinator with default limits and an in-memory store
    pub fn in_memory() -> Self {
        Self::new(EngineConfig::default(), Arc::new(InMemoryStore::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    // ── Templates ───────────────────────────────────────────────────

    /// Register an immutable template version
    pub fn register_template(&self, template: Template) -> CoordinationResult<TemplateId> {
        self.templates.register(template)
    }

    pub fn template(&self, id: &TemplateId) -> CoordinationResult<Arc<Template>> {
        self.templates.get(id)
    }

    // ── Runs ────────────────────────────────────────────────────────

    /// Instantiate a template as an active run at its first state
    pub fn create_run(
        &self,
        template_id: &TemplateId,
        initiator: Initiator,
    ) -> CoordinationResult<Run> {
        let template = self.templates.get(template_id)?;
        if !template.is_active {
            return Err(CoordinationError::TemplateInactive(template_id.clone()));
        }
        self.machine.start(&template, initiator)
    }

    pub fn get_run(&self, run_id: &RunId) -> CoordinationResult<Run> {
        self.store
            .get_run(run_id)?
            .ok_or_else(|| CoordinationError::RunNotFound(run_id.clone()))
    }

    pub fn list_runs(&self) -> CoordinationResult<Vec<Run>> {
        self.store.list_runs()
    }

    /// Move an active run to `abandoned`. Operator action.
    pub fn abandon(&self, run_id: &RunId, reason: &str) -> CoordinationResult<Run> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock();

        let run = self.get_run(run_id)?;
        let abandoned = self.machine.abandon(run, reason)?;
        self.release_lock(run_id);
        Ok(abandoned)
    }

    /// History entries of a run in append order
    pub fn history(&self, run_id: &RunId) -> CoordinationResult<Vec<RunStateEntry>> {
        self.get_run(run_id)?;
        self.store.list_history(run_id)
    }

    pub fn slot_values(&self, run_id: &RunId) -> CoordinationResult<Vec<SlotValue>> {
        self.get_run(run_id)?;
        self.slots.values(run_id)
    }

    pub fn slot_value(
        &self,
        run_id: &RunId,
        slot: &SlotName,
    ) -> CoordinationResult<Option<SlotValue>> {
        self.get_run(run_id)?;
        self.slots.get(run_id, slot)
    }

    /// Whether every required slot of `state` holds a value for the run
    pub fn is_state_complete(&self, run_id: &RunId, state: &StateName) -> CoordinationResult<bool> {
        let run = self.get_run(run_id)?;
        let template = self.template_for(&run)?;
        let definition = template
            .get_state(state)
            .ok_or_else(|| CoordinationError::InvalidTargetState(state.clone()))?;
        self.slots.is_state_complete(run_id, definition)
    }

    /// States the run may move to next. Empty for terminal runs.
    pub fn next_states(&self, run_id: &RunId) -> CoordinationResult<Vec<StateName>> {
        let run = self.get_run(run_id)?;
        if !run.is_active() {
            return Ok(Vec::new());
        }
        let template = self.template_for(&run)?;
        Ok(TransitionResolver::next_states(&template, &run.current_state)?
            .into_iter()
            .map(|s| s.name.clone())
            .collect())
    }

    // ── Participants ────────────────────────────────────────────────

    /// Add a participant in `role` and issue their magic token
    pub fn invite(
        &self,
        run_id: &RunId,
        role: &RoleName,
        identity: ParticipantIdentity,
    ) -> CoordinationResult<Invitation> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock();

        let run = self.get_run(run_id)?;
        run.ensure_active()?;
        let template = self.template_for(&run)?;
        let role_def = template
            .get_role(role)
            .ok_or_else(|| CoordinationError::RoleNotFound(role.clone()))?;

        let active: Vec<Participant> = self
            .store
            .list_participants(run_id)?
            .into_iter()
            .filter(Participant::is_active)
            .collect();
        if active.len() >= self.config.max_participants_per_run {
            return Err(CoordinationError::RunCapacityReached {
                run: run_id.clone(),
                max: self.config.max_participants_per_run,
            });
        }
        let in_role = active.iter().filter(|p| &p.role == role).count();
        if self.config.enforce_role_max && !role_def.has_capacity(in_role) {
            return Err(CoordinationError::RoleCapacityReached {
                role: role.clone(),
                max: role_def.max_participants.unwrap_or_default(),
            });
        }

        let participant = Participant::new(run_id.clone(), role.clone(), identity);
        self.store.insert_participant(participant.clone())?;
        let token = self.tokens.issue(run_id, &participant.id, role);

        tracing::info!(
            run_id = %run_id,
            participant = %participant.id,
            role = %role,
            "Participant invited"
        );
        Ok(Invitation { participant, token })
    }

    pub fn participants(&self, run_id: &RunId) -> CoordinationResult<Vec<Participant>> {
        self.get_run(run_id)?;
        self.store.list_participants(run_id)
    }

    /// Revoke a participant: their token stops resolving and the record
    /// keeps the reason and time.
    pub fn revoke(
        &self,
        run_id: &RunId,
        participant_id: &ParticipantId,
        reason: &str,
    ) -> CoordinationResult<Participant> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock();
        self.revoke_locked(run_id, participant_id, reason)
    }

    /// Revocation body. Caller holds the run lock.
    fn revoke_locked(
        &self,
        run_id: &RunId,
        participant_id: &ParticipantId,
        reason: &str,
    ) -> CoordinationResult<Participant> {
        let mut participant = self
            .store
            .get_participant(participant_id)?
            .filter(|p| &p.run_id == run_id)
            .ok_or_else(|| CoordinationError::ParticipantNotFound(participant_id.clone()))?;

        let had_token = self.tokens.has_live_token(participant_id);
        self.tokens.revoke(participant_id);
        if participant.is_active() {
            participant.revoke(reason);
            self.store.update_participant(participant.clone())?;
            tracing::info!(
                run_id = %run_id,
                participant = %participant_id,
                had_token,
                reason,
                "Participant revoked"
            );
        }
        Ok(participant)
    }

    // ── Magic-link operations ───────────────────────────────────────

    /// Resolve a magic link into the participant's view of the run
    pub fn validate_link(&self, run_id: &RunId, token: &str) -> CoordinationResult<RunContext> {
        observe(run_id, &Action::ReadRunContext, self.try_validate_link(run_id, token))
    }

    /// Write a slot value on behalf of the token's participant
    pub fn write_slot(
        &self,
        run_id: &RunId,
        token: &str,
        slot: &SlotName,
        value: serde_json::Value,
    ) -> CoordinationResult<SlotValue> {
        observe(
            run_id,
            &Action::WriteSlot(slot.clone()),
            self.try_write_slot(run_id, token, slot, value),
        )
    }

    /// Advance the run out of its current state
    pub fn advance(
        &self,
        run_id: &RunId,
        token: &str,
        request: AdvanceRequest,
    ) -> CoordinationResult<AdvanceOutcome> {
        observe(run_id, &Action::AdvanceState, self.try_advance(run_id, token, &request))
    }

    /// Replace the caller's own token. The presented token stops resolving.
    pub fn rotate_token(&self, run_id: &RunId, token: &str) -> CoordinationResult<MagicToken> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock();

        let who = self.tokens.resolve(token)?;
        if &who.run_id != run_id {
            return Err(CoordinationError::ParticipantMismatch(run_id.clone()));
        }
        self.get_run(run_id)?;
        self.tokens.rotate(&who.participant_id)
    }

    fn try_validate_link(&self, run_id: &RunId, token: &str) -> CoordinationResult<RunContext> {
        let who = self.tokens.resolve(token)?;
        let run = self.get_run(run_id)?;
        let template = self.template_for(&run)?;
        AccessGuard::authorize(&who, &run, &template, &Action::ReadRunContext)?;

        let current = template.get_state(&run.current_state).ok_or_else(|| {
            CoordinationError::TemplateIntegrity(format!(
                "run {} points at unknown state '{}'",
                run.id, run.current_state
            ))
        })?;
        let next = if run.is_active() {
            TransitionResolver::next_transitions(&template, &current.name)?
        } else {
            Vec::new()
        };
        let participants = self.store.list_participants(run_id)?;

        RunContext::build(&who, &run, &template, current, &next, &participants, &self.slots)
    }

    fn try_write_slot(
        &self,
        run_id: &RunId,
        token: &str,
        slot: &SlotName,
        value: serde_json::Value,
    ) -> CoordinationResult<SlotValue> {
        // Resolve under the lock so a concurrent revoke is observed
        let lock = self.run_lock(run_id);
        let _guard = lock.lock();
        let who = self.tokens.resolve(token)?;

        let run = self.get_run(run_id)?;
        ensure_member(&who, &run)?;
        run.ensure_active()?;
        let template = self.template_for(&run)?;
        AccessGuard::authorize(&who, &run, &template, &Action::WriteSlot(slot.clone()))?;

        self.slots.write(&template, &who, slot, value)
    }

    fn try_advance(
        &self,
        run_id: &RunId,
        token: &str,
        request: &AdvanceRequest,
    ) -> CoordinationResult<AdvanceOutcome> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock();
        let who = self.tokens.resolve(token)?;

        let run = self.get_run(run_id)?;
        ensure_member(&who, &run)?;
        let template = self.template_for(&run)?;
        let outcome = self.machine.advance(run, &template, &who, request)?;
        if let AdvanceOutcome::Completed { .. } = outcome {
            self.release_lock(run_id);
        }
        Ok(outcome)
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Lock serializing mutations of an active run. Unknown and terminal
    /// runs get an unshared lock: they reject every run mutation, and the
    /// table only holds entries for runs still in progress.
    fn run_lock(&self, run_id: &RunId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.run_locks.get(run_id) {
            return lock.clone();
        }
        match self.store.get_run(run_id) {
            Ok(Some(run)) if run.is_active() => {
                self.run_locks.entry(run_id.clone()).or_default().clone()
            }
            _ => Arc::default(),
        }
    }

    /// Drop the lock entry of a run that just turned terminal. Callers
    /// still queued on the old mutex see the terminal status and bail out.
    fn release_lock(&self, run_id: &RunId) {
        self.run_locks.remove(run_id);
    }

    /// Template a stored run was created from. A run always references a
    /// registered template, so a miss is an integrity failure.
    fn template_for(&self, run: &Run) -> CoordinationResult<Arc<Template>> {
        self.templates.get(&run.template_id).map_err(|_| {
            CoordinationError::TemplateIntegrity(format!(
                "run {} references unknown template {}",
                run.id, run.template_id
            ))
        })
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("templates", &self.templates.count())
            .field("live_tokens", &self.tokens.live_count())
            .field("active_run_locks", &self.run_locks.len())
            .finish()
    }
}

fn ensure_member(who: &ResolvedParticipant, run: &Run) -> CoordinationResult<()> {
    if who.run_id == run.id {
        Ok(())
    } else {
        Err(CoordinationError::ParticipantMismatch(run.id.clone()))
    }
}

/// Log authorization denials before handing the result back
fn observe<T>(
    run_id: &RunId,
    action: &Action,
    result: CoordinationResult<T>,
) -> CoordinationResult<T> {
    if let Err(err) = &result {
        if err.is_authorization() {
            tracing::warn!(run_id = %run_id, action = %action, code = err.code(), "Access denied");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination_types::{EntryKind, Role, RunStatus, Slot, StateDefinition};
    use serde_json::json;

    fn check_in() -> Template {
        Template::new("Check-in")
            .with_role(Role::new("partner_a").with_max_participants(1))
            .with_role(Role::new("partner_b").with_max_participants(1))
            .with_slot(
                Slot::text("moodA")
                    .editable_by("partner_a")
                    .visible_to("partner_b"),
            )
            .with_slot(Slot::text("moodB").editable_by("partner_b"))
            .with_state(
                StateDefinition::new("warmup", 0)
                    .requires("moodA")
                    .requires("moodB")
                    .allow("partner_a")
                    .allow("partner_b"),
            )
            .with_state(
                StateDefinition::new("share", 1)
                    .allow("partner_a")
                    .allow("partner_b"),
            )
    }

    fn started() -> (Coordinator, Run) {
        let coordinator = Coordinator::in_memory();
        let id = coordinator.register_template(check_in()).unwrap();
        let run = coordinator.create_run(&id, Initiator::new("host")).unwrap();
        (coordinator, run)
    }

    fn invite(coordinator: &Coordinator, run: &Run, role: &str, name: &str) -> Invitation {
        coordinator
            .invite(&run.id, &RoleName::new(role), ParticipantIdentity::named(name))
            .unwrap()
    }

    #[test]
    fn test_create_run_starts_at_first_state() {
        let (coordinator, run) = started();
        assert_eq!(run.status, RunStatus::Active);
        assert_eq!(run.current_state, StateName::new("warmup"));

        let history = coordinator.history(&run.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, EntryKind::Created);
        assert_eq!(
            coordinator.next_states(&run.id).unwrap(),
            vec![StateName::new("share")]
        );
    }

    #[test]
    fn test_inactive_template_cannot_start() {
        let coordinator = Coordinator::in_memory();
        let id = coordinator.register_template(check_in().inactive()).unwrap();
        assert!(matches!(
            coordinator.create_run(&id, Initiator::new("host")),
            Err(CoordinationError::TemplateInactive(_))
        ));
    }

    #[test]
    fn test_invite_enforces_roles_and_capacity() {
        let (coordinator, run) = started();
        invite(&coordinator, &run, "partner_a", "Ada");

        assert!(matches!(
            coordinator.invite(&run.id, &RoleName::new("partner_a"), ParticipantIdentity::named("Eve")),
            Err(CoordinationError::RoleCapacityReached { max: 1, .. })
        ));
        assert!(matches!(
            coordinator.invite(&run.id, &RoleName::new("judge"), ParticipantIdentity::named("Eve")),
            Err(CoordinationError::RoleNotFound(_))
        ));
        assert!(matches!(
            coordinator.invite(&RunId::new("missing"), &RoleName::new("partner_b"), ParticipantIdentity::default()),
            Err(CoordinationError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_run_wide_participant_limit() {
        let config = EngineConfig {
            max_participants_per_run: 1,
            ..EngineConfig::default()
        };
        let coordinator = Coordinator::new(config, Arc::new(InMemoryStore::new()));
        let id = coordinator.register_template(check_in()).unwrap();
        let run = coordinator.create_run(&id, Initiator::new("host")).unwrap();
        invite(&coordinator, &run, "partner_a", "Ada");

        assert!(matches!(
            coordinator.invite(&run.id, &RoleName::new("partner_b"), ParticipantIdentity::named("Bo")),
            Err(CoordinationError::RunCapacityReached { max: 1, .. })
        ));
    }

    #[test]
    fn test_validate_link_builds_context() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");
        let bo = invite(&coordinator, &run, "partner_b", "Bo");
        coordinator
            .write_slot(&run.id, ada.token.as_str(), &SlotName::new("moodA"), json!("calm"))
            .unwrap();

        let context = coordinator.validate_link(&run.id, bo.token.as_str()).unwrap();
        assert_eq!(context.participant.display_name, "Bo");
        assert_eq!(context.current_state.name, StateName::new("warmup"));
        assert_eq!(context.current_state.missing_slots, vec![SlotName::new("moodB")]);
        assert!(context.current_state.can_advance);
        assert_eq!(context.next_states.len(), 1);
        assert_eq!(context.roster.len(), 2);
        assert!(context.understaffed_roles.is_empty());

        // partner_b reads moodA through visibility and moodB as its editor
        let moods: Vec<_> = context.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(moods, vec!["moodA", "moodB"]);
        assert_eq!(context.slots[0].value, Some(json!("calm")));
        assert!(!context.slots[0].editable);
        assert!(context.slots[1].editable);
    }

    #[test]
    fn test_validate_link_failures() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");

        assert!(matches!(
            coordinator.validate_link(&run.id, "not-a-token"),
            Err(CoordinationError::InvalidToken)
        ));
        assert!(matches!(
            coordinator.validate_link(&RunId::new("missing"), ada.token.as_str()),
            Err(CoordinationError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_write_respects_editable_by() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");

        let err = coordinator
            .write_slot(&run.id, ada.token.as_str(), &SlotName::new("moodB"), json!("sneaky"))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::SlotNotEditableByRole { .. }));
        assert!(coordinator.slot_values(&run.id).unwrap().is_empty());
    }

    #[test]
    fn test_advance_flow() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");
        let bo = invite(&coordinator, &run, "partner_b", "Bo");
        let warmup = StateName::new("warmup");

        coordinator
            .write_slot(&run.id, ada.token.as_str(), &SlotName::new("moodA"), json!("calm"))
            .unwrap();
        assert!(!coordinator.is_state_complete(&run.id, &warmup).unwrap());
        assert!(matches!(
            coordinator.advance(&run.id, ada.token.as_str(), AdvanceRequest::default()),
            Err(CoordinationError::StateIncomplete { .. })
        ));

        coordinator
            .write_slot(&run.id, bo.token.as_str(), &SlotName::new("moodB"), json!("tired"))
            .unwrap();
        assert!(coordinator.is_state_complete(&run.id, &warmup).unwrap());

        let outcome = coordinator
            .advance(&run.id, bo.token.as_str(), AdvanceRequest::default())
            .unwrap();
        assert!(matches!(outcome, AdvanceOutcome::Moved { ref to, .. } if to.as_str() == "share"));

        let history = coordinator.history(&run.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].entered_by, Some(bo.participant.id.clone()));

        let done = coordinator
            .advance(&run.id, ada.token.as_str(), AdvanceRequest::default().expecting("share"))
            .unwrap();
        assert!(matches!(done, AdvanceOutcome::Completed { .. }));
        assert_eq!(coordinator.get_run(&run.id).unwrap().status, RunStatus::Completed);
        assert!(coordinator.next_states(&run.id).unwrap().is_empty());
    }

    #[test]
    fn test_abandon_blocks_further_writes() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");

        let abandoned = coordinator.abandon(&run.id, "no show").unwrap();
        assert_eq!(abandoned.status, RunStatus::Abandoned);
        assert_eq!(abandoned.abandoned_reason.as_deref(), Some("no show"));

        assert!(matches!(
            coordinator.write_slot(&run.id, ada.token.as_str(), &SlotName::new("moodA"), json!("x")),
            Err(CoordinationError::RunNotActive(_))
        ));
        assert!(matches!(
            coordinator.advance(&run.id, ada.token.as_str(), AdvanceRequest::default()),
            Err(CoordinationError::RunNotActive(_))
        ));
        assert!(matches!(
            coordinator.abandon(&run.id, "twice"),
            Err(CoordinationError::RunNotActive(_))
        ));
        // the participant can still look at the run
        assert!(coordinator.validate_link(&run.id, ada.token.as_str()).is_ok());
    }

    #[test]
    fn test_rotate_token() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");

        let fresh = coordinator.rotate_token(&run.id, ada.token.as_str()).unwrap();
        assert!(matches!(
            coordinator.validate_link(&run.id, ada.token.as_str()),
            Err(CoordinationError::InvalidToken)
        ));
        assert!(coordinator.validate_link(&run.id, fresh.as_str()).is_ok());

        assert!(matches!(
            coordinator.rotate_token(&RunId::new("other"), fresh.as_str()),
            Err(CoordinationError::ParticipantMismatch(_))
        ));
    }

    #[test]
    fn test_revoke_participant() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");

        let revoked = coordinator
            .revoke(&run.id, &ada.participant.id, "left the session")
            .unwrap();
        assert!(!revoked.is_active());
        assert_eq!(revoked.revoked_reason.as_deref(), Some("left the session"));
        assert!(revoked.revoked_at.is_some());

        assert!(matches!(
            coordinator.validate_link(&run.id, ada.token.as_str()),
            Err(CoordinationError::InvalidToken)
        ));
        // the record is kept and the role seat frees up
        assert_eq!(coordinator.participants(&run.id).unwrap().len(), 1);
        invite(&coordinator, &run, "partner_a", "Ada again");

        assert!(matches!(
            coordinator.revoke(&RunId::new("other"), &ada.participant.id, "x"),
            Err(CoordinationError::ParticipantNotFound(_))
        ));
    }

    #[test]
    fn test_revoke_lands_before_queued_write_and_advance() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");
        let bo = invite(&coordinator, &run, "partner_b", "Bo");
        coordinator
            .write_slot(&run.id, bo.token.as_str(), &SlotName::new("moodB"), json!("ok"))
            .unwrap();

        let lock = coordinator.run_lock(&run.id);
        let guard = lock.lock();
        let (write, advance) = std::thread::scope(|s| {
            let write = s.spawn(|| {
                coordinator.write_slot(
                    &run.id,
                    ada.token.as_str(),
                    &SlotName::new("moodA"),
                    json!("after revoke"),
                )
            });
            let advance = s.spawn(|| {
                coordinator.advance(&run.id, ada.token.as_str(), AdvanceRequest::default())
            });
            std::thread::sleep(std::time::Duration::from_millis(50));

            coordinator
                .revoke_locked(&run.id, &ada.participant.id, "removed mid-request")
                .unwrap();
            drop(guard);
            (write.join().unwrap(), advance.join().unwrap())
        });

        assert!(matches!(write, Err(CoordinationError::InvalidToken)));
        assert!(matches!(advance, Err(CoordinationError::InvalidToken)));
        assert!(coordinator
            .slot_value(&run.id, &SlotName::new("moodA"))
            .unwrap()
            .is_none());
        assert_eq!(
            coordinator.get_run(&run.id).unwrap().current_state,
            StateName::new("warmup")
        );
    }

    #[test]
    fn test_revoke_drops_live_token_once() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");
        assert!(coordinator.tokens.has_live_token(&ada.participant.id));

        coordinator.revoke(&run.id, &ada.participant.id, "left").unwrap();
        assert!(!coordinator.tokens.has_live_token(&ada.participant.id));
        // revoking again keeps the first reason
        let again = coordinator.revoke(&run.id, &ada.participant.id, "twice").unwrap();
        assert_eq!(again.revoked_reason.as_deref(), Some("left"));
    }

    #[test]
    fn test_terminal_runs_release_their_lock() {
        let (coordinator, run) = started();
        let ada = invite(&coordinator, &run, "partner_a", "Ada");
        let bo = invite(&coordinator, &run, "partner_b", "Bo");
        assert_eq!(coordinator.run_locks.len(), 1);

        coordinator
            .write_slot(&run.id, ada.token.as_str(), &SlotName::new("moodA"), json!("a"))
            .unwrap();
        coordinator
            .write_slot(&run.id, bo.token.as_str(), &SlotName::new("moodB"), json!("b"))
            .unwrap();
        coordinator
            .advance(&run.id, ada.token.as_str(), AdvanceRequest::default())
            .unwrap();
        coordinator
            .advance(&run.id, ada.token.as_str(), AdvanceRequest::default())
            .unwrap();
        assert!(coordinator.run_locks.is_empty());

        // later calls on the finished run do not bring the entry back
        assert!(coordinator
            .write_slot(&run.id, ada.token.as_str(), &SlotName::new("moodA"), json!("late"))
            .is_err());
        coordinator.rotate_token(&run.id, bo.token.as_str()).unwrap();
        assert!(coordinator.run_locks.is_empty());

        let other = coordinator
            .create_run(&run.template_id, Initiator::new("host"))
            .unwrap();
        invite(&coordinator, &other, "partner_a", "Cy");
        assert_eq!(coordinator.run_locks.len(), 1);
        coordinator.abandon(&other.id, "cancelled").unwrap();
        assert!(coordinator.run_locks.is_empty());

        assert!(coordinator
            .invite(&RunId::new("missing"), &RoleName::new("partner_a"), ParticipantIdentity::default())
            .is_err());
        assert!(coordinator.run_locks.is_empty());
    }

    #[test]
    fn test_unknown_state_for_completeness() {
        let (coordinator, run) = started();
        assert!(matches!(
            coordinator.is_state_complete(&run.id, &StateName::new("nowhere")),
            Err(CoordinationError::InvalidTargetState(_))
        ));
    }
}
