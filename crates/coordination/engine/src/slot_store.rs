//! Slot store: validated slot writes and state completeness
//!
//! A state is complete when every one of its required slots holds a value
//! for the run. Completeness is recomputed from stored values on every
//! call; slot writes may arrive in any order relative to state entry.

use crate::{store::CoordinationStore, SlotValidator};
use chrono::Utc;
use coordination_types::{
    CoordinationError, CoordinationResult, ResolvedParticipant, RunId, SlotName, SlotValue,
    StateDefinition, Template,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Per-run slot values backed by a [`CoordinationStore`]
pub struct SlotStore {
    store: Arc<dyn CoordinationStore>,
    validator: SlotValidator,
}

impl SlotStore {
    pub fn new(store: Arc<dyn CoordinationStore>, validator: SlotValidator) -> Self {
        Self { store, validator }
    }

    /// Validate and upsert a value. The last committed write for a slot wins.
    pub fn write(
        &self,
        template: &Template,
        writer: &ResolvedParticipant,
        slot_name: &SlotName,
        value: serde_json::Value,
    ) -> CoordinationResult<SlotValue> {
        let slot = template.get_slot(slot_name).ok_or_else(|| {
            CoordinationError::SlotValidationFailed {
                slot: slot_name.clone(),
                reason: "slot does not exist in template".into(),
            }
        })?;
        self.validator.check(slot, &value)?;

        let stored = self.store.upsert_slot_value(SlotValue {
            run_id: writer.run_id.clone(),
            slot: slot_name.clone(),
            value,
            writer_role: writer.role.clone(),
            writer: writer.participant_id.clone(),
            written_at: Utc::now(),
            revision: 0,
        })?;

        tracing::debug!(
            run_id = %stored.run_id,
            slot = %stored.slot,
            role = %stored.writer_role,
            revision = stored.revision,
            "Slot written"
        );
        Ok(stored)
    }

    pub fn get(&self, run_id: &RunId, slot: &SlotName) -> CoordinationResult<Option<SlotValue>> {
        self.store.get_slot_value(run_id, slot)
    }

    pub fn values(&self, run_id: &RunId) -> CoordinationResult<Vec<SlotValue>> {
        self.store.list_slot_values(run_id)
    }

    /// Required slots of `state` that have no value yet, in declared order
    pub fn missing_slots(
        &self,
        run_id: &RunId,
        state: &StateDefinition,
    ) -> CoordinationResult<Vec<SlotName>> {
        let filled: HashSet<SlotName> = self
            .store
            .list_slot_values(run_id)?
            .into_iter()
            .map(|v| v.slot)
            .collect();
        Ok(state
            .required_slots
            .iter()
            .filter(|slot| !filled.contains(*slot))
            .cloned()
            .collect())
    }

    pub fn is_state_complete(
        &self,
        run_id: &RunId,
        state: &StateDefinition,
    ) -> CoordinationResult<bool> {
        Ok(self.missing_slots(run_id, state)?.is_empty())
    }

    /// Current values of the state's required slots
    pub fn snapshot(
        &self,
        run_id: &RunId,
        state: &StateDefinition,
    ) -> CoordinationResult<BTreeMap<SlotName, serde_json::Value>> {
        Ok(self
            .store
            .list_slot_values(run_id)?
            .into_iter()
            .filter(|v| state.requires_slot(&v.slot))
            .map(|v| (v.slot, v.value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use coordination_types::{ParticipantId, Role, RoleName, Slot, SlotType};
    use serde_json::json;

    fn setup() -> (SlotStore, Template, ResolvedParticipant) {
        let template = Template::new("Check-in")
            .with_role(Role::new("partner_a"))
            .with_slot(Slot::text("moodA").editable_by("partner_a"))
            .with_slot(Slot::text("moodB").editable_by("partner_a"))
            .with_slot(Slot::new("rating", SlotType::Number).editable_by("partner_a"))
            .with_state(
                StateDefinition::new("warmup", 0)
                    .requires("moodA")
                    .requires("moodB")
                    .allow("partner_a"),
            );
        let store = SlotStore::new(Arc::new(InMemoryStore::new()), SlotValidator::default());
        let writer = ResolvedParticipant {
            run_id: RunId::new("run-1"),
            participant_id: ParticipantId::new("p-1"),
            role: RoleName::new("partner_a"),
        };
        (store, template, writer)
    }

    #[test]
    fn test_completeness_tracks_required_slots() {
        let (store, template, writer) = setup();
        let warmup = &template.states[0];

        assert_eq!(
            store.missing_slots(&writer.run_id, warmup).unwrap(),
            vec![SlotName::new("moodA"), SlotName::new("moodB")]
        );

        store.write(&template, &writer, &SlotName::new("moodB"), json!("ok")).unwrap();
        assert!(!store.is_state_complete(&writer.run_id, warmup).unwrap());

        store.write(&template, &writer, &SlotName::new("moodA"), json!("fine")).unwrap();
        assert!(store.is_state_complete(&writer.run_id, warmup).unwrap());

        // unrelated writes keep the state complete
        store.write(&template, &writer, &SlotName::new("rating"), json!(4)).unwrap();
        assert!(store.is_state_complete(&writer.run_id, warmup).unwrap());
    }

    #[test]
    fn test_invalid_value_is_not_stored() {
        let (store, template, writer) = setup();
        let err = store
            .write(&template, &writer, &SlotName::new("rating"), json!("four"))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::SlotValidationFailed { .. }));
        assert!(store.values(&writer.run_id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_slot() {
        let (store, template, writer) = setup();
        assert!(matches!(
            store.write(&template, &writer, &SlotName::new("ghost"), json!("boo")),
            Err(CoordinationError::SlotValidationFailed { .. })
        ));
    }

    #[test]
    fn test_overwrite_and_snapshot() {
        let (store, template, writer) = setup();
        let moods = SlotName::new("moodA");
        store.write(&template, &writer, &moods, json!("calm")).unwrap();
        let second = store.write(&template, &writer, &moods, json!("happy")).unwrap();
        store.write(&template, &writer, &SlotName::new("rating"), json!(5)).unwrap();

        let current = store.get(&writer.run_id, &moods).unwrap().unwrap();
        assert_eq!(current, second);
        assert_eq!(current.writer, writer.participant_id);

        let snapshot = store.snapshot(&writer.run_id, &template.states[0]).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&moods], json!("happy"));
    }
}
