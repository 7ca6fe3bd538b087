//! In-memory storage implementation
//!
//! Suitable for development and tests. Nothing survives a restart.

use super::traits::*;
use coordination_types::{
    CoordinationError, CoordinationResult, Participant, ParticipantId, Run, RunId, RunStateEntry,
    SlotName, SlotValue,
};
use dashmap::DashMap;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct RunSlots {
    values: BTreeMap<SlotName, SlotValue>,
    revision: u64,
}

/// In-memory coordination store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    runs: DashMap<RunId, Run>,
    participants: DashMap<ParticipantId, Participant>,
    by_run: DashMap<RunId, Vec<ParticipantId>>,
    slots: DashMap<RunId, RunSlots>,
    history: DashMap<RunId, Vec<RunStateEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStorage for InMemoryStore {
    fn insert_run(&self, run: Run) -> CoordinationResult<()> {
        if self.runs.contains_key(&run.id) {
            return Err(CoordinationError::Storage(format!(
                "run {} already exists",
                run.id
            )));
        }
        self.runs.insert(run.id.clone(), run);
        Ok(())
    }

    fn get_run(&self, id: &RunId) -> CoordinationResult<Option<Run>> {
        Ok(self.runs.get(id).map(|r| r.clone()))
    }

    fn update_run(&self, run: Run) -> CoordinationResult<()> {
        match self.runs.get_mut(&run.id) {
            Some(mut existing) => {
                *existing = run;
                Ok(())
            }
            None => Err(CoordinationError::RunNotFound(run.id)),
        }
    }

    fn list_runs(&self) -> CoordinationResult<Vec<Run>> {
        let mut runs: Vec<Run> = self.runs.iter().map(|r| r.value().clone()).collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }
}

impl ParticipantStorage for InMemoryStore {
    fn insert_participant(&self, participant: Participant) -> CoordinationResult<()> {
        if self.participants.contains_key(&participant.id) {
            return Err(CoordinationError::Storage(format!(
                "participant {} already exists",
                participant.id
            )));
        }
        self.by_run
            .entry(participant.run_id.clone())
            .or_default()
            .push(participant.id.clone());
        self.participants.insert(participant.id.clone(), participant);
        Ok(())
    }

    fn get_participant(&self, id: &ParticipantId) -> CoordinationResult<Option<Participant>> {
        Ok(self.participants.get(id).map(|p| p.clone()))
    }

    fn update_participant(&self, participant: Participant) -> CoordinationResult<()> {
        match self.participants.get_mut(&participant.id) {
            Some(mut existing) => {
                *existing = participant;
                Ok(())
            }
            None => Err(CoordinationError::ParticipantNotFound(participant.id)),
        }
    }

    fn list_participants(&self, run_id: &RunId) -> CoordinationResult<Vec<Participant>> {
        let ids = self
            .by_run
            .get(run_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.participants.get(id).map(|p| p.clone()))
            .collect())
    }
}

impl SlotStorage for InMemoryStore {
    fn upsert_slot_value(&self, mut value: SlotValue) -> CoordinationResult<SlotValue> {
        let mut run_slots = self.slots.entry(value.run_id.clone()).or_default();
        run_slots.revision += 1;
        value.revision = run_slots.revision;
        run_slots.values.insert(value.slot.clone(), value.clone());
        Ok(value)
    }

    fn get_slot_value(
        &self,
        run_id: &RunId,
        slot: &SlotName,
    ) -> CoordinationResult<Option<SlotValue>> {
        Ok(self
            .slots
            .get(run_id)
            .and_then(|s| s.values.get(slot).cloned()))
    }

    fn list_slot_values(&self, run_id: &RunId) -> CoordinationResult<Vec<SlotValue>> {
        Ok(self
            .slots
            .get(run_id)
            .map(|s| s.values.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl HistoryStorage for InMemoryStore {
    fn append_history(&self, mut entry: RunStateEntry) -> CoordinationResult<RunStateEntry> {
        let mut entries = self.history.entry(entry.run_id.clone()).or_default();
        entry.sequence = entries.len() as u64;
        entries.push(entry.clone());
        Ok(entry)
    }

    fn list_history(&self, run_id: &RunId) -> CoordinationResult<Vec<RunStateEntry>> {
        Ok(self
            .history
            .get(run_id)
            .map(|h| h.clone())
            .unwrap_or_default())
    }
}
