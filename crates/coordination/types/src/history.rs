//! Append-only run history

use crate::{ParticipantId, RunId, SlotName, StateName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a history entry was written
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Run created and positioned at its first state
    Created,
    /// Run advanced into a state
    Entered,
    /// Run left its last state and completed
    Completed,
    /// Run was abandoned
    Abandoned,
}

/// An immutable record of a run entering a state or terminating.
///
/// Entries are attributed to the participant that caused them, never to a
/// token, so rotating or revoking tokens leaves history intact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunStateEntry {
    /// Position in the run's history (0 = creation)
    pub sequence: u64,
    pub run_id: RunId,
    pub state: StateName,
    pub kind: EntryKind,
    pub entered_at: DateTime<Utc>,
    /// Values of the state's required slots recorded at entry time
    #[serde(default)]
    pub slot_snapshot: BTreeMap<SlotName, serde_json::Value>,
    /// Participant that triggered the entry (`None` for operator actions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entered_by: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RunStateEntry {
    pub fn new(sequence: u64, run_id: RunId, state: StateName, kind: EntryKind) -> Self {
        Self {
            sequence,
            run_id,
            state,
            kind,
            entered_at: Utc::now(),
            slot_snapshot: BTreeMap::new(),
            entered_by: None,
            note: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: BTreeMap<SlotName, serde_json::Value>) -> Self {
        self.slot_snapshot = snapshot;
        self
    }

    pub fn by(mut self, participant: ParticipantId) -> Self {
        self.entered_by = Some(participant);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EntryKind::Completed | EntryKind::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_builder() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(SlotName::new("moodA"), json!("calm"));

        let entry = RunStateEntry::new(1, RunId::new("run-1"), StateName::new("share"), EntryKind::Entered)
            .with_snapshot(snapshot)
            .by(ParticipantId::new("p-1"));

        assert_eq!(entry.slot_snapshot.len(), 1);
        assert_eq!(entry.entered_by, Some(ParticipantId::new("p-1")));
        assert!(!entry.is_terminal());
    }

    #[test]
    fn test_terminal_kinds() {
        let done = RunStateEntry::new(3, RunId::new("r"), StateName::new("s"), EntryKind::Completed);
        let gone = RunStateEntry::new(1, RunId::new("r"), StateName::new("s"), EntryKind::Abandoned)
            .with_note("timeout");
        assert!(done.is_terminal());
        assert!(gone.is_terminal());

        let json = serde_json::to_value(&gone).unwrap();
        assert_eq!(json["kind"], "abandoned");
        assert_eq!(json["note"], "timeout");
    }
}
