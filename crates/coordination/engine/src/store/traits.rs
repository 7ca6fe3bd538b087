//! Storage trait definitions
//!
//! The traits are synchronous: every engine operation is a bounded unit of
//! work with no suspension point. Mutual exclusion per run is the
//! coordinator's job; implementations only need to be individually atomic.

use coordination_types::{
    CoordinationResult, Participant, ParticipantId, Run, RunId, RunStateEntry, SlotName,
    SlotValue,
};

/// Combined storage trait
pub trait CoordinationStore:
    RunStorage + ParticipantStorage + SlotStorage + HistoryStorage + Send + Sync
{
}

impl<T> CoordinationStore for T where
    T: RunStorage + ParticipantStorage + SlotStorage + HistoryStorage + Send + Sync
{
}

/// Storage for runs
pub trait RunStorage: Send + Sync {
    /// Insert a new run
    fn insert_run(&self, run: Run) -> CoordinationResult<()>;

    /// Get a run by ID
    fn get_run(&self, id: &RunId) -> CoordinationResult<Option<Run>>;

    /// Replace an existing run
    fn update_run(&self, run: Run) -> CoordinationResult<()>;

    /// List all runs
    fn list_runs(&self) -> CoordinationResult<Vec<Run>>;
}

/// Storage for participants
pub trait ParticipantStorage: Send + Sync {
    fn insert_participant(&self, participant: Participant) -> CoordinationResult<()>;

    fn get_participant(&self, id: &ParticipantId) -> CoordinationResult<Option<Participant>>;

    fn update_participant(&self, participant: Participant) -> CoordinationResult<()>;

    /// Participants of a run, in invite order
    fn list_participants(&self, run_id: &RunId) -> CoordinationResult<Vec<Participant>>;
}

/// Storage for slot values
pub trait SlotStorage: Send + Sync {
    /// Upsert a slot value.
    ///
    /// The store stamps the next run-wide revision onto the value and
    /// returns what was stored. The previous value for the same slot is
    /// replaced; other slots are untouched.
    fn upsert_slot_value(&self, value: SlotValue) -> CoordinationResult<SlotValue>;

    fn get_slot_value(
        &self,
        run_id: &RunId,
        slot: &SlotName,
    ) -> CoordinationResult<Option<SlotValue>>;

    /// All current values of a run, ordered by slot name
    fn list_slot_values(&self, run_id: &RunId) -> CoordinationResult<Vec<SlotValue>>;
}

/// Append-only run history
pub trait HistoryStorage: Send + Sync {
    /// Append an entry, stamping its position in the run's history
    fn append_history(&self, entry: RunStateEntry) -> CoordinationResult<RunStateEntry>;

    /// Entries of a run, oldest first
    fn list_history(&self, run_id: &RunId) -> CoordinationResult<Vec<RunStateEntry>>;
}
