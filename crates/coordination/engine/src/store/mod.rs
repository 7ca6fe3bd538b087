//! Storage layer for the coordination engine
//!
//! Runs, participants, slot values and history go through the
//! [`CoordinationStore`] trait so that callers pass an explicit store
//! instead of sharing a global handle.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{
    CoordinationStore, HistoryStorage, ParticipantStorage, RunStorage, SlotStorage,
};
