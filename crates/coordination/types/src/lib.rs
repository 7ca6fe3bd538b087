//! Coordination Domain Types
//!
//! A coordination run is a live, multi-party structured conversation that
//! follows a reusable **blueprint template**. Participants join with a
//! per-run magic token and progress the run by filling data slots and
//! advancing through the template's states.
//!
//! # Key Concepts
//!
//! - **Template**: the static blueprint of roles, ordered states, data slots
//!   and transition rules. Immutable once registered; edits are new versions.
//! - **Run**: a live instantiation of a template with a current state pointer
//!   and an `active → completed | abandoned` status.
//! - **Participant**: a run-scoped identity bound to exactly one role and
//!   authenticated by an opaque magic token.
//! - **SlotValue**: a piece of structured data collected during a run.
//! - **RunStateEntry**: an append-only history record written whenever the
//!   run enters a state or terminates.
//!
//! This is a pure types crate. All types implement `Clone`, `Debug`,
//! `Serialize` and `Deserialize`; identifiers use the newtype pattern.

#![deny(unsafe_code)]

mod errors;
mod history;
mod participant;
mod role;
mod run;
mod slot;
mod state;
mod template;

pub use errors::*;
pub use history::*;
pub use participant::*;
pub use role::*;
pub use run::*;
pub use slot::*;
pub use state::*;
pub use template::*;
