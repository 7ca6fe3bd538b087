//! Coordination Run Engine
//!
//! The engine governs how a coordination run moves between the states of
//! its blueprint template, who may act in each state, and how slot data
//! accumulates until a state is complete.
//!
//! # Architecture
//!
//! The [`Coordinator`] composes specialized components:
//!
//! - [`TemplateRegistry`]: validated, immutable template versions
//! - [`TokenAuthority`]: issues and resolves per-participant magic tokens
//! - [`AccessGuard`]: pure allow/deny decisions for run actions
//! - [`SlotStore`]: validated slot writes and completeness checks
//! - [`TransitionResolver`]: deterministic next-state computation
//! - [`RunMachine`]: state entry, completion and history
//!
//! Persistence goes through the [`CoordinationStore`] trait; an
//! [`InMemoryStore`] is provided for development and tests.
//!
//! # Example
//!
//! ```rust
//! use coordination_engine::{AdvanceOutcome, AdvanceRequest, Coordinator};
//! use coordination_types::*;
//! use serde_json::json;
//!
//! let coordinator = Coordinator::in_memory();
//!
//! let template = Template::new("Check-in")
//!     .with_role(Role::new("member"))
//!     .with_slot(Slot::text("mood").editable_by("member"))
//!     .with_state(StateDefinition::new("warmup", 0).requires("mood").allow("member"));
//! let template_id = coordinator.register_template(template).unwrap();
//!
//! let run = coordinator.create_run(&template_id, Initiator::new("host")).unwrap();
//! let invite = coordinator
//!     .invite(&run.id, &RoleName::new("member"), ParticipantIdentity::named("Ada"))
//!     .unwrap();
//!
//! coordinator
//!     .write_slot(&run.id, invite.token.as_str(), &SlotName::new("mood"), json!("calm"))
//!     .unwrap();
//! let outcome = coordinator
//!     .advance(&run.id, invite.token.as_str(), AdvanceRequest::default())
//!     .unwrap();
//!
//! assert!(matches!(outcome, AdvanceOutcome::Completed { .. }));
//! ```

#![deny(unsafe_code)]

pub mod access_guard;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod run_machine;
pub mod slot_store;
pub mod slot_validation;
pub mod store;
pub mod template_registry;
pub mod token_authority;
pub mod transition_resolver;

// Re-export main types
pub use access_guard::{AccessGuard, Action};
pub use config::EngineConfig;
pub use context::RunContext;
pub use coordinator::{Coordinator, Invitation};
pub use run_machine::{AdvanceOutcome, AdvanceRequest, RunMachine};
pub use slot_store::SlotStore;
pub use slot_validation::SlotValidator;
pub use store::{CoordinationStore, InMemoryStore};
pub use template_registry::TemplateRegistry;
pub use token_authority::TokenAuthority;
pub use transition_resolver::{ResolvedTransition, TransitionResolver};
