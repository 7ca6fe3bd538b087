//! Transition resolver: computes the states a run may move to next
//!
//! Resolution is two-tier:
//!
//! 1. A state with explicit edges resolves each edge target against the
//!    template, silently dropping targets that do not exist, and keeps the
//!    declared edge order.
//! 2. A state without edges falls back to sequence order: the state that
//!    immediately follows it, or nothing if it is last.
//!
//! Resolution is deterministic and has no side effects.

use coordination_types::{
    CoordinationError, CoordinationResult, StateDefinition, StateName, Template,
    TransitionCondition, Transitions,
};
use std::collections::{HashSet, VecDeque};

/// A resolved candidate transition
#[derive(Clone, Debug)]
pub struct ResolvedTransition<'a> {
    pub state: &'a StateDefinition,
    /// Edge condition hint (`always` for sequence fallback)
    pub condition: TransitionCondition,
    pub label: &'a str,
}

/// Stateless resolver over a template's transition graph
#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionResolver;

impl TransitionResolver {
    /// Candidate transitions out of `current`, in resolution order.
    ///
    /// Explicit edges resolve in declared order. Dangling edges are dropped
    /// and a repeated target keeps only its first edge, so every candidate
    /// names a distinct state.
    pub fn next_transitions<'a>(
        template: &'a Template,
        current: &StateName,
    ) -> CoordinationResult<Vec<ResolvedTransition<'a>>> {
        let state = current_state(template, current)?;

        match &state.transitions {
            Transitions::Explicit { edges } if !edges.is_empty() => {
                let mut resolved: Vec<ResolvedTransition<'a>> = Vec::with_capacity(edges.len());
                for edge in edges {
                    match template.get_state(&edge.target) {
                        Some(target) if resolved.iter().any(|r| r.state.name == target.name) => {}
                        Some(target) => resolved.push(ResolvedTransition {
                            state: target,
                            condition: edge.condition,
                            label: edge.label.as_str(),
                        }),
                        None => tracing::debug!(
                            from = %state.name,
                            target = %edge.target,
                            "Dropping dangling transition"
                        ),
                    }
                }
                Ok(resolved)
            }
            _ => {
                let ordered = template.states_in_sequence();
                let next = ordered
                    .iter()
                    .position(|s| s.name == state.name)
                    .and_then(|i| ordered.get(i + 1))
                    .map(|next| ResolvedTransition {
                        state: *next,
                        condition: TransitionCondition::Always,
                        label: "",
                    });
                Ok(next.into_iter().collect())
            }
        }
    }

    /// Candidate next states out of `current`, in resolution order
    pub fn next_states<'a>(
        template: &'a Template,
        current: &StateName,
    ) -> CoordinationResult<Vec<&'a StateDefinition>> {
        Ok(Self::next_transitions(template, current)?
            .into_iter()
            .map(|t| t.state)
            .collect())
    }

    /// Every state reachable from `start`, including `start` itself
    pub fn reachable_from(
        template: &Template,
        start: &StateName,
    ) -> CoordinationResult<HashSet<StateName>> {
        current_state(template, start)?;

        let mut reachable = HashSet::new();
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(name) = queue.pop_front() {
            if !reachable.insert(name.clone()) {
                continue;
            }
            for next in Self::next_states(template, &name)? {
                if !reachable.contains(&next.name) {
                    queue.push_back(next.name.clone());
                }
            }
        }
        Ok(reachable)
    }
}

/// Look up the run's current state, treating a miss as corruption
fn current_state<'a>(
    template: &'a Template,
    name: &StateName,
) -> CoordinationResult<&'a StateDefinition> {
    template.get_state(name).ok_or_else(|| {
        CoordinationError::TemplateIntegrity(format!(
            "state '{}' does not exist in template {}",
            name, template.id
        ))
    })
}
