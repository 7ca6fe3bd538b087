//! Run context: what a participant sees when opening their magic link

use crate::{ResolvedTransition, SlotStore};
use chrono::{DateTime, Utc};
use coordination_types::{
    CoordinationResult, Initiator, Participant, ParticipantId, ResolvedParticipant, RoleName,
    Run, RunId, RunStatus, SlotName, SlotType, StateDefinition, StateName, StateType, Template,
    TemplateId, TransitionCondition,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The participant's resolved view of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunContext {
    pub participant: ParticipantView,
    pub run: RunSummary,
    pub current_state: CurrentStateView,
    pub next_states: Vec<NextStateView>,
    pub roster: Vec<RosterEntry>,
    /// Roles with fewer active participants than their minimum
    pub understaffed_roles: Vec<RoleName>,
    /// Slots the participant's role may read
    pub slots: Vec<VisibleSlot>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub role: RoleName,
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: RunId,
    pub template_id: TemplateId,
    pub template_name: String,
    pub template_version: String,
    pub status: RunStatus,
    pub initiator: Initiator,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrentStateView {
    pub name: StateName,
    #[serde(rename = "type")]
    pub state_type: StateType,
    pub description: String,
    pub required_slots: Vec<SlotName>,
    pub allowed_roles: Vec<RoleName>,
    pub is_complete: bool,
    pub missing_slots: Vec<SlotName>,
    /// Whether the viewing participant's role may advance from here
    pub can_advance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NextStateView {
    pub name: StateName,
    pub description: String,
    pub condition: TransitionCondition,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RosterEntry {
    pub participant_id: ParticipantId,
    pub role: RoleName,
    pub display_name: String,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisibleSlot {
    pub name: SlotName,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub description: String,
    pub required: bool,
    /// Whether the viewing participant's role may write this slot
    pub editable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_by: Option<RoleName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_at: Option<DateTime<Utc>>,
}

impl RunContext {
    /// Assemble the context. Authorization has already happened.
    pub(crate) fn build(
        viewer: &ResolvedParticipant,
        run: &Run,
        template: &Template,
        current: &StateDefinition,
        next: &[ResolvedTransition<'_>],
        participants: &[Participant],
        slots: &SlotStore,
    ) -> CoordinationResult<Self> {
        let me = participants
            .iter()
            .find(|p| p.id == viewer.participant_id);
        let capabilities = template
            .get_role(&viewer.role)
            .map(|r| r.capabilities.clone())
            .unwrap_or_default();

        let missing_slots = slots.missing_slots(&run.id, current)?;

        let mut active_per_role: HashMap<&RoleName, u32> = HashMap::new();
        for p in participants.iter().filter(|p| p.is_active()) {
            *active_per_role.entry(&p.role).or_default() += 1;
        }
        let understaffed_roles = template
            .roles
            .iter()
            .filter(|r| active_per_role.get(&r.name).copied().unwrap_or(0) < r.min_participants)
            .map(|r| r.name.clone())
            .collect();

        let values: HashMap<SlotName, _> = slots
            .values(&run.id)?
            .into_iter()
            .map(|v| (v.slot.clone(), v))
            .collect();
        let visible = template
            .slots
            .iter()
            .filter(|s| s.is_visible_to(&viewer.role))
            .map(|s| {
                let value = values.get(&s.name);
                VisibleSlot {
                    name: s.name.clone(),
                    slot_type: s.slot_type,
                    description: s.description.clone(),
                    required: s.required || template.states.iter().any(|st| st.requires_slot(&s.name)),
                    editable: s.is_editable_by(&viewer.role),
                    value: value.map(|v| v.value.clone()),
                    default_value: s.default_value.clone(),
                    written_by: value.map(|v| v.writer_role.clone()),
                    written_at: value.map(|v| v.written_at),
                }
            })
            .collect();

        Ok(Self {
            participant: ParticipantView {
                id: viewer.participant_id.clone(),
                role: viewer.role.clone(),
                display_name: me.map(|p| p.display_name()).unwrap_or_default(),
                capabilities,
            },
            run: RunSummary {
                id: run.id.clone(),
                template_id: template.id.clone(),
                template_name: template.name.clone(),
                template_version: template.version.clone(),
                status: run.status,
                initiator: run.initiator.clone(),
                created_at: run.created_at,
                completed_at: run.completed_at,
            },
            current_state: CurrentStateView {
                name: current.name.clone(),
                state_type: current.state_type,
                description: current.description.clone(),
                required_slots: current.required_slots.clone(),
                allowed_roles: current.allowed_roles.clone(),
                is_complete: missing_slots.is_empty(),
                missing_slots,
                can_advance: run.is_active() && current.allows_role(&viewer.role),
                timeout_minutes: current.timeout_minutes,
            },
            next_states: next
                .iter()
                .map(|t| NextStateView {
                    name: t.state.name.clone(),
                    description: t.state.description.clone(),
                    condition: t.condition,
                    label: t.label.to_string(),
                })
                .collect(),
            roster: participants
                .iter()
                .map(|p| RosterEntry {
                    participant_id: p.id.clone(),
                    role: p.role.clone(),
                    display_name: p.display_name(),
                    active: p.is_active(),
                })
                .collect(),
            understaffed_roles,
            slots: visible,
        })
    }
}
