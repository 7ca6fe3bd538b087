//! Data slots: structured values collected during a run

use crate::{ParticipantId, RoleName, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of a slot, unique within a template
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotName(pub String);

impl SlotName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SlotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared value type of a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Text,
    Number,
    Date,
    File,
    Location,
    Currency,
    Boolean,
    Select,
    Multiselect,
    Email,
    Phone,
    Url,
    Json,
}

impl SlotType {
    /// Whether values of this type are plain strings
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Email | Self::Phone | Self::Url | Self::Date | Self::Select
        )
    }
}

/// Optional constraints applied on top of the type check
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression a string value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed members for select / multiselect
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Accept select values outside `options`
    #[serde(default)]
    pub allow_other: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
    /// Inclusive lower bound, `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
    /// Required host suffix for email and url values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// A slot definition within a template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Slot {
    pub name: SlotName,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<SlotValidation>,
    /// Roles allowed to read this slot
    #[serde(default)]
    pub visibility: Vec<RoleName>,
    /// Roles allowed to write this slot
    #[serde(default)]
    pub editable_by: Vec<RoleName>,
}

impl Slot {
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: SlotName::new(name),
            slot_type,
            description: String::new(),
            required: false,
            default_value: None,
            validation: None,
            visibility: Vec::new(),
            editable_by: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, SlotType::Text)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, SlotType::Number)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_validation(mut self, validation: SlotValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn visible_to(mut self, role: impl Into<String>) -> Self {
        let role = RoleName::new(role);
        if !self.visibility.contains(&role) {
            self.visibility.push(role);
        }
        self
    }

    /// Grant write access; writers can always read their own slots
    pub fn editable_by(mut self, role: impl Into<String>) -> Self {
        let role = RoleName::new(role);
        if !self.editable_by.contains(&role) {
            self.editable_by.push(role);
        }
        self
    }

    pub fn is_editable_by(&self, role: &RoleName) -> bool {
        self.editable_by.contains(role)
    }

    pub fn is_visible_to(&self, role: &RoleName) -> bool {
        self.visibility.contains(role) || self.editable_by.contains(role)
    }
}

/// A committed slot value for a run.
///
/// Unique per (run, slot). A later write replaces the prior value; the
/// `revision` is the run-wide commit order and breaks timestamp ties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotValue {
    pub run_id: RunId,
    pub slot: SlotName,
    pub value: serde_json::Value,
    pub writer_role: RoleName,
    pub writer: ParticipantId,
    pub written_at: DateTime<Utc>,
    pub revision: u64,
}
