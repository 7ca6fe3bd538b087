//! Template registry: stores and retrieves blueprint templates
//!
//! Templates are immutable once registered. To change a protocol, register
//! a new version under the same name. The registry tracks all versions.

use crate::SlotValidator;
use coordination_types::{CoordinationError, CoordinationResult, Template, TemplateId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of template versions
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    /// All registered templates, keyed by ID
    templates: DashMap<TemplateId, Arc<Template>>,
    /// Index by name → template IDs in registration order
    by_name: DashMap<String, Vec<TemplateId>>,
    /// Checks slot defaults at registration
    validator: SlotValidator,
}

impl TemplateRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose default-value checks use `validator`
    pub fn with_validator(validator: SlotValidator) -> Self {
        Self {
            templates: DashMap::new(),
            by_name: DashMap::new(),
            validator,
        }
    }

    /// Register a template
    ///
    /// Validates the template before storing. Dangling transition targets
    /// are allowed but logged. Returns the template ID.
    pub fn register(&self, template: Template) -> CoordinationResult<TemplateId> {
        template.validate()?;

        for slot in &template.slots {
            if let Some(default) = &slot.default_value {
                self.validator.check(slot, default).map_err(|e| {
                    CoordinationError::InvalidTemplate(format!("default value rejected: {}", e))
                })?;
            }
        }

        for (from, target) in template.dangling_transitions() {
            tracing::warn!(
                template = %template.id,
                from = %from,
                target = %target,
                "Transition target does not exist and will be ignored"
            );
        }

        let id = template.id.clone();
        let name = template.name.clone();

        match self.templates.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(CoordinationError::TemplateAlreadyRegistered(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(template));
            }
        }
        self.by_name.entry(name).or_default().push(id.clone());

        tracing::info!(template = %id, "Template registered");
        Ok(id)
    }

    /// Get a template by ID
    pub fn get(&self, id: &TemplateId) -> CoordinationResult<Arc<Template>> {
        self.templates
            .get(id)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| CoordinationError::TemplateNotFound(id.clone()))
    }

    /// Get the most recently registered version of a template by name
    pub fn latest_by_name(&self, name: &str) -> Option<Arc<Template>> {
        let latest = self.by_name.get(name).and_then(|ids| ids.last().cloned())?;
        self.templates.get(&latest).map(|t| Arc::clone(t.value()))
    }

    /// Get all versions of a template by name, oldest first
    pub fn versions_by_name(&self, name: &str) -> Vec<Arc<Template>> {
        let ids = self
            .by_name
            .get(name)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.templates.get(id).map(|t| Arc::clone(t.value())))
            .collect()
    }

    /// List all registered templates
    pub fn list(&self) -> Vec<Arc<Template>> {
        self.templates.iter().map(|t| Arc::clone(t.value())).collect()
    }

    /// Total number of registered templates
    pub fn count(&self) -> usize {
        self.templates.len()
    }

    /// Check if a template exists
    pub fn contains(&self, id: &TemplateId) -> bool {
        self.templates.contains_key(id)
    }
}
