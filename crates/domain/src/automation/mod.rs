//! Automation rule — a house-scoped set of device bindings applied during a
//! daily time window.
//!
//! The scheduler activates a rule when the current time enters its
//! [`TimeWindow`] and restores the bound devices once it leaves it.
//! `is_running` records whether the rule's effects are currently applied.

mod window;

pub use window::TimeWindow;

use serde::{Deserialize, Serialize};

use crate::binding::{Binding, find_duplicate};
use crate::error::{DwellError, ValidationError};
use crate::id::{AutomationId, HouseId};
use crate::time::Timestamp;

/// A time-windowed rule over a set of device bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: AutomationId,
    pub house_id: HouseId,
    pub name: String,
    pub window: TimeWindow,
    /// User toggle.
    pub enabled: bool,
    /// Scheduler state: inside the window and applied. Implies `enabled`.
    pub is_running: bool,
    pub last_triggered: Option<Timestamp>,
    pub bindings: Vec<Binding>,
}

impl AutomationRule {
    /// Create a builder for constructing an [`AutomationRule`].
    #[must_use]
    pub fn builder() -> AutomationRuleBuilder {
        AutomationRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - a device is bound twice ([`ValidationError::DuplicateBinding`])
    pub fn validate(&self) -> Result<(), DwellError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if let Some(id) = find_duplicate(&self.bindings) {
            return Err(ValidationError::DuplicateBinding(id.to_string()).into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug, Default)]
pub struct AutomationRuleBuilder {
    id: Option<AutomationId>,
    house_id: Option<HouseId>,
    name: Option<String>,
    window: Option<TimeWindow>,
    enabled: Option<bool>,
    bindings: Vec<Binding>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn house_id(mut self, house_id: HouseId) -> Self {
        self.house_id = Some(house_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Consume the builder, validate, and return an idle [`AutomationRule`].
    ///
    /// New rules start disabled, like a freshly created rule in the UI, and
    /// default to the `00:00..00:01` window.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] if required fields are missing or invalid.
    pub fn build(self) -> Result<AutomationRule, DwellError> {
        let window = self.window.unwrap_or_else(|| {
            let midnight = chrono::NaiveTime::MIN;
            TimeWindow::new(midnight, midnight + chrono::Duration::minutes(1))
        });
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            house_id: self.house_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            window,
            enabled: self.enabled.unwrap_or(false),
            is_running: false,
            last_triggered: None,
            bindings: self.bindings,
        };
        rule.validate()?;
        Ok(rule)
    }
}
