//! Automation service — use-cases for managing and toggling automation rules.

use dwell_domain::automation::{AutomationRule, TimeWindow};
use dwell_domain::binding::Binding;
use dwell_domain::engine::Direction;
use dwell_domain::error::{DwellError, ValidationError};
use dwell_domain::id::{AutomationId, HouseId};
use dwell_domain::time::{self, TimeOfDay};

use super::{check_bindings, without_snapshots};
use crate::ports::{AutomationRepository, DeviceRepository};
use crate::transition::{self, ApplyMode};

/// Changes to an existing rule. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct AutomationUpdate {
    pub name: Option<String>,
    pub window: Option<TimeWindow>,
    pub bindings: Option<Vec<Binding>>,
}

/// Flags of a rule after a user toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub enabled: bool,
    pub is_running: bool,
}

/// Application service for automation CRUD and the enable/disable toggle.
pub struct AutomationService<D, A> {
    devices: D,
    rules: A,
}

impl<D, A> AutomationService<D, A>
where
    D: DeviceRepository,
    A: AutomationRepository,
{
    /// Create a new service backed by the given repositories.
    pub fn new(devices: D, rules: A) -> Self {
        Self { devices, rules }
    }

    /// Create a new rule after validating it and its bindings.
    ///
    /// The rule is stored idle, whatever flags it carries; the scheduler
    /// picks it up on its next tick if it is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] if invariants fail,
    /// [`DwellError::NotFound`] or [`DwellError::InvalidState`] for a bad
    /// binding, or a storage error propagated from the repository.
    #[tracing::instrument(skip(self, rule), fields(rule_name = %rule.name))]
    pub async fn create_automation(
        &self,
        mut rule: AutomationRule,
    ) -> Result<AutomationRule, DwellError> {
        rule.validate()?;
        check_bindings(&self.devices, &rule.bindings).await?;
        if rule.window.wraps_midnight() {
            tracing::warn!(window = %rule.window, "window crosses midnight and will never activate");
        }

        rule.is_running = false;
        rule.last_triggered = None;
        rule.bindings = without_snapshots(rule.bindings);
        self.rules.create(rule).await
    }

    /// Look up a rule by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when no rule with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_automation(&self, id: AutomationId) -> Result<AutomationRule, DwellError> {
        self.rules
            .get_by_id(id)
            .await?
            .ok_or_else(|| id.not_found().into())
    }

    /// List all rules.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_automations(&self) -> Result<Vec<AutomationRule>, DwellError> {
        self.rules.get_all().await
    }

    /// List the rules of one house.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_for_house(&self, house_id: HouseId) -> Result<Vec<AutomationRule>, DwellError> {
        self.rules.find_by_house(house_id).await
    }

    /// Rename, re-window or replace the bindings of a rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BindingsLocked`] when bindings are replaced
    /// while the rule is running, [`DwellError::Conflict`] when the rule
    /// started running before the new bindings were written, plus the errors
    /// of [`create_automation`](Self::create_automation).
    #[tracing::instrument(skip(self, update))]
    pub async fn update_automation(
        &self,
        id: AutomationId,
        update: AutomationUpdate,
    ) -> Result<AutomationRule, DwellError> {
        let mut rule = self.get_automation(id).await?;

        if let Some(name) = update.name {
            rule.name = name;
        }
        if let Some(window) = update.window {
            if window.wraps_midnight() {
                tracing::warn!(%window, "window crosses midnight and will never activate");
            }
            rule.window = window;
        }
        if let Some(bindings) = update.bindings {
            if rule.is_running {
                return Err(ValidationError::BindingsLocked.into());
            }
            check_bindings(&self.devices, &bindings).await?;
            rule.bindings = without_snapshots(bindings);
        }

        rule.validate()?;
        self.rules.update(rule).await
    }

    /// Delete a rule, restoring its devices first if it is running.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when no rule with `id` exists, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_automation(&self, id: AutomationId) -> Result<(), DwellError> {
        let rule = self.get_automation(id).await?;
        if rule.is_running {
            let applied = transition::apply_rule(
                &self.devices,
                &self.rules,
                rule,
                Direction::Deactivate,
                ApplyMode::Lenient,
            )
            .await?;
            if let Some(partial) = applied.partial {
                tracing::warn!(error = %partial, "some devices could not be restored");
            }
        }
        self.rules.delete(id).await
    }

    /// Flip the user toggle of a rule at the current local time.
    ///
    /// # Errors
    ///
    /// See [`toggle_automation_at`](Self::toggle_automation_at).
    pub async fn toggle_automation(&self, id: AutomationId) -> Result<ToggleOutcome, DwellError> {
        self.toggle_automation_at(id, time::local_time_of_day()).await
    }

    /// Flip the user toggle of a rule as if the time were `now`.
    ///
    /// Enabling activates the rule right away only when its window contains
    /// `now`; outside the window it just arms the rule and the scheduler
    /// activates it on the first tick inside the window. This deliberately
    /// departs from applying the targets on every enable, which would leave
    /// a rule running outside its window. Disabling restores a running rule.
    /// The flags and the device writes are committed together.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when the rule or a bound device is
    /// missing, [`DwellError::InvalidState`] when a target no longer fits its
    /// device, [`DwellError::Conflict`] when the scheduler moved the rule
    /// concurrently, or a storage error. Nothing is written on error.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_automation_at(
        &self,
        id: AutomationId,
        now: TimeOfDay,
    ) -> Result<ToggleOutcome, DwellError> {
        let mut rule = self.get_automation(id).await?;
        rule.enabled = !rule.enabled;

        let direction = match (rule.enabled, rule.is_running) {
            (true, false) if rule.window.contains(now) => Some(Direction::Activate),
            (false, true) => Some(Direction::Deactivate),
            _ => None,
        };

        let rule = match direction {
            Some(direction) => {
                transition::apply_rule(&self.devices, &self.rules, rule, direction, ApplyMode::Strict)
                    .await?
                    .value
            }
            None => transition::commit_rule(&self.rules, rule).await?,
        };

        tracing::info!(enabled = rule.enabled, is_running = rule.is_running, "automation toggled");
        Ok(ToggleOutcome {
            enabled: rule.enabled,
            is_running: rule.is_running,
        })
    }
}
