//! Automation repository port — persistence for automation rules.

use std::future::Future;
use std::sync::Arc;

use dwell_domain::automation::AutomationRule;
use dwell_domain::device::DeviceWrite;
use dwell_domain::error::DwellError;
use dwell_domain::id::{AutomationId, HouseId};

/// Repository for persisting and querying [`AutomationRule`]s.
pub trait AutomationRepository {
    /// Create a new rule and its bindings.
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send;

    /// Get a rule by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, DwellError>> + Send;

    /// Get all rules.
    fn get_all(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send;

    /// Get the rules the scheduler must evaluate: enabled, or disabled but
    /// still running.
    fn get_schedulable(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send;

    /// Get all rules of a house.
    fn find_by_house(
        &self,
        house_id: HouseId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send;

    /// Update name, window and bindings of an existing rule.
    ///
    /// Scheduler-owned fields (`enabled`, `is_running`, `last_triggered`
    /// and snapshots) are only written by
    /// [`commit_transition`](Self::commit_transition): stored snapshots are
    /// kept whenever the binding targets are unchanged. Changing the targets
    /// of a rule that is running at write time returns
    /// [`DwellError::Conflict`] and writes nothing.
    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send;

    /// Delete a rule, cascading to its bindings.
    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), DwellError>> + Send;

    /// Apply `writes` to the device store and persist the rule's flags and
    /// binding snapshots in one transaction.
    ///
    /// The commit only happens while the stored `is_running` still equals
    /// `was_running`; otherwise nothing is written and
    /// [`DwellError::Conflict`] is returned.
    fn commit_transition(
        &self,
        rule: AutomationRule,
        was_running: bool,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send;
}

impl<T: AutomationRepository + Send + Sync> AutomationRepository for Arc<T> {
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        (**self).create(rule)
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, DwellError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        (**self).get_all()
    }

    fn get_schedulable(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        (**self).get_schedulable()
    }

    fn find_by_house(
        &self,
        house_id: HouseId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        (**self).find_by_house(house_id)
    }

    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        (**self).update(rule)
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), DwellError>> + Send {
        (**self).delete(id)
    }

    fn commit_transition(
        &self,
        rule: AutomationRule,
        was_running: bool,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        (**self).commit_transition(rule, was_running, writes)
    }
}
