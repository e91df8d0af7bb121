//! Transition application — turns engine results into one committed unit.
//!
//! A transition walks the bindings of a rule or mode, computes every device
//! write with [`engine::activate`] or [`engine::restore`], then hands the
//! updated rule or mode together with the writes to the repository's
//! `commit_transition`. Nothing is written before that call.

use dwell_domain::ambiance::AmbianceMode;
use dwell_domain::automation::AutomationRule;
use dwell_domain::binding::Binding;
use dwell_domain::device::{DeviceStatus, DeviceWrite};
use dwell_domain::engine::{self, Direction};
use dwell_domain::error::{DwellError, PartialApplicationError};
use dwell_domain::time;

use crate::ports::{AmbianceRepository, AutomationRepository, DeviceRepository};

/// How binding-level failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// The first failing binding rejects the whole transition.
    Strict,
    /// Failing bindings are skipped and reported; the others are applied.
    Lenient,
}

/// A committed transition, with the bindings that were skipped if any.
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub partial: Option<PartialApplicationError>,
}

impl<T> Applied<T> {
    fn new(value: T, failures: Vec<(String, DwellError)>, total: usize) -> Self {
        let partial = (!failures.is_empty()).then_some(PartialApplicationError { total, failures });
        Self { value, partial }
    }
}

struct Plan {
    bindings: Vec<Binding>,
    writes: Vec<DeviceWrite>,
    failures: Vec<(String, DwellError)>,
}

async fn plan<D: DeviceRepository>(
    devices: &D,
    bindings: &[Binding],
    direction: Direction,
    mode: ApplyMode,
) -> Result<Plan, DwellError> {
    let mut plan = Plan {
        bindings: Vec::with_capacity(bindings.len()),
        writes: Vec::with_capacity(bindings.len()),
        failures: Vec::new(),
    };

    for binding in bindings {
        let step = match devices.get_by_id(binding.device_id).await? {
            None => Err(DwellError::from(binding.device_id.not_found())),
            Some(device) => match direction {
                Direction::Activate => engine::activate(binding, &device)
                    .map(|(updated, write)| (updated, Some(write)))
                    .map_err(DwellError::from),
                Direction::Deactivate => Ok(engine::restore(binding)),
            },
        };

        match step {
            Ok((updated, write)) => {
                plan.bindings.push(updated);
                plan.writes.extend(write);
            }
            Err(err) if mode == ApplyMode::Strict => return Err(err),
            Err(err) => {
                tracing::warn!(device_id = %binding.device_id, %direction, error = %err, "skipping binding");
                // A skipped binding keeps no snapshot: there is nothing to restore.
                plan.bindings.push(Binding {
                    snapshot: None,
                    ..binding.clone()
                });
                plan.failures.push((binding.device_id.to_string(), err));
            }
        }
    }

    Ok(plan)
}

/// Move `rule` in `direction` and commit the result.
///
/// `rule.enabled` is persisted as given, so a caller flipping the user
/// toggle sets it before calling.
///
/// # Errors
///
/// In [`ApplyMode::Strict`], the first missing device or invalid target.
/// In both modes, [`DwellError::Conflict`] when the rule's running flag
/// changed since it was read, and storage errors from the commit.
#[tracing::instrument(skip(devices, rules, rule), fields(rule_id = %rule.id, rule_name = %rule.name))]
pub async fn apply_rule<D, A>(
    devices: &D,
    rules: &A,
    mut rule: AutomationRule,
    direction: Direction,
    mode: ApplyMode,
) -> Result<Applied<AutomationRule>, DwellError>
where
    D: DeviceRepository,
    A: AutomationRepository,
{
    let total = rule.bindings.len();
    let plan = plan(devices, &rule.bindings, direction, mode).await?;
    let was_running = rule.is_running;

    rule.bindings = plan.bindings;
    match direction {
        Direction::Activate => {
            rule.is_running = true;
            rule.last_triggered = Some(time::now());
        }
        Direction::Deactivate => rule.is_running = false,
    }

    let rule = rules.commit_transition(rule, was_running, plan.writes).await?;
    tracing::info!(is_running = rule.is_running, "automation transition committed");
    Ok(Applied::new(rule, plan.failures, total))
}

/// Persist `rule` as-is without touching any device.
///
/// Used when the user toggle changes but the running state does not.
///
/// # Errors
///
/// Same as [`apply_rule`].
pub async fn commit_rule<A: AutomationRepository>(
    rules: &A,
    rule: AutomationRule,
) -> Result<AutomationRule, DwellError> {
    let was_running = rule.is_running;
    rules.commit_transition(rule, was_running, Vec::new()).await
}

/// Switch `mode` on or off and commit the result.
///
/// # Errors
///
/// Same as [`apply_rule`], with the mode status as the compared flag.
#[tracing::instrument(skip(devices, modes, mode), fields(mode_id = %mode.id, mode_name = %mode.name))]
pub async fn apply_mode<D, M>(
    devices: &D,
    modes: &M,
    mut mode: AmbianceMode,
    direction: Direction,
    apply: ApplyMode,
) -> Result<Applied<AmbianceMode>, DwellError>
where
    D: DeviceRepository,
    M: AmbianceRepository,
{
    let total = mode.bindings.len();
    let plan = plan(devices, &mode.bindings, direction, apply).await?;
    let previous = mode.status;

    mode.bindings = plan.bindings;
    mode.status = match direction {
        Direction::Activate => DeviceStatus::On,
        Direction::Deactivate => DeviceStatus::Off,
    };

    let mode = modes.commit_transition(mode, previous, plan.writes).await?;
    tracing::info!(status = %mode.status, "ambiance transition committed");
    Ok(Applied::new(mode, plan.failures, total))
}
