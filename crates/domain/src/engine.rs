//! Rule engine — pure decisions and per-binding transition computations.
//!
//! Nothing here touches storage. Callers fetch the devices, feed them
//! through [`activate`] or [`restore`], and commit the resulting bindings and
//! [`DeviceWrite`]s in one unit.

use crate::automation::AutomationRule;
use crate::binding::{Binding, Snapshot};
use crate::device::{Device, DeviceWrite};
use crate::error::InvalidStateError;
use crate::time::TimeOfDay;

/// Which way a rule or mode moves between `Idle` and `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `Idle → Active`: snapshot, then apply targets.
    Activate,
    /// `Active → Idle`: write snapshots back.
    Deactivate,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Activate => f.write_str("activate"),
            Self::Deactivate => f.write_str("deactivate"),
        }
    }
}

/// Outcome of evaluating a rule against the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Activate,
    Deactivate,
    NoOp,
}

impl Decision {
    #[must_use]
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Activate => Some(Direction::Activate),
            Self::Deactivate => Some(Direction::Deactivate),
            Self::NoOp => None,
        }
    }
}

/// Decide what the scheduler should do with `rule` at `now`.
///
/// A rule is due while it is enabled and its window contains `now`.
/// Activation happens on the idle→due edge, deactivation on the
/// running→not-due edge, so repeated calls without a change in between
/// return [`Decision::NoOp`].
#[must_use]
pub fn decide(now: TimeOfDay, rule: &AutomationRule) -> Decision {
    let due = rule.enabled && rule.window.contains(now);
    match (due, rule.is_running) {
        (true, false) => Decision::Activate,
        (false, true) => Decision::Deactivate,
        _ => Decision::NoOp,
    }
}

/// Snapshot `device` into `binding` and compute the write applying its target.
///
/// The target state is written verbatim: range clamping belongs to the
/// component that adjusts levels on behalf of users.
///
/// # Errors
///
/// Returns [`InvalidStateError`] when the device is a monitor or the target
/// does not fit the device kind.
pub fn activate(binding: &Binding, device: &Device) -> Result<(Binding, DeviceWrite), InvalidStateError> {
    if !device.kind.is_controllable() {
        return Err(InvalidStateError::ReadOnly {
            kind: device.kind.tag(),
        });
    }
    if let Some(target) = &binding.target_state {
        device.kind.check_target(target)?;
    }

    let snapshot = Snapshot {
        status: device.status,
        state: device.state(),
    };
    let write = DeviceWrite {
        device_id: binding.device_id,
        status: binding.target_status,
        state: binding.target_state.clone(),
    };
    let updated = Binding {
        snapshot: Some(snapshot),
        ..binding.clone()
    };
    Ok((updated, write))
}

/// Clear the snapshot of `binding` and compute the write restoring it.
///
/// A binding without a snapshot yields no write.
#[must_use]
pub fn restore(binding: &Binding) -> (Binding, Option<DeviceWrite>) {
    let write = binding.snapshot.as_ref().map(|snapshot| DeviceWrite {
        device_id: binding.device_id,
        status: snapshot.status,
        state: Some(snapshot.state.clone()),
    });
    let updated = Binding {
        snapshot: None,
        ..binding.clone()
    };
    (updated, write)
}
