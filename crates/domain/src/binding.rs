//! Binding — the link between a rule or mode and one controlled device.

use serde::{Deserialize, Serialize};

use crate::device::{DeviceStatus, StateValue};
use crate::id::DeviceId;

/// Device status and state captured when a rule or mode activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: DeviceStatus,
    pub state: StateValue,
}

/// Target and snapshot for one device controlled by a rule or mode.
///
/// `snapshot` is only `Some` while the owner is active. It is filled on
/// activation and cleared on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub device_id: DeviceId,
    /// `None` means status-only control.
    pub target_state: Option<StateValue>,
    pub target_status: DeviceStatus,
    pub snapshot: Option<Snapshot>,
}

impl Binding {
    /// A binding that drives both status and state.
    #[must_use]
    pub fn new(device_id: DeviceId, target_state: StateValue, target_status: DeviceStatus) -> Self {
        Self {
            device_id,
            target_state: Some(target_state),
            target_status,
            snapshot: None,
        }
    }

    /// A binding that only switches the device on or off.
    #[must_use]
    pub fn status_only(device_id: DeviceId, target_status: DeviceStatus) -> Self {
        Self {
            device_id,
            target_state: None,
            target_status,
            snapshot: None,
        }
    }
}

/// Return the first device id bound more than once, if any.
#[must_use]
pub fn find_duplicate(bindings: &[Binding]) -> Option<DeviceId> {
    let mut seen = std::collections::HashSet::new();
    bindings
        .iter()
        .map(|b| b.device_id)
        .find(|id| !seen.insert(*id))
}

/// Whether two binding lists control the same devices with the same
/// targets, in the same order. Snapshots are ignored.
#[must_use]
pub fn same_targets(a: &[Binding], b: &[Binding]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.device_id == y.device_id
                && x.target_state == y.target_state
                && x.target_status == y.target_status
        })
}
