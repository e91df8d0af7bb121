//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod ambiance_service;
pub mod automation_service;
pub mod device_service;

pub use ambiance_service::{AmbianceService, AmbianceUpdate};
pub use automation_service::{AutomationService, AutomationUpdate, ToggleOutcome};
pub use device_service::DeviceService;

use dwell_domain::binding::Binding;
use dwell_domain::device::Device;
use dwell_domain::error::{DwellError, InvalidStateError};

use crate::ports::DeviceRepository;

/// Check that every binding targets an existing, controllable device with a
/// target of the right kind. Returns the bound devices in binding order.
async fn check_bindings<D: DeviceRepository>(
    devices: &D,
    bindings: &[Binding],
) -> Result<Vec<Device>, DwellError> {
    let mut found = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let device = devices
            .get_by_id(binding.device_id)
            .await?
            .ok_or_else(|| binding.device_id.not_found())?;
        if !device.kind.is_controllable() {
            return Err(InvalidStateError::ReadOnly {
                kind: device.kind.tag(),
            }
            .into());
        }
        if let Some(target) = &binding.target_state {
            device.kind.check_target(target)?;
        }
        found.push(device);
    }
    Ok(found)
}

/// Bindings as accepted from a request: snapshots are owned by transitions.
fn without_snapshots(bindings: Vec<Binding>) -> Vec<Binding> {
    bindings
        .into_iter()
        .map(|binding| Binding {
            snapshot: None,
            ..binding
        })
        .collect()
}
