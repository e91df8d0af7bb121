//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use dwell_domain::ambiance::AmbianceMode;
use dwell_domain::automation::AutomationRule;
use dwell_domain::binding::{Binding, same_targets};
use dwell_domain::device::{Device, DeviceKind, DeviceStatus, DeviceWrite, LevelRange, StateValue};
use dwell_domain::error::DwellError;
use dwell_domain::id::{AmbianceModeId, AutomationId, DeviceId, HouseId, RoomId};

use crate::ports::{AmbianceRepository, AutomationRepository, DeviceRepository};

#[derive(Default)]
struct State {
    devices: HashMap<DeviceId, Device>,
    rules: HashMap<AutomationId, AutomationRule>,
    modes: HashMap<AmbianceModeId, AmbianceMode>,
    failing_rules: HashSet<AutomationId>,
}

/// One store behind all three ports, so transitions can be applied atomically.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

/// Mirror of the storage rule for definition updates: snapshots survive,
/// changed targets are refused while `active`.
fn redefine(stored: &mut Vec<Binding>, incoming: &[Binding], active: bool) -> bool {
    if same_targets(stored, incoming) {
        return true;
    }
    if active {
        return false;
    }
    *stored = incoming
        .iter()
        .map(|binding| Binding {
            snapshot: None,
            ..binding.clone()
        })
        .collect();
    true
}

fn device_not_found(id: DeviceId) -> DwellError {
    id.not_found().into()
}

fn apply_all(
    devices: &HashMap<DeviceId, Device>,
    writes: &[DeviceWrite],
) -> Result<Vec<Device>, DwellError> {
    writes
        .iter()
        .map(|write| {
            let mut device = devices
                .get(&write.device_id)
                .cloned()
                .ok_or_else(|| device_not_found(write.device_id))?;
            device.apply(write)?;
            Ok(device)
        })
        .collect()
}

fn commit_rule(
    state: &mut State,
    rule: AutomationRule,
    was_running: bool,
    writes: &[DeviceWrite],
) -> Result<AutomationRule, DwellError> {
    if state.failing_rules.contains(&rule.id) {
        return Err(DwellError::Storage(Box::new(std::io::Error::other(
            "injected failure",
        ))));
    }
    let stored = state.rules.get(&rule.id).ok_or_else(|| rule.id.not_found())?;
    if stored.is_running != was_running {
        return Err(rule.id.conflict().into());
    }
    for device in apply_all(&state.devices, writes)? {
        state.devices.insert(device.id, device);
    }
    state.rules.insert(rule.id, rule.clone());
    Ok(rule)
}

fn commit_mode(
    state: &mut State,
    mode: AmbianceMode,
    previous: DeviceStatus,
    writes: &[DeviceWrite],
) -> Result<AmbianceMode, DwellError> {
    let stored = state.modes.get(&mode.id).ok_or_else(|| mode.id.not_found())?;
    if stored.status != previous {
        return Err(mode.id.conflict().into());
    }
    for device in apply_all(&state.devices, writes)? {
        state.devices.insert(device.id, device);
    }
    state.modes.insert(mode.id, mode.clone());
    Ok(mode)
}

impl InMemoryStore {
    /// Make every `commit_transition` of `id` fail with a storage error.
    pub fn fail_commits_for(&self, id: AutomationId) {
        self.state.lock().unwrap().failing_rules.insert(id);
    }

    pub fn device(&self, id: DeviceId) -> Device {
        self.state.lock().unwrap().devices[&id].clone()
    }

    pub fn rule(&self, id: AutomationId) -> AutomationRule {
        self.state.lock().unwrap().rules[&id].clone()
    }

    pub fn mode(&self, id: AmbianceModeId) -> AmbianceMode {
        self.state.lock().unwrap().modes[&id].clone()
    }

    pub fn insert_device(&self, device: Device) -> Device {
        self.state
            .lock()
            .unwrap()
            .devices
            .insert(device.id, device.clone());
        device
    }

    pub fn remove_device(&self, id: DeviceId) {
        self.state.lock().unwrap().devices.remove(&id);
    }

    pub fn insert_rule(&self, rule: AutomationRule) -> AutomationRule {
        self.state.lock().unwrap().rules.insert(rule.id, rule.clone());
        rule
    }

    pub fn insert_mode(&self, mode: AmbianceMode) -> AmbianceMode {
        self.state.lock().unwrap().modes.insert(mode.id, mode.clone());
        mode
    }
}

impl DeviceRepository for InMemoryStore {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, DwellError>> + Send {
        let device = self.insert_device(device);
        async { Ok(device) }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, DwellError>> + Send {
        let r = self.state.lock().unwrap().devices.get(&id).cloned();
        async { Ok(r) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send {
        let r: Vec<_> = self.state.lock().unwrap().devices.values().cloned().collect();
        async { Ok(r) }
    }

    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send {
        let r: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .devices
            .values()
            .filter(|d| d.room_id == room_id)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn set_state(
        &self,
        id: DeviceId,
        state: StateValue,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send {
        let mut guard = self.state.lock().unwrap();
        let r = match guard.devices.get_mut(&id) {
            Some(device) => device
                .set_state(state)
                .map(|()| device.clone())
                .map_err(DwellError::from),
            None => Err(device_not_found(id)),
        };
        async { r }
    }

    fn set_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send {
        let mut guard = self.state.lock().unwrap();
        let r = match guard.devices.get_mut(&id) {
            Some(device) => {
                device.set_status(status);
                Ok(device.clone())
            }
            None => Err(device_not_found(id)),
        };
        async { r }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), DwellError>> + Send {
        let mut guard = self.state.lock().unwrap();
        guard.devices.remove(&id);
        for rule in guard.rules.values_mut() {
            rule.bindings.retain(|b| b.device_id != id);
        }
        for mode in guard.modes.values_mut() {
            mode.bindings.retain(|b| b.device_id != id);
        }
        async { Ok(()) }
    }
}

impl AutomationRepository for InMemoryStore {
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        let rule = self.insert_rule(rule);
        async { Ok(rule) }
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, DwellError>> + Send {
        let r = self.state.lock().unwrap().rules.get(&id).cloned();
        async { Ok(r) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        let r: Vec<_> = self.state.lock().unwrap().rules.values().cloned().collect();
        async { Ok(r) }
    }

    fn get_schedulable(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        let r: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .rules
            .values()
            .filter(|r| r.enabled || r.is_running)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn find_by_house(
        &self,
        house_id: HouseId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        let r: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .rules
            .values()
            .filter(|r| r.house_id == house_id)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        let mut guard = self.state.lock().unwrap();
        let r = match guard.rules.get_mut(&rule.id) {
            Some(stored) => {
                let mut next = stored.clone();
                next.house_id = rule.house_id;
                next.name.clone_from(&rule.name);
                next.window = rule.window;
                if redefine(&mut next.bindings, &rule.bindings, next.is_running) {
                    *stored = next;
                    Ok(stored.clone())
                } else {
                    Err(rule.id.conflict().into())
                }
            }
            None => Err(rule.id.not_found().into()),
        };
        async { r }
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), DwellError>> + Send {
        self.state.lock().unwrap().rules.remove(&id);
        async { Ok(()) }
    }

    fn commit_transition(
        &self,
        rule: AutomationRule,
        was_running: bool,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        let r = commit_rule(&mut self.state.lock().unwrap(), rule, was_running, &writes);
        async { r }
    }
}

impl AmbianceRepository for InMemoryStore {
    fn create(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        let mode = self.insert_mode(mode);
        async { Ok(mode) }
    }

    fn get_by_id(
        &self,
        id: AmbianceModeId,
    ) -> impl Future<Output = Result<Option<AmbianceMode>, DwellError>> + Send {
        let r = self.state.lock().unwrap().modes.get(&id).cloned();
        async { Ok(r) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send {
        let r: Vec<_> = self.state.lock().unwrap().modes.values().cloned().collect();
        async { Ok(r) }
    }

    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send {
        let r: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .modes
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn update(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        let mut guard = self.state.lock().unwrap();
        let r = match guard.modes.get_mut(&mode.id) {
            Some(stored) => {
                let mut next = stored.clone();
                next.room_id = mode.room_id;
                next.name.clone_from(&mode.name);
                let active = next.is_on();
                if redefine(&mut next.bindings, &mode.bindings, active) {
                    *stored = next;
                    Ok(stored.clone())
                } else {
                    Err(mode.id.conflict().into())
                }
            }
            None => Err(mode.id.not_found().into()),
        };
        async { r }
    }

    fn delete(&self, id: AmbianceModeId) -> impl Future<Output = Result<(), DwellError>> + Send {
        self.state.lock().unwrap().modes.remove(&id);
        async { Ok(()) }
    }

    fn commit_transition(
        &self,
        mode: AmbianceMode,
        previous: DeviceStatus,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        let r = commit_mode(&mut self.state.lock().unwrap(), mode, previous, &writes);
        async { r }
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

pub fn fixed_device(room_id: RoomId, options: &[&str], state: &str) -> Device {
    Device::builder()
        .name("Light")
        .room_id(room_id)
        .kind(DeviceKind::Fixed {
            options: options.iter().map(ToString::to_string).collect(),
            state: state.to_string(),
        })
        .build()
        .unwrap()
}

pub fn variable_device(room_id: RoomId, state: i64) -> Device {
    Device::builder()
        .name("Dimmer")
        .room_id(room_id)
        .kind(DeviceKind::Variable { state, range: None })
        .build()
        .unwrap()
}

pub fn thermostat(room_id: RoomId, state: i64) -> Device {
    Device::builder()
        .name("Thermostat")
        .room_id(room_id)
        .status(DeviceStatus::On)
        .kind(DeviceKind::Variable {
            state,
            range: Some(LevelRange::THERMOSTAT),
        })
        .build()
        .unwrap()
}

pub fn monitor_device(room_id: RoomId) -> Device {
    Device::builder()
        .name("Humidity")
        .room_id(room_id)
        .kind(DeviceKind::MonitorVariable { state: 45 })
        .build()
        .unwrap()
}
