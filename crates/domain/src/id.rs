//! Typed identifier newtypes backed by UUIDs.
//!
//! Each id knows the name of the entity it identifies, so lookups and
//! compare-and-set commits report errors the same way in every layer.
//! Storage binds ids as their hyphenated text form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConflictError, NotFoundError};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident => $entity:literal) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Entity name used in error messages.
            pub const ENTITY: &'static str = $entity;

            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }

            /// The record this id points to does not exist.
            #[must_use]
            pub fn not_found(self) -> NotFoundError {
                NotFoundError {
                    entity: Self::ENTITY,
                    id: self.to_string(),
                }
            }

            /// The record this id points to changed under a transition.
            #[must_use]
            pub fn conflict(self) -> ConflictError {
                ConflictError {
                    entity: Self::ENTITY,
                    id: self.to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Device`](crate::device::Device).
    DeviceId => "Device"
);

define_id!(
    /// Room a device or ambiance mode belongs to. Rooms themselves are
    /// managed outside this workspace.
    RoomId => "Room"
);

define_id!(
    /// House an automation rule belongs to. Houses themselves are managed
    /// outside this workspace.
    HouseId => "House"
);

define_id!(
    /// Unique identifier for an [`AutomationRule`](crate::automation::AutomationRule).
    AutomationId => "Automation"
);

define_id!(
    /// Unique identifier for an [`AmbianceMode`](crate::ambiance::AmbianceMode).
    AmbianceModeId => "AmbianceMode"
);

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn should_report_missing_device_by_entity_and_id() {
        let id = DeviceId::new();
        let err = id.not_found();
        assert_eq!(err.entity, "Device");
        assert_eq!(err.to_string(), format!("Device {id} not found"));
    }

    #[test]
    fn should_report_conflict_on_automation_by_entity_and_id() {
        let id = AutomationId::new();
        assert_eq!(
            id.conflict().to_string(),
            format!("Automation {id} changed concurrently")
        );
        assert_eq!(AmbianceModeId::ENTITY, "AmbianceMode");
    }

    #[test]
    fn should_parse_the_text_form_stored_in_binding_rows() {
        let id = DeviceId::new();
        let stored = id.to_string();
        assert_eq!(stored.len(), 36);
        assert_eq!(stored.parse::<DeviceId>().unwrap(), id);
    }

    #[test]
    fn should_serialize_as_bare_uuid_string() {
        let uuid = uuid::Uuid::new_v4();
        let json = serde_json::to_string(&RoomId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn should_reject_corrupted_id_column() {
        assert!(AmbianceModeId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn should_key_snapshots_by_device() {
        let (lamp, heater) = (DeviceId::new(), DeviceId::new());
        let mut levels = HashMap::new();
        levels.insert(lamp, 1);
        levels.insert(heater, 2);
        levels.insert(lamp, 3);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[&lamp], 3);
        assert_eq!(HouseId::from_uuid(heater.as_uuid()).as_uuid(), heater.as_uuid());
    }
}
