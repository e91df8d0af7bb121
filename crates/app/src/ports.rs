//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod ambiance_repo;
pub mod automation_repo;
pub mod device_repo;

pub use ambiance_repo::AmbianceRepository;
pub use automation_repo::AutomationRepository;
pub use device_repo::DeviceRepository;
