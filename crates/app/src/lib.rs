//! # dwell-app
//!
//! Application layer — use-cases, the scheduler and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository` — the live state of every device
//!   - `AutomationRepository` — CRUD and atomic transitions for automation rules
//!   - `AmbianceRepository` — CRUD and atomic transitions for ambiance modes
//! - Define **driving/inbound ports** as use-case structs:
//!   - `DeviceService` — register, toggle, set state, step levels
//!   - `AutomationService` — CRUD and the enable/disable toggle
//!   - `AmbianceService` — CRUD and the on/off toggle
//!   - `Scheduler` — evaluate time windows on a fixed interval
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `dwell-domain` only (plus `tokio::time` for the scheduler).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod scheduler;
pub mod services;
pub mod transition;

#[cfg(test)]
mod testing;
