//! # dwell-domain
//!
//! Pure domain model for the dwell home automation backend.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** with a closed set of kinds (fixed, variable, monitors)
//!   and their typed state values
//! - Define **Bindings** between a rule or mode and one controlled device,
//!   carrying the target and the snapshot taken at activation
//! - Define **Automation rules** (time-windowed, house-scoped)
//! - Define **Ambiance modes** (manually toggled, room-scoped)
//! - Provide the pure **rule engine**: window decisions and the
//!   snapshot/apply/restore computations shared by rules and modes
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod ambiance;
pub mod automation;
pub mod binding;
pub mod device;
pub mod engine;
