//! # dwell-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `dwell-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//! - Commit each rule or mode transition in a single transaction
//!
//! ## Dependency rule
//! Depends on `dwell-app` (for port traits) and `dwell-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod ambiance_repo;
mod automation_repo;
mod binding_rows;
mod device_repo;
mod error;
mod pool;

pub use ambiance_repo::SqliteAmbianceRepository;
pub use automation_repo::SqliteAutomationRepository;
pub use device_repo::SqliteDeviceRepository;
pub use error::StorageError;
pub use pool::{Config, Database};
