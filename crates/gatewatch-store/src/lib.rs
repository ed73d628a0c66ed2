//! SQLite persistence for Gatewatch.
//!
//! One store owns three tables: the append-only `events` log, the
//! `subscribers` directory, and the `students` roster. The store must be
//! opened successfully before polling begins; a failed open is the one
//! startup-fatal error in the system.

pub mod error;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use store::AttendanceStore;
