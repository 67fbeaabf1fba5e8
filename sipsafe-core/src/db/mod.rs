//! Database layer for sipsafe
//!
//! SQLite storage for:
//! - The append-only drink history behind local analytics
//! - The live session, so separate CLI invocations share one session

pub mod repo;
pub mod schema;

pub use repo::Database;
