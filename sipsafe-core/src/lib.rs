//! # sipsafe-core
//!
//! Core library for sipsafe - a blood alcohol estimator and drinking session tracker.
//!
//! This library provides:
//! - Widmark BAC estimation and zone classification
//! - A session tracker with hydration reminders and a one-shot emergency alert
//! - Consumption analytics over calendar-aligned windows
//! - SQLite storage, a backend HTTP client, configuration and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use sipsafe_core::{Config, Database, DrinkAmount, DrinkEvent, SessionTracker};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let now = Utc::now();
//! let mut tracker = SessionTracker::new(config.profile(), now);
//! tracker.log_drink(DrinkEvent::new("BEER", DrinkAmount::StandardDrinks(1.0), now), now);
//! db.save_session(tracker.state()).expect("failed to save session");
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{AnalyticsRange, AnalyticsReport, AnalyticsResult, AnalyticsService};
pub use bac::{estimate_bac, Zone};
pub use client::BackendClient;
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use session::{SessionSignal, SessionSnapshot, SessionState, SessionTracker, SharedSession};
pub use types::*;

// Public modules
pub mod alerts;
pub mod analytics;
pub mod bac;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod session;
pub mod types;
