//! # gradebook-core
//!
//! Persistence and consistency core for an academic record keeper.
//!
//! This library provides:
//! - Domain types for students, GPA entries, and course records
//! - SQLite storage with idempotent migrations and cascade deletes
//! - A pure credit-weighted GPA calculation
//! - Thread-per-operation background execution with explicit completion
//!   states, so blocking storage I/O never stalls an interactive caller
//!
//! ## Architecture
//!
//! Leaves first: the schema layer owns table shapes and migrations; the
//! repository enforces invariants (unique name pairs, latest-entry ordering,
//! transactional entry+course writes) behind a typed facade; the service
//! composes the GPA calculation with the repository; the task module moves
//! any of it off the caller's thread.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gradebook_core::{task, Config, CourseRecord, Database, RecordService};
//!
//! # fn main() -> gradebook_core::Result<()> {
//! let config = Config::load()?;
//! let db = Arc::new(Database::open(&config.effective_database_path())?);
//! db.migrate()?;
//!
//! let service = RecordService::new(db);
//! let courses = vec![CourseRecord::new(
//!     "Analysis", Some("MATH201".into()), 3.0, None, None, "A",
//! )];
//!
//! // Off the caller's thread; poll the handle from an event loop or wait.
//! let svc = service.clone();
//! let handle = task::submit(move || svc.record("Ada", "Lovelace", &courses));
//! let saved = handle.wait()?;
//! println!("GPA {:.2} over {} credits", saved.gpa_value, saved.total_credits);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use service::{RecordService, RecordedEntry};
pub use types::{CourseRecord, EntryDraft, GpaEntry, Student};

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod gpa;
pub mod logging;
pub mod service;
pub mod task;
pub mod types;
