//! Record-keeping service layer
//!
//! This module orchestrates a GPA save: compute the weighted average, dedupe
//! the student by name pair, then write the entry and its course breakdown
//! in one transaction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │   Caller     │ ──► │ RecordService │ ──► │    Database     │
//! │ (UI, tests)  │     │  (+ gpa calc) │     │ (students, ...) │
//! └──────────────┘     └───────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gradebook_core::{Config, Database, RecordService};
//!
//! let db = Arc::new(Database::open(&Config::database_path())?);
//! db.migrate()?;
//!
//! let service = RecordService::new(db);
//! let saved = service.record("Ada", "Lovelace", &courses)?;
//! println!("entry {} with GPA {:.2}", saved.entry_id, saved.gpa_value);
//! ```

use crate::db::Database;
use crate::error::{Error, Result};
use crate::gpa;
use crate::types::{CourseRecord, EntryDraft};
use chrono::Utc;
use std::sync::Arc;

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEntry {
    /// Id of the newly inserted entry
    pub entry_id: i64,
    /// Id of the owning student (new or pre-existing)
    pub student_id: i64,
    /// Computed weighted GPA
    pub gpa_value: f64,
    /// Computed credit total
    pub total_credits: f64,
}

/// Orchestrates GPA calculation and persistence.
///
/// Holds a shared [`Database`]; cheap to clone into background workers.
#[derive(Clone)]
pub struct RecordService {
    db: Arc<Database>,
}

impl RecordService {
    /// Create a new service over a shared database handle.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Compute and persist a new GPA entry for the named student.
    ///
    /// The student row is created on first save for the name pair and reused
    /// afterwards. The entry and its courses are written atomically, stamped
    /// with the current time.
    pub fn record(
        &self,
        first_name: &str,
        last_name: &str,
        courses: &[CourseRecord],
    ) -> Result<RecordedEntry> {
        let gpa_value = gpa::weighted_gpa(courses);
        let total_credits = gpa::total_credits(courses);

        let student = self.db.save_or_get_student(first_name, last_name)?;

        let draft = EntryDraft {
            student_id: student.id,
            gpa_value,
            total_credits,
            calculated_at: Utc::now(),
        };
        let entry_id = self.db.save_entry(&draft, courses)?;

        tracing::info!(
            entry_id,
            student_id = student.id,
            gpa = gpa_value,
            credits = total_credits,
            "Recorded GPA entry"
        );

        Ok(RecordedEntry {
            entry_id,
            student_id: student.id,
            gpa_value,
            total_credits,
        })
    }

    /// Recalculate an existing student's GPA, replacing their latest entry.
    ///
    /// The previous latest entry is deleted first so exactly one "latest"
    /// exists after the save; the old attempt is not kept as history. Fails
    /// with [`Error::NotFound`] if the student id no longer exists, and
    /// never saves on top of a failed delete.
    pub fn replace_latest(
        &self,
        student_id: i64,
        courses: &[CourseRecord],
    ) -> Result<RecordedEntry> {
        let student = self
            .db
            .get_student(student_id)?
            .ok_or(Error::NotFound {
                entity: "student",
                id: student_id,
            })?;

        if let Some(old_entry) = self.db.delete_latest_entry(student.id)? {
            tracing::debug!(student_id, old_entry, "Replaced previous GPA entry");
        }

        self.record(&student.first_name, &student.last_name, courses)
    }
}
