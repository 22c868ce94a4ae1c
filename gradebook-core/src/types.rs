//! Core domain types for gradebook
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Student** | A person identified by a unique (first name, last name) pair |
//! | **Entry** | One persisted GPA calculation attempt for a Student |
//! | **Latest entry** | The Entry with the most recent timestamp for a Student; the only one surfaced by non-history reads |
//! | **Course record** | One graded course inside an Entry, owned exclusively by it |
//! | **Grade point** | The numeric value a letter grade maps to on the institutional scale |
//!
//! A Student owns zero or more Entries; an Entry owns its course records.
//! Both relationships cascade on delete and nothing is shared across owners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gpa;

// ============================================
// Student
// ============================================

/// A student the system keeps records for.
///
/// The (first name, last name) pair is unique in storage; saving an existing
/// pair returns the existing row instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Generated row id
    pub id: i64,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
}

impl Student {
    /// "First Last" display form
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ============================================
// GPA entries
// ============================================

/// One persisted GPA calculation attempt, as read queries return it
/// (joined with the owning student's name pair).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpaEntry {
    /// Generated row id
    pub id: i64,
    /// Owning student
    pub student_id: i64,
    /// Student first name (joined)
    pub first_name: String,
    /// Student last name (joined)
    pub last_name: String,
    /// Credit-weighted GPA at calculation time
    pub gpa_value: f64,
    /// Sum of course credits in this attempt
    pub total_credits: f64,
    /// When the calculation ran
    pub calculated_at: DateTime<Utc>,
}

/// An entry that has not been saved yet.
///
/// The repository assigns the row id at insert time; `calculated_at` is the
/// ordering key for "latest entry" resolution (row id breaks ties).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDraft {
    /// Owning student
    pub student_id: i64,
    /// Credit-weighted GPA
    pub gpa_value: f64,
    /// Sum of course credits
    pub total_credits: f64,
    /// When the calculation ran
    pub calculated_at: DateTime<Utc>,
}

// ============================================
// Course records
// ============================================

/// One graded course inside a GPA entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// Course name
    pub name: String,
    /// Course code (optional)
    pub code: Option<String>,
    /// Credit hours; must be > 0 to contribute to the weighted GPA
    pub credit: f64,
    /// Primary instructor (optional)
    pub teacher1: Option<String>,
    /// Secondary instructor (optional)
    pub teacher2: Option<String>,
    /// Letter grade as entered
    pub grade_letter: String,
    /// Numeric grade point, derived from the letter
    pub grade_point: f64,
}

impl CourseRecord {
    /// Build a course record, deriving the grade point from the letter.
    ///
    /// Unrecognized letters map to 0.0 rather than failing; input validation
    /// is the caller's concern.
    pub fn new(
        name: impl Into<String>,
        code: Option<String>,
        credit: f64,
        teacher1: Option<String>,
        teacher2: Option<String>,
        grade_letter: impl Into<String>,
    ) -> Self {
        let grade_letter = grade_letter.into();
        let grade_point = gpa::grade_point(&grade_letter);
        Self {
            name: name.into(),
            code,
            credit,
            teacher1,
            teacher2,
            grade_letter,
            grade_point,
        }
    }
}
