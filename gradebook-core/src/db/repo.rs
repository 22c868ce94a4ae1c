//! Database repository layer
//!
//! Provides query and write operations for students, GPA entries, and course
//! records. Multi-table writes go through a single transaction; "latest
//! entry" resolution always orders by calculation timestamp with the row id
//! as tie-break, so the more recently inserted entry wins deterministically.

use crate::error::Result;
use crate::types::{CourseRecord, EntryDraft, GpaEntry, Student};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Database handle (single connection behind a mutex)
///
/// Construct one at process start and share it via `Arc`; there is no global
/// instance. The connection is released when the handle drops.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Referential integrity is enforced by the engine, not re-checked in
        // application code; WAL keeps readers unblocked during writes.
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Drop and recreate the schema, destroying all stored records.
    pub fn reset(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::reset_schema(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Student operations
    // ============================================

    /// Look a student up by the unique name pair, inserting if absent.
    ///
    /// Idempotent: repeated calls with the same pair return the same row.
    pub fn save_or_get_student(&self, first_name: &str, last_name: &str) -> Result<Student> {
        let conn = self.conn.lock().unwrap();

        let existing = conn
            .query_row(
                "SELECT id, first_name, last_name FROM students
                 WHERE first_name = ?1 AND last_name = ?2",
                params![first_name, last_name],
                Self::row_to_student,
            )
            .optional()?;

        if let Some(student) = existing {
            return Ok(student);
        }

        conn.execute(
            "INSERT INTO students (first_name, last_name) VALUES (?1, ?2)",
            params![first_name, last_name],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(id, first_name, last_name, "Created student");

        Ok(Student {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }

    /// Get a student by id
    pub fn get_student(&self, id: i64) -> Result<Option<Student>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, first_name, last_name FROM students WHERE id = ?",
            [id],
            Self::row_to_student,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List all students, ordered by first name then last name
    pub fn list_students(&self) -> Result<Vec<Student>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, first_name, last_name FROM students ORDER BY first_name, last_name",
        )?;

        let students = stmt
            .query_map([], Self::row_to_student)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(students)
    }

    /// Delete a student and, by cascade, all of their entries and courses.
    ///
    /// Returns whether a row was actually removed; an unknown id is not an
    /// error.
    pub fn delete_student(&self, student_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM students WHERE id = ?", [student_id])?;

        tracing::debug!(student_id, deleted = affected > 0, "Deleted student");

        Ok(affected > 0)
    }

    fn row_to_student(row: &Row) -> rusqlite::Result<Student> {
        Ok(Student {
            id: row.get("id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
        })
    }

    // ============================================
    // Entry operations
    // ============================================

    /// Insert a GPA entry and its course set as one transaction.
    ///
    /// All-or-nothing: if any course insert fails the entry row is rolled
    /// back with it and no partial record is ever observable. Returns the new
    /// entry's id.
    pub fn save_entry(&self, entry: &EntryDraft, courses: &[CourseRecord]) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO gpa_entries (student_id, gpa_value, total_credits, calculated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.student_id,
                entry.gpa_value,
                entry.total_credits,
                entry.calculated_at.to_rfc3339(),
            ],
        )?;
        let entry_id = tx.last_insert_rowid();

        for course in courses {
            tx.execute(
                "INSERT INTO courses (entry_id, name, code, credit, teacher1, teacher2,
                                      grade_letter, grade_point)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry_id,
                    course.name,
                    course.code,
                    course.credit,
                    course.teacher1,
                    course.teacher2,
                    course.grade_letter,
                    course.grade_point,
                ],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            entry_id,
            student_id = entry.student_id,
            courses = courses.len(),
            "Saved GPA entry"
        );

        Ok(entry_id)
    }

    /// Get all entries for a student, most recent first
    pub fn entries_for_student(&self, student_id: i64) -> Result<Vec<GpaEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.student_id, s.first_name, s.last_name,
                    e.gpa_value, e.total_credits, e.calculated_at
             FROM gpa_entries e
             JOIN students s ON s.id = e.student_id
             WHERE e.student_id = ?
             ORDER BY e.calculated_at DESC, e.id DESC",
        )?;

        let entries = stmt
            .query_map([student_id], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// List every student's entries, most recent first
    pub fn list_entries(&self) -> Result<Vec<GpaEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.student_id, s.first_name, s.last_name,
                    e.gpa_value, e.total_credits, e.calculated_at
             FROM gpa_entries e
             JOIN students s ON s.id = e.student_id
             ORDER BY e.calculated_at DESC, e.id DESC",
        )?;

        let entries = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// GPA value of the student's latest entry, or 0.0 if none exists
    pub fn latest_gpa_value(&self, student_id: i64) -> Result<f64> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT gpa_value FROM gpa_entries
                 WHERE student_id = ?
                 ORDER BY calculated_at DESC, id DESC
                 LIMIT 1",
                [student_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.unwrap_or(0.0))
    }

    /// Course set of the student's latest entry; empty if no entries exist
    pub fn latest_entry_courses(&self, student_id: i64) -> Result<Vec<CourseRecord>> {
        let latest = self.latest_entry_id(student_id)?;
        match latest {
            Some(entry_id) => self.courses_for_entry(entry_id),
            None => Ok(Vec::new()),
        }
    }

    /// Delete only the student's most recent entry (courses cascade).
    ///
    /// Returns the deleted entry's id, or `None` when the student has no
    /// entries - a no-op, not an error.
    pub fn delete_latest_entry(&self, student_id: i64) -> Result<Option<i64>> {
        let latest = self.latest_entry_id(student_id)?;

        match latest {
            Some(entry_id) => {
                let conn = self.conn.lock().unwrap();
                conn.execute("DELETE FROM gpa_entries WHERE id = ?", [entry_id])?;
                tracing::debug!(student_id, entry_id, "Deleted latest GPA entry");
                Ok(Some(entry_id))
            }
            None => {
                tracing::debug!(student_id, "No GPA entry to delete");
                Ok(None)
            }
        }
    }

    /// Delete a single entry by id (courses cascade).
    ///
    /// Returns whether a row was actually removed.
    pub fn delete_entry(&self, entry_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM gpa_entries WHERE id = ?", [entry_id])?;
        Ok(affected > 0)
    }

    fn latest_entry_id(&self, student_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id FROM gpa_entries
             WHERE student_id = ?
             ORDER BY calculated_at DESC, id DESC
             LIMIT 1",
            [student_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    fn row_to_entry(row: &Row) -> rusqlite::Result<GpaEntry> {
        let calculated_at_str: String = row.get("calculated_at")?;

        Ok(GpaEntry {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            gpa_value: row.get("gpa_value")?,
            total_credits: row.get("total_credits")?,
            calculated_at: DateTime::parse_from_rfc3339(&calculated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    // ============================================
    // Course operations
    // ============================================

    /// Get the course set of an entry; empty for an unknown id
    pub fn courses_for_entry(&self, entry_id: i64) -> Result<Vec<CourseRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, code, credit, teacher1, teacher2, grade_letter, grade_point
             FROM courses WHERE entry_id = ?",
        )?;

        let courses = stmt
            .query_map([entry_id], Self::row_to_course)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(courses)
    }

    fn row_to_course(row: &Row) -> rusqlite::Result<CourseRecord> {
        Ok(CourseRecord {
            name: row.get("name")?,
            code: row.get("code")?,
            credit: row.get("credit")?,
            teacher1: row.get("teacher1")?,
            teacher2: row.get("teacher2")?,
            grade_letter: row.get("grade_letter")?,
            grade_point: row.get("grade_point")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    fn draft(student_id: i64, gpa: f64, at: DateTime<Utc>) -> EntryDraft {
        EntryDraft {
            student_id,
            gpa_value: gpa,
            total_credits: 3.0,
            calculated_at: at,
        }
    }

    fn course(name: &str, credit: f64, letter: &str) -> CourseRecord {
        CourseRecord::new(name, Some("CS-101".into()), credit, None, None, letter)
    }

    #[test]
    fn test_save_or_get_student_is_idempotent() {
        let db = test_db();

        let first = db.save_or_get_student("Ada", "Lovelace").unwrap();
        let second = db.save_or_get_student("Ada", "Lovelace").unwrap();

        assert_eq!(first.id, second.id);

        let students = db.list_students().unwrap();
        assert_eq!(students.len(), 1);
    }

    #[test]
    fn test_list_students_ordering() {
        let db = test_db();

        db.save_or_get_student("Grace", "Hopper").unwrap();
        db.save_or_get_student("Ada", "Lovelace").unwrap();
        db.save_or_get_student("Ada", "Byron").unwrap();

        let names: Vec<String> = db
            .list_students()
            .unwrap()
            .iter()
            .map(Student::full_name)
            .collect();
        assert_eq!(names, ["Ada Byron", "Ada Lovelace", "Grace Hopper"]);
    }

    #[test]
    fn test_get_student() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        assert_eq!(db.get_student(ada.id).unwrap().unwrap().first_name, "Ada");
        assert!(db.get_student(999).unwrap().is_none());
    }

    #[test]
    fn test_save_entry_persists_courses() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        let courses = vec![course("Calculus", 3.0, "A+"), course("Physics", 4.0, "B")];
        let entry_id = db
            .save_entry(&draft(ada.id, 3.5, ts(10, 0)), &courses)
            .unwrap();

        let stored = db.courses_for_entry(entry_id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].name, "Calculus");
        assert_eq!(stored[0].grade_point, 4.0);
        assert_eq!(stored[1].grade_letter, "B");
    }

    #[test]
    fn test_save_entry_is_atomic() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        // Force the third course insert to fail mid-transaction.
        db.connection()
            .execute_batch(
                "CREATE TRIGGER courses_reject BEFORE INSERT ON courses
                 WHEN NEW.name = 'reject-me'
                 BEGIN SELECT RAISE(ABORT, 'rejected by test trigger'); END;",
            )
            .unwrap();

        let courses = vec![
            course("Calculus", 3.0, "A"),
            course("Physics", 4.0, "B"),
            course("reject-me", 2.0, "C"),
        ];
        let err = db
            .save_entry(&draft(ada.id, 3.0, ts(10, 0)), &courses)
            .unwrap_err();
        assert!(matches!(err, Error::IntegrityViolation(_)));

        // No partial record: neither the entry nor any course row survived.
        let entry_count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM gpa_entries", [], |r| r.get(0))
            .unwrap();
        let course_count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))
            .unwrap();
        assert_eq!(entry_count, 0);
        assert_eq!(course_count, 0);
    }

    #[test]
    fn test_entries_ordered_newest_first() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        let t1 = ts(9, 0);
        let t2 = ts(10, 0);
        let t3 = ts(11, 0);

        // Insert out of chronological order
        db.save_entry(&draft(ada.id, 2.0, t2), &[course("B", 3.0, "B")])
            .unwrap();
        db.save_entry(&draft(ada.id, 1.0, t1), &[course("A", 3.0, "C")])
            .unwrap();
        db.save_entry(&draft(ada.id, 3.0, t3), &[course("C", 3.0, "A")])
            .unwrap();

        let entries = db.entries_for_student(ada.id).unwrap();
        let stamps: Vec<DateTime<Utc>> = entries.iter().map(|e| e.calculated_at).collect();
        assert_eq!(stamps, [t3, t2, t1]);
        assert_eq!(entries[0].first_name, "Ada");
    }

    #[test]
    fn test_equal_timestamps_break_ties_toward_higher_id() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        let at = ts(12, 0);
        db.save_entry(&draft(ada.id, 1.0, at), &[course("A", 3.0, "C")])
            .unwrap();
        let newer = db
            .save_entry(&draft(ada.id, 2.0, at), &[course("B", 3.0, "B")])
            .unwrap();

        let entries = db.entries_for_student(ada.id).unwrap();
        assert_eq!(entries[0].id, newer);
        assert_eq!(db.latest_gpa_value(ada.id).unwrap(), 2.0);
    }

    #[test]
    fn test_latest_gpa_value_defaults_to_zero() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        assert_eq!(db.latest_gpa_value(ada.id).unwrap(), 0.0);
    }

    #[test]
    fn test_latest_entry_courses() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        assert!(db.latest_entry_courses(ada.id).unwrap().is_empty());

        db.save_entry(&draft(ada.id, 2.0, ts(9, 0)), &[course("Old", 3.0, "C")])
            .unwrap();
        db.save_entry(&draft(ada.id, 4.0, ts(10, 0)), &[course("New", 3.0, "A+")])
            .unwrap();

        let courses = db.latest_entry_courses(ada.id).unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "New");
    }

    #[test]
    fn test_delete_latest_entry() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        let old = db
            .save_entry(&draft(ada.id, 2.0, ts(9, 0)), &[course("Old", 3.0, "C")])
            .unwrap();
        let newest = db
            .save_entry(&draft(ada.id, 4.0, ts(10, 0)), &[course("New", 3.0, "A+")])
            .unwrap();

        let deleted = db.delete_latest_entry(ada.id).unwrap();
        assert_eq!(deleted, Some(newest));

        // Only the older entry remains; the deleted entry's courses cascaded.
        let entries = db.entries_for_student(ada.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, old);
        assert!(db.courses_for_entry(newest).unwrap().is_empty());
    }

    #[test]
    fn test_delete_latest_entry_noop_when_empty() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        assert_eq!(db.delete_latest_entry(ada.id).unwrap(), None);
        assert!(db.entries_for_student(ada.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_entry_by_id() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        let entry_id = db
            .save_entry(&draft(ada.id, 2.0, ts(9, 0)), &[course("X", 3.0, "B")])
            .unwrap();

        assert!(db.delete_entry(entry_id).unwrap());
        assert!(!db.delete_entry(entry_id).unwrap());
        assert!(db.courses_for_entry(entry_id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_student_cascades() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();

        db.save_entry(&draft(ada.id, 2.0, ts(9, 0)), &[course("A", 3.0, "B")])
            .unwrap();
        db.save_entry(&draft(ada.id, 3.0, ts(10, 0)), &[course("B", 3.0, "A")])
            .unwrap();

        assert!(db.delete_student(ada.id).unwrap());

        assert!(db.entries_for_student(ada.id).unwrap().is_empty());
        let orphan_courses: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphan_courses, 0);
    }

    #[test]
    fn test_delete_student_unknown_id_returns_false() {
        let db = test_db();
        assert!(!db.delete_student(12345).unwrap());
    }

    #[test]
    fn test_list_entries_across_students() {
        let db = test_db();
        let ada = db.save_or_get_student("Ada", "Lovelace").unwrap();
        let grace = db.save_or_get_student("Grace", "Hopper").unwrap();

        db.save_entry(&draft(ada.id, 2.0, ts(9, 0)), &[course("A", 3.0, "B")])
            .unwrap();
        db.save_entry(&draft(grace.id, 4.0, ts(10, 0)), &[course("B", 3.0, "A+")])
            .unwrap();

        let entries = db.list_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].first_name, "Grace");
        assert_eq!(entries[1].first_name, "Ada");
    }
}
