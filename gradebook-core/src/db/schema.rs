//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! Initialization is idempotent: opening an existing database preserves its
//! rows. Callers that want ephemeral storage use [`reset_schema`] explicitly.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name  TEXT NOT NULL,
        last_name   TEXT NOT NULL,

        UNIQUE (first_name, last_name)
    );

    CREATE TABLE IF NOT EXISTS gpa_entries (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id    INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
        gpa_value     REAL NOT NULL,
        total_credits REAL NOT NULL,
        calculated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS courses (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id     INTEGER NOT NULL REFERENCES gpa_entries(id) ON DELETE CASCADE,
        name         TEXT NOT NULL,
        code         TEXT,
        credit       REAL NOT NULL,
        teacher1     TEXT,
        teacher2     TEXT,
        grade_letter TEXT NOT NULL,
        grade_point  REAL NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entries_student ON gpa_entries(student_id);
    CREATE INDEX IF NOT EXISTS idx_entries_calculated ON gpa_entries(calculated_at DESC);
    CREATE INDEX IF NOT EXISTS idx_courses_entry ON courses(entry_id);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

/// Drop every table and recreate the schema from scratch.
///
/// This destroys all stored records. It exists for callers that genuinely
/// want per-session storage; normal startup goes through [`run_migrations`].
pub fn reset_schema(conn: &Connection) -> crate::error::Result<()> {
    tracing::warn!("Resetting schema: all stored records will be dropped");

    conn.execute_batch(
        r#"
        DROP INDEX IF EXISTS idx_courses_entry;
        DROP INDEX IF EXISTS idx_entries_calculated;
        DROP INDEX IF EXISTS idx_entries_student;
        DROP TABLE IF EXISTS courses;
        DROP TABLE IF EXISTS gpa_entries;
        DROP TABLE IF EXISTS students;
        PRAGMA user_version = 0;
        "#,
    )?;

    run_migrations(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        // Check version
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = ["students", "gpa_entries", "courses"];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_migrations_preserve_rows() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO students (first_name, last_name) VALUES ('Ada', 'Lovelace')",
            [],
        )
        .unwrap();

        // Re-running startup initialization must not drop data.
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        let fk_list: Vec<(String, String)> = conn
            .prepare("PRAGMA foreign_key_list(gpa_entries)")
            .unwrap()
            .query_map([], |row| {
                Ok((row.get::<_, String>(2)?, row.get::<_, String>(6)?))
            })
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        // gpa_entries should cascade-delete with its student
        assert!(
            fk_list
                .iter()
                .any(|(table, on_delete)| table == "students" && on_delete == "CASCADE"),
            "gpa_entries should reference students with ON DELETE CASCADE"
        );

        let fk_list: Vec<(String, String)> = conn
            .prepare("PRAGMA foreign_key_list(courses)")
            .unwrap()
            .query_map([], |row| {
                Ok((row.get::<_, String>(2)?, row.get::<_, String>(6)?))
            })
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(
            fk_list
                .iter()
                .any(|(table, on_delete)| table == "gpa_entries" && on_delete == "CASCADE"),
            "courses should reference gpa_entries with ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_reset_drops_rows() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO students (first_name, last_name) VALUES ('Ada', 'Lovelace')",
            [],
        )
        .unwrap();

        reset_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
