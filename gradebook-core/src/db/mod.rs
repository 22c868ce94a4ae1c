//! Database layer for gradebook
//!
//! This module provides the storage layer using SQLite with:
//! - Idempotent schema migrations (plus an explicit destructive reset)
//! - Repository pattern for queries and transactional writes

pub mod repo;
pub mod schema;

pub use repo::Database;
