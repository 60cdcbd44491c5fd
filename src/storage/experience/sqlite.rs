//! SQLite-based experience storage.
//!
//! Uses the `UserLevels (User, Experience)` table layout of existing level
//! databases, so files written by earlier chat hosts open unchanged. Those
//! tables carry no uniqueness constraint, which is why writes go through an
//! update-then-insert transaction instead of `ON CONFLICT`.

use crate::models::{ExperienceUpdate, UserExperience};
use crate::storage::ExperienceStore;
use crate::storage::sqlite::{acquire_lock, configure_connection, record_operation_metrics};
use crate::{Error, Result};
use rusqlite::{Connection, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{info, warn};

const BACKEND: &str = "sqlite";

/// `SQLite`-based experience store.
pub struct SqliteExperienceStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the `SQLite` database.
    db_path: PathBuf,
}

impl SqliteExperienceStore {
    /// Opens (or creates) the store at `db_path` and ensures the schema.
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::store("open_levels_db", format!("{}: {e}", db_path.display())))?;
        configure_connection(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Creates an in-memory `SQLite` store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store("open_levels_db_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        acquire_lock(&self.conn)
    }

    /// Runs `op` and records its outcome.
    fn timed<T>(&self, operation: &'static str, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = op();
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(BACKEND, operation, start, status);
        result
    }
}

/// Reads a user's experience, tolerating duplicate rows from legacy files.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn read_experience(conn: &Connection, user: &str) -> Result<Option<u64>> {
    let mut stmt = conn
        .prepare_cached("SELECT Experience FROM UserLevels WHERE User = ?1 LIMIT 2")
        .map_err(|e| Error::store("prepare_get_experience", e))?;

    // Legacy rows may hold REAL values; f64 accepts both storage classes
    let rows = stmt
        .query_map(params![user], |row| row.get::<_, f64>(0))
        .map_err(|e| Error::store("get_experience", e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::store("read_experience_row", e))?;

    if rows.len() > 1 {
        warn!(user = %user, "Select yielded more than one row for user, using the first");
        metrics::counter!("levels_duplicate_rows_total").increment(1);
    }

    Ok(rows.first().map(|exp| exp.max(0.0).floor() as u64))
}

#[allow(clippy::cast_possible_wrap)]
fn write_experience(conn: &Connection, user: &str, experience: u64) -> Result<()> {
    let experience = experience.min(i64::MAX as u64) as i64;
    let updated = conn
        .execute(
            "UPDATE UserLevels SET Experience = ?1 WHERE User = ?2",
            params![experience, user],
        )
        .map_err(|e| Error::store("update_experience", e))?;

    if updated == 0 {
        conn.execute(
            "INSERT INTO UserLevels (User, Experience) VALUES (?1, ?2)",
            params![user, experience],
        )
        .map_err(|e| Error::store("insert_experience", e))?;
    }

    Ok(())
}

impl ExperienceStore for SqliteExperienceStore {
    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock_conn();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS UserLevels (
                User TEXT NOT NULL,
                Experience INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )
        .map_err(|e| Error::store("create_user_levels_table", e))?;

        // Not UNIQUE: legacy files may already contain duplicates
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_levels_user ON UserLevels(User)",
            [],
        )
        .map_err(|e| Error::store("create_user_levels_index", e))?;

        info!(path = %self.db_path.display(), "Level store schema ready");
        Ok(())
    }

    fn get(&self, user: &str) -> Result<Option<u64>> {
        self.timed("get", || {
            let conn = self.lock_conn();
            read_experience(&conn, user)
        })
    }

    fn upsert(&self, user: &str, experience: u64) -> Result<()> {
        self.timed("upsert", || {
            let mut conn = self.lock_conn();
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| Error::store("begin_upsert", e))?;
            write_experience(&tx, user, experience)?;
            tx.commit().map_err(|e| Error::store("commit_upsert", e))
        })
    }

    fn add_experience(&self, user: &str, delta: f64) -> Result<ExperienceUpdate> {
        self.timed("add_experience", || {
            let mut conn = self.lock_conn();
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| Error::store("begin_add_experience", e))?;

            let previous = read_experience(&tx, user)?.unwrap_or(0);
            let update = ExperienceUpdate::apply(previous, delta);
            write_experience(&tx, user, update.current)?;

            tx.commit()
                .map_err(|e| Error::store("commit_add_experience", e))?;
            Ok(update)
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn list(&self) -> Result<Vec<UserExperience>> {
        self.timed("list", || {
            let conn = self.lock_conn();
            let mut stmt = conn
                .prepare("SELECT User, Experience FROM UserLevels ORDER BY Experience DESC, User ASC")
                .map_err(|e| Error::store("prepare_list_experience", e))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(UserExperience {
                        user: row.get(0)?,
                        experience: row.get::<_, f64>(1)?.max(0.0).floor() as u64,
                    })
                })
                .map_err(|e| Error::store("list_experience", e))?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::store("read_experience_row", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_in_memory_creation() {
        let store = SqliteExperienceStore::in_memory().unwrap();
        assert_eq!(store.db_path().to_str(), Some(":memory:"));
    }

    #[test]
    fn test_get_unseen_user() {
        let store = SqliteExperienceStore::in_memory().unwrap();
        assert_eq!(store.get("nobody").unwrap(), None);
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let store = SqliteExperienceStore::in_memory().unwrap();
        store.upsert("alice", 10).unwrap();
        store.upsert("alice", 25).unwrap();

        assert_eq!(store.get("alice").unwrap(), Some(25));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_add_experience_accumulates() {
        let store = SqliteExperienceStore::in_memory().unwrap();

        let first = store.add_experience("bob", 1.0).unwrap();
        assert_eq!(first, ExperienceUpdate { previous: 0, current: 1 });

        let second = store.add_experience("bob", 2.5).unwrap();
        assert_eq!(second, ExperienceUpdate { previous: 1, current: 3 });

        assert_eq!(store.get("bob").unwrap(), Some(3));
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let store = SqliteExperienceStore::in_memory().unwrap();
        store.upsert("carol", 5).unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.get("carol").unwrap(), Some(5));
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.db");

        {
            let store = SqliteExperienceStore::new(&path).unwrap();
            store.upsert("dave", 42).unwrap();
        }

        let store = SqliteExperienceStore::new(&path).unwrap();
        assert_eq!(store.get("dave").unwrap(), Some(42));
    }

    #[test]
    fn test_legacy_table_with_duplicates_and_reals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"CREATE TABLE UserLevels (User, "Experience");
                   INSERT INTO UserLevels VALUES ('eve', 10.75);
                   INSERT INTO UserLevels VALUES ('eve', 99);"#,
            )
            .unwrap();
        }

        let store = SqliteExperienceStore::new(&path).unwrap();
        assert_eq!(store.get("eve").unwrap(), Some(10));

        store.upsert("eve", 12).unwrap();
        let rows = store.list().unwrap();
        assert!(rows.iter().all(|r| r.user == "eve" && r.experience == 12));
    }

    #[test]
    fn test_list_orders_by_experience() {
        let store = SqliteExperienceStore::in_memory().unwrap();
        store.upsert("low", 1).unwrap();
        store.upsert("high", 100).unwrap();
        store.upsert("mid", 50).unwrap();

        let users: Vec<String> = store.list().unwrap().into_iter().map(|r| r.user).collect();
        assert_eq!(users, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_concurrent_adds_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteExperienceStore::new(dir.path().join("levels.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.add_experience("frank", 1.0).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("frank").unwrap(), Some(200));
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
