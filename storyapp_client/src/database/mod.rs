mod invalidation;
pub mod models;
pub mod repositories;

pub use invalidation::InvalidationTracker;

use crate::config::StoryAppPaths;
use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Bumped whenever the cache layout changes. Older caches are dropped and
/// rebuilt from the network rather than migrated.
pub(crate) const SCHEMA_VERSION: i64 = 5;

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS stories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        photo_url TEXT NOT NULL,
        created_at TEXT NOT NULL,
        lat REAL,
        lon REAL
    );

    CREATE INDEX IF NOT EXISTS idx_stories_created_at ON stories(created_at DESC, id);

    CREATE TABLE IF NOT EXISTS remote_keys (
        story_id TEXT PRIMARY KEY,
        prev_key INTEGER,
        next_key INTEGER,
        FOREIGN KEY (story_id) REFERENCES stories(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

const DROP_CACHE_TABLES: &str = r#"
    DROP TABLE IF EXISTS remote_keys;
    DROP INDEX IF EXISTS idx_stories_created_at;
    DROP TABLE IF EXISTS stories;
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    invalidation: InvalidationTracker,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &StoryAppPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)
            .with_context(|| format!("failed to open {}", paths.db_path.display()))?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            invalidation: InvalidationTracker::new(),
            newly_created,
        }
    }

    /// Brings the schema to [`SCHEMA_VERSION`]. Returns `true` when the
    /// database file did not exist before this handle opened it.
    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
            if version != 0 && version != SCHEMA_VERSION {
                tracing::warn!(
                    found = version,
                    expected = SCHEMA_VERSION,
                    "story cache schema changed; recreating cache tables"
                );
                conn.execute_batch(DROP_CACHE_TABLES)?;
            }
            conn.execute_batch(MIGRATIONS)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    /// Runs `f` inside a single SQLite transaction. Nothing is written unless
    /// `f` succeeds and the commit goes through; observers of
    /// [`Database::invalidation`] are notified after a successful commit.
    pub fn write_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        let value = {
            let mut guard = self
                .conn
                .lock()
                .map_err(|_| anyhow!("database mutex poisoned"))?;
            let tx = guard
                .transaction()
                .context("failed to begin transaction")?;
            let value = f(repositories::SqliteRepositories::new(&tx))?;
            tx.commit().context("failed to commit transaction")?;
            value
        };
        self.invalidation.invalidate();
        Ok(value)
    }

    pub fn invalidation(&self) -> &InvalidationTracker {
        &self.invalidation
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}
