mod remote_keys;
mod settings;
mod stories;

use super::models::{RemoteKeyRecord, StoryRecord};
use anyhow::Result;
use rusqlite::Connection;

pub trait StoryRepository {
    /// Inserts or replaces every record by id.
    fn upsert_batch(&self, records: &[StoryRecord]) -> Result<()>;
    fn clear_all(&self) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<StoryRecord>>;
    fn count(&self) -> Result<usize>;
    /// Newest first, ties broken by id.
    fn page(&self, offset: usize, limit: usize) -> Result<Vec<StoryRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<StoryRecord>>;
    fn list_with_location(&self, limit: usize) -> Result<Vec<StoryRecord>>;
}

pub trait RemoteKeyRepository {
    fn upsert_batch(&self, records: &[RemoteKeyRecord]) -> Result<()>;
    fn key_for(&self, story_id: &str) -> Result<Option<RemoteKeyRecord>>;
    fn clear_all(&self) -> Result<()>;
    fn count(&self) -> Result<usize>;
}

pub trait SettingsRepository {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn stories(&self) -> impl StoryRepository + '_ {
        stories::SqliteStoryRepository { conn: self.conn }
    }

    pub fn remote_keys(&self) -> impl RemoteKeyRepository + '_ {
        remote_keys::SqliteRemoteKeyRepository { conn: self.conn }
    }

    pub fn settings(&self) -> impl SettingsRepository + '_ {
        settings::SqliteSettingsRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}
