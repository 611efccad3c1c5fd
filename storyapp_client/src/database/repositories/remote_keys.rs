use crate::database::models::RemoteKeyRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteRemoteKeyRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::RemoteKeyRepository for SqliteRemoteKeyRepository<'conn> {
    fn upsert_batch(&self, records: &[RemoteKeyRecord]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO remote_keys (story_id, prev_key, next_key)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(story_id) DO UPDATE SET
                prev_key = excluded.prev_key,
                next_key = excluded.next_key
            "#,
        )?;
        for record in records {
            stmt.execute(params![record.story_id, record.prev_key, record.next_key])?;
        }
        Ok(())
    }

    fn key_for(&self, story_id: &str) -> Result<Option<RemoteKeyRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT story_id, prev_key, next_key FROM remote_keys WHERE story_id = ?1",
                params![story_id],
                |row| {
                    Ok(RemoteKeyRecord {
                        story_id: row.get(0)?,
                        prev_key: row.get(1)?,
                        next_key: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM remote_keys", [])?;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM remote_keys", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
