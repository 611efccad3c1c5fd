use crate::database::models::StoryRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteStoryRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_story(row: &Row<'_>) -> rusqlite::Result<StoryRecord> {
    Ok(StoryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        photo_url: row.get(3)?,
        created_at: row.get(4)?,
        lat: row.get(5)?,
        lon: row.get(6)?,
    })
}

impl<'conn> SqliteStoryRepository<'conn> {
    fn query_list(&self, sql: &str, limit: usize, offset: usize) -> Result<Vec<StoryRecord>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], map_story)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl<'conn> super::StoryRepository for SqliteStoryRepository<'conn> {
    fn upsert_batch(&self, records: &[StoryRecord]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO stories (id, name, description, photo_url, created_at, lat, lon)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                photo_url = excluded.photo_url,
                created_at = excluded.created_at,
                lat = excluded.lat,
                lon = excluded.lon
            "#,
        )?;
        for record in records {
            stmt.execute(params![
                record.id,
                record.name,
                record.description,
                record.photo_url,
                record.created_at,
                record.lat,
                record.lon
            ])?;
        }
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM stories", [])?;
        tracing::debug!(removed, "cleared cached stories");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<StoryRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, name, description, photo_url, created_at, lat, lon
                FROM stories
                WHERE id = ?1
                "#,
                params![id],
                map_story,
            )
            .optional()?;
        Ok(row)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn page(&self, offset: usize, limit: usize) -> Result<Vec<StoryRecord>> {
        self.query_list(
            r#"
            SELECT id, name, description, photo_url, created_at, lat, lon
            FROM stories
            ORDER BY created_at DESC, id ASC
            LIMIT ?1 OFFSET ?2
            "#,
            limit,
            offset,
        )
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<StoryRecord>> {
        self.page(0, limit)
    }

    fn list_with_location(&self, limit: usize) -> Result<Vec<StoryRecord>> {
        self.query_list(
            r#"
            SELECT id, name, description, photo_url, created_at, lat, lon
            FROM stories
            WHERE lat IS NOT NULL AND lon IS NOT NULL
            ORDER BY created_at DESC, id ASC
            LIMIT ?1 OFFSET ?2
            "#,
            limit,
            0,
        )
    }
}
