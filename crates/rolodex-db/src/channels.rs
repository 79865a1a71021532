use rolodex_types::models::Channel;
use rusqlite::Connection;

use crate::models::channel_from_row;
use crate::{Database, OptionalExt, StoreError};

impl Database {
    pub fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM channels ORDER BY id")?;
            let rows = stmt
                .query_map([], channel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_channel(&self, id: i64) -> Result<Option<Channel>, StoreError> {
        self.with_conn(|conn| query_channel(conn, id))
    }

    pub fn get_channel_by_name(&self, name: &str) -> Result<Option<Channel>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name FROM channels WHERE name = ?1",
                [name],
                channel_from_row,
            )
            .optional()
        })
    }

    /// Fails with `Conflict` if the name is taken.
    pub fn create_channel(&self, name: &str) -> Result<Channel, StoreError> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO channels (name) VALUES (?1)", [name])?;
            Ok(Channel {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
            })
        })
    }

    pub fn update_channel(&self, id: i64, name: &str) -> Result<Option<Channel>, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE channels SET name = ?2 WHERE id = ?1", (id, name))?;
            if changed == 0 {
                return Ok(None);
            }
            query_channel(conn, id)
        })
    }

    /// Deleting a channel also removes every contact value filed under it.
    pub fn delete_channel(&self, id: i64) -> Result<Option<Channel>, StoreError> {
        self.with_conn(|conn| {
            let Some(channel) = query_channel(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM channels WHERE id = ?1", [id])?;
            Ok(Some(channel))
        })
    }
}

pub(crate) fn query_channel(conn: &Connection, id: i64) -> Result<Option<Channel>, StoreError> {
    conn.query_row("SELECT id, name FROM channels WHERE id = ?1", [id], channel_from_row)
        .optional()
}
