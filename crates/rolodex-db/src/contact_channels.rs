use rolodex_types::models::ContactChannel;
use rusqlite::Connection;

use crate::channels::query_channel;
use crate::models::{LINK_COLUMNS, LinkFields, link_from_row};
use crate::{Database, OptionalExt, StoreError};

/// Links are owned through their contact: every lookup joins `contacts` and
/// checks `created_by`.
impl Database {
    pub fn list_contact_channels(
        &self,
        owner: i64,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ContactChannel>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}
                 FROM contact_channels cc
                 JOIN channels ch ON ch.id = cc.channel_id
                 JOIN contacts c ON c.id = cc.contact_id
                 WHERE c.created_by = ?1
                 ORDER BY cc.id
                 LIMIT ?2 OFFSET ?3",
                LINK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((owner, limit, skip), link_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_contact_channel(
        &self,
        owner: i64,
        id: i64,
    ) -> Result<Option<ContactChannel>, StoreError> {
        self.with_conn(|conn| query_link(conn, owner, id))
    }

    /// Fails with `Conflict` if the value is already stored anywhere, and
    /// with `NotFound` if the contact (for this owner) or the channel is
    /// missing. The duplicate check comes first.
    pub fn create_contact_channel(
        &self,
        owner: i64,
        fields: &LinkFields,
    ) -> Result<ContactChannel, StoreError> {
        self.with_conn(|conn| {
            if value_taken(conn, &fields.channel_value, None)? {
                return Err(StoreError::Conflict(
                    "Such channel value already exists".to_string(),
                ));
            }
            ensure_targets(conn, owner, fields)?;

            conn.execute(
                "INSERT INTO contact_channels (contact_id, channel_id, channel_value) VALUES (?1, ?2, ?3)",
                (fields.contact_id, fields.channel_id, &fields.channel_value),
            )?;
            query_link(conn, owner, conn.last_insert_rowid())?
                .ok_or_else(|| StoreError::Database(anyhow::anyhow!("inserted link vanished")))
        })
    }

    /// `None` when the link is absent or belongs to another owner's contact.
    pub fn update_contact_channel(
        &self,
        owner: i64,
        id: i64,
        fields: &LinkFields,
    ) -> Result<Option<ContactChannel>, StoreError> {
        self.with_conn(|conn| {
            if query_link(conn, owner, id)?.is_none() {
                return Ok(None);
            }
            if value_taken(conn, &fields.channel_value, Some(id))? {
                return Err(StoreError::Conflict(
                    "Such channel value already exists".to_string(),
                ));
            }
            ensure_targets(conn, owner, fields)?;

            conn.execute(
                "UPDATE contact_channels SET contact_id = ?2, channel_id = ?3, channel_value = ?4 WHERE id = ?1",
                (id, fields.contact_id, fields.channel_id, &fields.channel_value),
            )?;
            query_link(conn, owner, id)
        })
    }

    pub fn delete_contact_channel(
        &self,
        owner: i64,
        id: i64,
    ) -> Result<Option<ContactChannel>, StoreError> {
        self.with_conn(|conn| {
            let Some(link) = query_link(conn, owner, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM contact_channels WHERE id = ?1", [id])?;
            Ok(Some(link))
        })
    }
}

fn query_link(conn: &Connection, owner: i64, id: i64) -> Result<Option<ContactChannel>, StoreError> {
    let sql = format!(
        "SELECT {}
         FROM contact_channels cc
         JOIN channels ch ON ch.id = cc.channel_id
         JOIN contacts c ON c.id = cc.contact_id
         WHERE cc.id = ?1 AND c.created_by = ?2",
        LINK_COLUMNS
    );
    conn.query_row(&sql, (id, owner), link_from_row).optional()
}

/// Whether `value` is stored on any link other than `except`.
fn value_taken(conn: &Connection, value: &str, except: Option<i64>) -> Result<bool, StoreError> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM contact_channels WHERE channel_value = ?1 AND (?2 IS NULL OR id != ?2))",
        (value, except),
        |row| row.get(0),
    )?;
    Ok(taken)
}

fn ensure_targets(conn: &Connection, owner: i64, fields: &LinkFields) -> Result<(), StoreError> {
    let contact_owned: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM contacts WHERE id = ?1 AND created_by = ?2)",
        (fields.contact_id, owner),
        |row| row.get(0),
    )?;
    if !contact_owned || query_channel(conn, fields.channel_id)?.is_none() {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
