//! Write-side inputs and row mappers.
//!
//! Reads hand back the shared `rolodex_types::models` records directly; the
//! structs here describe what callers pass in.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rolodex_types::models::{Channel, Contact, ContactChannel, User};
use rusqlite::Row;
use tracing::warn;

pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

/// Mutable fields of a contact. Used for both create and full-replace update.
#[derive(Debug, Clone, Default)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub gender: String,
    pub persuasion: String,
    pub channels: Vec<ChannelValue>,
}

#[derive(Debug, Clone)]
pub struct ChannelValue {
    pub channel_id: i64,
    pub channel_value: String,
}

/// Equality filters for listing contacts. `None` means no constraint.
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub channel_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LinkFields {
    pub contact_id: i64,
    pub channel_id: i64,
    pub channel_value: String,
}

pub(crate) const USER_COLUMNS: &str =
    "id, email, username, password_hash, confirmed, refresh_token, avatar, created_at";

pub(crate) const CONTACT_COLUMNS: &str =
    "c.id, c.first_name, c.last_name, c.birthdate, c.gender, c.persuasion, c.created_by";

pub(crate) const LINK_COLUMNS: &str =
    "cc.id, cc.contact_id, cc.channel_id, ch.name, cc.channel_value";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(7)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        confirmed: row.get(4)?,
        refresh_token: row.get(5)?,
        avatar: row.get(6)?,
        created_at: parse_timestamp(&created_at),
    })
}

/// Maps `CONTACT_COLUMNS`; channels are attached separately.
pub(crate) fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        birthdate: row.get(3)?,
        gender: row.get(4)?,
        persuasion: row.get(5)?,
        created_by: row.get(6)?,
        channels: Vec::new(),
    })
}

pub(crate) fn link_from_row(row: &Row<'_>) -> rusqlite::Result<ContactChannel> {
    Ok(ContactChannel {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        channel_id: row.get(2)?,
        channel_name: row.get(3)?,
        channel_value: row.get(4)?,
    })
}

pub(crate) fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}': {}", raw, e);
            DateTime::default()
        })
}
