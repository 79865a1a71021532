use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                email           TEXT NOT NULL UNIQUE,
                username        TEXT NOT NULL,
                password_hash   TEXT NOT NULL,
                confirmed       INTEGER NOT NULL DEFAULT 0,
                refresh_token   TEXT,
                avatar          TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE contacts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                birthdate   TEXT,
                gender      TEXT NOT NULL DEFAULT '',
                persuasion  TEXT NOT NULL DEFAULT '',
                created_by  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_contacts_owner ON contacts(created_by);

            CREATE TABLE channels (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            -- channel_value is unique across the whole table, not per channel
            CREATE TABLE contact_channels (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                contact_id      INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
                channel_id      INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
                channel_value   TEXT NOT NULL UNIQUE
            );

            CREATE INDEX idx_contact_channels_contact ON contact_channels(contact_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
