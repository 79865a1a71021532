use rolodex_types::models::User;
use rusqlite::Connection;

use crate::models::{NewUser, USER_COLUMNS, user_from_row};
use crate::{Database, OptionalExt, StoreError};

impl Database {
    pub fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, username, password_hash, avatar) VALUES (?1, ?2, ?3, ?4)",
                (&user.email, &user.username, &user.password_hash, &user.avatar),
            )?;
            query_user_by_email(conn, &user.email)?
                .ok_or_else(|| StoreError::Database(anyhow::anyhow!("inserted user vanished")))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    /// Returns false when no such user exists.
    pub fn set_user_confirmed(&self, email: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET confirmed = 1 WHERE email = ?1", [email])?;
            Ok(changed > 0)
        })
    }

    pub fn set_user_avatar(&self, email: &str, avatar: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET avatar = ?2 WHERE email = ?1",
                (email, avatar),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user_by_email(conn, email)
        })
    }

    /// Returns false when no such user exists.
    pub fn set_user_refresh_token(
        &self,
        email: &str,
        token: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refresh_token = ?2 WHERE email = ?1",
                (email, token),
            )?;
            Ok(changed > 0)
        })
    }

    /// Removes exactly the user with this email; their contacts cascade.
    pub fn delete_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            let Some(user) = query_user_by_email(conn, email)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM users WHERE id = ?1", [user.id])?;
            Ok(Some(user))
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([email], user_from_row).optional()
}
