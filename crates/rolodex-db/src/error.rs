use rusqlite::ffi;
use thiserror::Error;

/// Outcomes the store reports to its callers.
///
/// `NotFound` covers both "absent" and "owned by someone else"; callers cannot
/// tell the two apart.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, msg) = &err {
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::Conflict(
                        msg.clone()
                            .unwrap_or_else(|| "unique constraint violated".to_string()),
                    );
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::NotFound,
                _ => {}
            }
        }
        Self::Database(err.into())
    }
}
