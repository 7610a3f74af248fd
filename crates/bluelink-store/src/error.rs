//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<DbError> for bluelink_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => bluelink_core::Error::NotFound(msg),
            DbError::Conflict(msg) => bluelink_core::Error::Conflict(msg),
            DbError::Database(e) => bluelink_core::Error::Internal(e.to_string()),
            DbError::Migration(e) => bluelink_core::Error::Internal(e.to_string()),
        }
    }
}
