use thiserror::Error;

use crate::ids::RecordId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("unknown data type: {0}")]
    UnknownDataType(String),
    #[error("no user is logged in")]
    NotLoggedIn,
    #[error("user {0} is already logged in")]
    AlreadyLoggedIn(RecordId),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("unknown record: {0}")]
    UnknownRecord(RecordId),
    #[error("ordinal collision: {0}")]
    OrdinalCollision(String),
    #[error("unsupported retrieval filter: {0}")]
    UnsupportedFilter(String),
    #[error("unknown query runner: {0}")]
    UnknownQuery(u64),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid archive: {0}")]
    InvalidArchive(String),
    #[cfg(feature = "serde")]
    #[error("archive encoding: {0}")]
    Json(#[from] serde_json::Error),
}
