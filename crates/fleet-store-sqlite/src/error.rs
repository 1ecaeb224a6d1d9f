//! Error type for `fleet-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  /// A stored row contradicts itself.
  #[error("corrupt row: {0}")]
  Corrupt(String),
}

impl From<Error> for fleet_core::Error {
  fn from(err: Error) -> Self { fleet_core::Error::store(err) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
