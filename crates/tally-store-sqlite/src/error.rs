//! Error type for `tally-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain failure detected by the store (missing job, foreign entry,
  /// delivery bound, ...).
  #[error(transparent)]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its enum's vocabulary.
  #[error("cannot decode column value: {0}")]
  Decode(String),
}

impl From<Error> for tally_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(inner) => inner,
      other => tally_core::Error::backing(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
