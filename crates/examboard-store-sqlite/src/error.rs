//! Error type for `examboard-store-sqlite`.

use examboard_core::store::{Classify, Failure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] examboard_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown identity kind: {0:?}")]
  UnknownKind(String),

  /// A column required by the row's variant was NULL.
  #[error("missing column {0} in stored row")]
  MissingColumn(&'static str),

  /// The addressed row, or a row it references, does not exist.
  #[error("not found")]
  NotFound,

  #[error("{0} already registered")]
  Conflict(&'static str),

  #[error("still referenced by {0}")]
  InUse(&'static str),

  #[error("page out of range")]
  PageOutOfRange,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn classify(&self) -> Failure<'_> {
    match self {
      Error::NotFound => Failure::NotFound,
      Error::Conflict(field) => Failure::Conflict(field),
      Error::InUse(by) => Failure::InUse(by),
      Error::PageOutOfRange => Failure::Rejected("page out of range"),
      Error::Sqlite(e) => classify_sqlite(e),
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => classify_sqlite(e),
      _ => Failure::Internal,
    }
  }
}

/// Constraint failures the explicit checks did not catch.
fn classify_sqlite(e: &rusqlite::Error) -> Failure<'_> {
  match e {
    rusqlite::Error::QueryReturnedNoRows => Failure::NotFound,
    rusqlite::Error::SqliteFailure(f, msg) if f.code == rusqlite::ErrorCode::ConstraintViolation => {
      let msg = msg.as_deref().unwrap_or_default();
      if let Some(columns) = msg.strip_prefix("UNIQUE constraint failed: ") {
        // "identities.username" -> "username"
        let first = columns.split(", ").next().unwrap_or(columns);
        Failure::Conflict(first.rsplit('.').next().unwrap_or(first))
      } else if msg.starts_with("FOREIGN KEY") {
        Failure::NotFound
      } else {
        Failure::Internal
      }
    }
    _ => Failure::Internal,
  }
}
