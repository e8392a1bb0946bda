//! Error types for `examboard-core`.

use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(#[from] ValidationErrors),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },
}

impl Error {
  /// A single-field validation failure.
  pub fn field(field: &'static str, error: ValidationError) -> Self {
    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    Self::Validation(errors)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
