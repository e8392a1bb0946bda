//! Subjects: named topics, optionally scoped to a stream.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::identity::Stream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub id:     i64,
  pub name:   String,
  /// `None` means the subject is common to all streams.
  pub stream: Option<Stream>,
}

/// Body of `POST /subjects` and `PUT /subjects/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubjectInput {
  #[validate(length(min = 1, max = 100, message = "Name is required"))]
  pub name:   String,
  pub stream: Option<Stream>,
}
