//! API error type and [`axum::response::IntoResponse`] implementation.

use std::collections::BTreeMap;

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Redirect, Response},
};
use examboard_core::store::{Classify, Failure};
use serde_json::json;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::{
  MAX_SESSION_TTL_MINUTES, MIN_SESSION_SECRET_LEN,
  session::SessionError,
};

/// A [`crate::ServerConfig`] that must not be served with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("session_secret must be at least {MIN_SESSION_SECRET_LEN} characters")]
  WeakSessionSecret,

  #[error("session_ttl_minutes must be between 1 and {MAX_SESSION_TTL_MINUTES}, got {0}")]
  SessionTtl(i64),
}

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// No valid session on a page route; answered with a redirect.
  #[error("sign-in required")]
  SignInRequired,

  /// No valid session on a mutation or data route.
  #[error("unauthenticated")]
  Unauthenticated,

  #[error("unauthorized")]
  Unauthorized,

  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("too many attempts, retry in {retry_after_secs}s")]
  TooManyAttempts { retry_after_secs: u64 },

  #[error("not found")]
  NotFound,

  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Carries the full message shown to the caller.
  #[error("{0}")]
  Conflict(String),

  #[error("still referenced by {0}")]
  InUse(String),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// `"<field> already registered"`.
  pub fn conflict(field: &str) -> Self { ApiError::Conflict(format!("{field} already registered")) }

  /// Map a backend failure by its classification. Unclassified failures stay
  /// opaque to the caller.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    let mapped = match e.classify() {
      Failure::NotFound => Some(ApiError::NotFound),
      Failure::Conflict(field) => Some(ApiError::conflict(field)),
      Failure::InUse(by) => Some(ApiError::InUse(by.to_owned())),
      Failure::Rejected(message) => Some(ApiError::BadRequest(message.to_owned())),
      Failure::Internal => None,
    };
    mapped.unwrap_or_else(|| ApiError::Store(Box::new(e)))
  }
}

impl From<SessionError> for ApiError {
  fn from(e: SessionError) -> Self { ApiError::Internal(e.to_string()) }
}

impl From<ValidationErrors> for ApiError {
  fn from(e: ValidationErrors) -> Self { ApiError::Validation(e) }
}

impl From<examboard_core::Error> for ApiError {
  fn from(e: examboard_core::Error) -> Self {
    match e {
      examboard_core::Error::Validation(errors) => ApiError::Validation(errors),
      other => ApiError::BadRequest(other.to_string()),
    }
  }
}

/// Flatten validator output into `field -> [messages]`. Nested structs are
/// flattened on the wire, so their fields are reported unprefixed.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
  let mut out = BTreeMap::new();
  collect(errors, &mut out);
  out
}

fn collect(errors: &ValidationErrors, out: &mut BTreeMap<String, Vec<String>>) {
  for (field, kind) in errors.errors() {
    match kind {
      ValidationErrorsKind::Field(list) => {
        let messages: &mut Vec<String> = out.entry(field.to_string()).or_default();
        for e in list {
          messages.push(
            e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()),
          );
        }
      }
      ValidationErrorsKind::Struct(inner) => collect(inner, out),
      ValidationErrorsKind::List(items) => {
        for inner in items.values() {
          collect(inner, out);
        }
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::SignInRequired => return Redirect::to("/sign-in").into_response(),
      ApiError::Unauthenticated => {
        (StatusCode::UNAUTHORIZED, json!({ "error": "unauthenticated" }))
      }
      ApiError::Unauthorized => (StatusCode::FORBIDDEN, json!({ "error": "unauthorized" })),
      ApiError::InvalidCredentials => {
        (StatusCode::UNAUTHORIZED, json!({ "error": "invalid credentials" }))
      }
      ApiError::TooManyAttempts { retry_after_secs } => {
        return (
          StatusCode::TOO_MANY_REQUESTS,
          [(header::RETRY_AFTER, retry_after_secs.to_string())],
          Json(json!({ "error": "too many attempts" })),
        )
          .into_response();
      }
      ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "not found" })),
      ApiError::Validation(errors) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "error": "validation failed", "fields": field_messages(errors) }),
      ),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::InUse(by) => {
        (StatusCode::CONFLICT, json!({ "error": format!("still referenced by {by}") }))
      }
      ApiError::Internal(_) | ApiError::Store(_) => {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "internal error" }))
      }
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use std::borrow::Cow;

  use validator::ValidationError;

  use super::*;

  #[test]
  fn every_field_is_reported() {
    let mut errors = ValidationErrors::new();
    errors.add(
      "username",
      ValidationError::new("length").with_message(Cow::Borrowed("Username too short")),
    );
    errors.add("email", ValidationError::new("email"));

    let fields = field_messages(&errors);
    assert_eq!(fields["username"], vec!["Username too short".to_string()]);
    assert_eq!(fields["email"], vec!["email".to_string()]);
  }

  #[test]
  fn status_codes() {
    let cases = [
      (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
      (ApiError::Unauthorized, StatusCode::FORBIDDEN),
      (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
      (ApiError::TooManyAttempts { retry_after_secs: 3 }, StatusCode::TOO_MANY_REQUESTS),
      (ApiError::NotFound, StatusCode::NOT_FOUND),
      (ApiError::conflict("email"), StatusCode::CONFLICT),
      (ApiError::InUse("members".into()), StatusCode::CONFLICT),
      (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
      (ApiError::SignInRequired, StatusCode::SEE_OTHER),
    ];
    for (error, status) in cases {
      assert_eq!(error.into_response().status(), status);
    }
  }

  #[test]
  fn too_many_attempts_sets_retry_after() {
    let resp = ApiError::TooManyAttempts { retry_after_secs: 42 }.into_response();
    assert_eq!(resp.headers()[header::RETRY_AFTER], "42");
  }
}
