//! Signed session tokens.
//!
//! A session is an HS256 JWT whose claims carry the identity key, the role and
//! the display fields shown in the UI. The role is trusted only because the
//! token is signed; nothing else in a request can change it.

use axum::http::{HeaderMap, header};
use axum_extra::extract::{
  CookieJar,
  cookie::{Cookie, SameSite},
};
use chrono::{DateTime, Duration, Utc};
use examboard_core::{
  auth::{AuthContext, DisplayInfo},
  identity::{IdentityKey, Role},
};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MAX_SESSION_TTL_MINUTES;

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  /// Identity key.
  pub sub:        String,
  pub role:       Role,
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub school:     Option<String>,
  pub iat:        i64,
  pub exp:        i64,
  pub jti:        String,
}

impl Claims {
  pub fn new(ctx: &AuthContext, now: DateTime<Utc>, ttl: Duration) -> Self {
    Self {
      sub:        ctx.key.as_str().to_owned(),
      role:       ctx.role,
      first_name: ctx.display.first_name.clone(),
      last_name:  ctx.display.last_name.clone(),
      email:      ctx.display.email.clone(),
      phone:      ctx.display.phone.clone(),
      school:     ctx.display.school.clone(),
      iat:        now.timestamp(),
      exp:        (now + ttl).timestamp(),
      jti:        uuid::Uuid::new_v4().to_string(),
    }
  }

  pub fn into_context(self) -> AuthContext {
    AuthContext {
      key:     IdentityKey::normalize(&self.sub),
      role:    self.role,
      display: DisplayInfo {
        first_name: self.first_name,
        last_name:  self.last_name,
        email:      self.email,
        phone:      self.phone,
        school:     self.school,
      },
    }
  }
}

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("failed to encode token: {0}")]
  Encode(#[from] jsonwebtoken::errors::Error),

  #[error("session expired")]
  Expired,

  #[error("invalid session token")]
  Invalid,
}

/// Signing keys and lifetime for session tokens.
pub struct SessionKeys {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl:      Duration,
}

impl SessionKeys {
  /// `ttl_minutes` is clamped to `1..=MAX_SESSION_TTL_MINUTES`.
  pub fn new(secret: &str, ttl_minutes: i64) -> Self {
    let ttl = Duration::try_minutes(ttl_minutes.clamp(1, MAX_SESSION_TTL_MINUTES))
      .unwrap_or(Duration::zero());
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl,
    }
  }

  /// Mint a token for `ctx` valid from now.
  pub fn issue(&self, ctx: &AuthContext) -> Result<String, SessionError> {
    self.issue_at(ctx, Utc::now())
  }

  pub fn issue_at(&self, ctx: &AuthContext, now: DateTime<Utc>) -> Result<String, SessionError> {
    let claims = Claims::new(ctx, now, self.ttl);
    Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
  }

  /// Verify signature and expiry and rebuild the caller's context.
  pub fn resolve(&self, token: &str) -> Result<AuthContext, SessionError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
      ErrorKind::ExpiredSignature => SessionError::Expired,
      _ => SessionError::Invalid,
    })?;
    Ok(data.claims.into_context())
  }
}

/// The raw token from `Authorization: Bearer` or, failing that, the session
/// cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
  let bearer = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty());
  if let Some(token) = bearer {
    return Some(token.to_owned());
  }

  CookieJar::from_headers(headers).get(SESSION_COOKIE).map(|c| c.value().to_owned())
}

pub fn session_cookie(token: String) -> Cookie<'static> {
  Cookie::build((SESSION_COOKIE, token))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .build()
}

/// An already-expired session cookie; adding it to a jar clears the session
/// in the browser.
pub fn expired_cookie() -> Cookie<'static> {
  let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
  cookie.make_removal();
  cookie
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn leader() -> AuthContext {
    AuthContext {
      key:     IdentityKey::normalize("T100"),
      role:    Role::Leader,
      display: DisplayInfo {
        first_name: "Tara".into(),
        last_name:  "Perera".into(),
        email:      Some("tara@example.com".into()),
        phone:      Some("0771234567".into()),
        school:     Some("Royal College".into()),
      },
    }
  }

  #[test]
  fn round_trip_preserves_context() {
    let keys = SessionKeys::new("secret", 60);
    let token = keys.issue(&leader()).unwrap();
    assert_eq!(keys.resolve(&token).unwrap(), leader());
  }

  #[test]
  fn token_signed_with_another_secret_is_rejected() {
    let token = SessionKeys::new("one", 60).issue(&leader()).unwrap();
    let err = SessionKeys::new("two", 60).resolve(&token).unwrap_err();
    assert!(matches!(err, SessionError::Invalid));
  }

  #[test]
  fn tampered_payload_is_rejected() {
    let keys = SessionKeys::new("secret", 60);
    let token = keys.issue(&leader()).unwrap();
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    // Swap in the payload of an admin token signed elsewhere.
    let forged = SessionKeys::new("other", 60)
      .issue(&AuthContext { role: Role::Admin, ..leader() })
      .unwrap();
    parts[1] = forged.split('.').nth(1).unwrap().to_owned();
    let err = keys.resolve(&parts.join(".")).unwrap_err();
    assert!(matches!(err, SessionError::Invalid));
  }

  #[test]
  fn expired_token_is_rejected() {
    let keys = SessionKeys::new("secret", 60);
    let token = keys.issue_at(&leader(), Utc::now() - Duration::hours(3)).unwrap();
    assert!(matches!(keys.resolve(&token).unwrap_err(), SessionError::Expired));
  }

  #[test]
  fn out_of_range_lifetimes_are_clamped() {
    let token = SessionKeys::new("secret", i64::MAX).issue(&leader()).unwrap();
    assert_eq!(SessionKeys::new("secret", 60).resolve(&token).unwrap(), leader());

    let keys = SessionKeys::new("secret", -5);
    let token = keys.issue_at(&leader(), Utc::now() - Duration::minutes(10)).unwrap();
    assert!(matches!(keys.resolve(&token).unwrap_err(), SessionError::Expired));
  }

  #[test]
  fn garbage_is_rejected() {
    let keys = SessionKeys::new("secret", 60);
    assert!(matches!(keys.resolve("not-a-token").unwrap_err(), SessionError::Invalid));
  }

  #[test]
  fn bearer_header_wins_over_cookie() {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("session=from-cookie"));
    assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
    assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));
  }

  #[test]
  fn no_token_without_header_or_cookie() {
    assert_eq!(token_from_headers(&HeaderMap::new()), None);
  }
}
