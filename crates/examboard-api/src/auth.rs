//! Handlers for login, registration, logout and the session probe.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sign-in` | `{identifier, secret}`; sets the session cookie |
//! | `POST` | `/sign-up` | Leader self-registration |
//! | `POST` | `/sign-out` | Clears the session cookie |
//! | `GET`  | `/api/session` | `{authenticated, session}` |
//! | `GET`  | `/` | 303 to the caller's dashboard |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Redirect},
};
use axum_extra::extract::CookieJar;
use examboard_core::{
  auth::AuthContext,
  identity::{IdentityKey, LeaderRegistration},
  store::{Classify, Failure, SchoolStore},
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
  AppState,
  credentials::{self, AuthError},
  error::ApiError,
  guard::{MaybeSession, Page},
  rate_limit::Attempt,
  session,
};

// ─── Sign in ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignInBody {
  #[serde(alias = "nic", alias = "NIC")]
  pub identifier: String,
  #[serde(alias = "password")]
  pub secret:     String,
}

/// `POST /sign-in`
pub async fn sign_in<S>(
  State(state): State<AppState<S>>,
  jar: CookieJar,
  Json(body): Json<SignInBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let key = IdentityKey::normalize(&body.identifier);
  if let Attempt::Exceeded { retry_after } = state.limiter.check_and_increment(key.as_str()) {
    tracing::warn!(%key, "login rate limit exceeded");
    let retry_after_secs = u64::try_from(retry_after.num_seconds()).unwrap_or(0).max(1);
    return Err(ApiError::TooManyAttempts { retry_after_secs });
  }

  let identity = match credentials::verify(&*state.store, key.as_str(), &body.secret).await {
    Ok(identity) => identity,
    Err(AuthError::NotFound | AuthError::InvalidSecret) => {
      tracing::info!(%key, "login failed");
      return Err(ApiError::InvalidCredentials);
    }
    Err(AuthError::Store(e)) => return Err(ApiError::store(e)),
  };
  state.limiter.reset(key.as_str());

  let ctx = AuthContext::for_identity(&identity);
  let token = state.sessions.issue(&ctx)?;
  tracing::info!(key = %ctx.key, role = %ctx.role, "signed in");

  let body = json!({
    "token":    token,
    "role":     ctx.role,
    "redirect": ctx.role.dashboard(),
  });
  Ok((jar.add(session::session_cookie(token)), Json(body)))
}

// ─── Sign up ──────────────────────────────────────────────────────────────────

/// `POST /sign-up`
pub async fn sign_up<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LeaderRegistration>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  body.validate()?;
  let hash = credentials::hash_secret(&body.password)?;
  let draft = body.into_draft(hash);

  let leader = state.store.create_leader(draft).await.map_err(|e| {
    let message = match e.classify() {
      Failure::Conflict("identity key") => Some("NIC already registered"),
      Failure::Conflict("username") => Some("Username already taken"),
      Failure::Conflict("email") => Some("Email already registered"),
      _ => None,
    };
    match message {
      Some(m) => ApiError::Conflict(m.to_string()),
      None => ApiError::store(e),
    }
  })?;

  tracing::info!(key = %leader.key, "leader registered");
  Ok((StatusCode::CREATED, Json(leader)))
}

// ─── Sign out ─────────────────────────────────────────────────────────────────

/// `POST /sign-out`
pub async fn sign_out(jar: CookieJar) -> impl IntoResponse {
  (jar.add(session::expired_cookie()), Json(json!({ "redirect": "/sign-in" })))
}

// ─── Session probe ────────────────────────────────────────────────────────────

/// `GET /api/session`
pub async fn session_info<S>(MaybeSession(ctx): MaybeSession) -> impl IntoResponse
where
  S: SchoolStore + Clone + 'static,
{
  Json(json!({ "authenticated": ctx.is_some(), "session": ctx }))
}

/// `GET /`
pub async fn home<S>(Page(ctx): Page) -> Redirect
where
  S: SchoolStore + Clone + 'static,
{
  Redirect::to(ctx.role.dashboard())
}
