//! Session extractors.
//!
//! Each resolves the caller's [`AuthContext`] from the request once; the
//! handlers then pass it explicitly to the policy functions.
//!
//! | Extractor | No session | Outside role |
//! |-----------|------------|--------------|
//! | [`Page`] | 303 to `/sign-in` | 403 |
//! | [`Session`] | 401 | (handler decides) |
//! | [`MaybeSession`] | `None` | - |

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use examboard_core::{auth::AuthContext, policy, store::SchoolStore};

use crate::{AppState, error::ApiError, session::token_from_headers};

fn resolve<S>(parts: &Parts, state: &AppState<S>) -> Option<AuthContext>
where
  S: SchoolStore + Clone + 'static,
{
  let token = token_from_headers(&parts.headers)?;
  match state.sessions.resolve(&token) {
    Ok(ctx) => Some(ctx),
    Err(e) => {
      tracing::debug!(error = %e, "rejected session token");
      None
    }
  }
}

/// A session admitted by the route policy for the request path.
pub struct Page(pub AuthContext);

impl<S> FromRequestParts<AppState<S>> for Page
where
  S: SchoolStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let ctx = resolve(parts, state).ok_or(ApiError::SignInRequired)?;
    let path = parts.uri.path();
    if !policy::is_allowed(ctx.role, path) {
      tracing::warn!(key = %ctx.key, role = %ctx.role, path, "route denied");
      return Err(ApiError::Unauthorized);
    }
    Ok(Page(ctx))
  }
}

/// Any valid session. Mutation handlers consult the mutation table.
pub struct Session(pub AuthContext);

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: SchoolStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    resolve(parts, state).map(Session).ok_or(ApiError::Unauthenticated)
  }
}

pub struct MaybeSession(pub Option<AuthContext>);

impl<S> FromRequestParts<AppState<S>> for MaybeSession
where
  S: SchoolStore + Clone + 'static,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(MaybeSession(resolve(parts, state)))
  }
}
