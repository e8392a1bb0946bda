//! HTTP layer for examboard.
//!
//! Exposes an axum [`Router`] backed by any [`SchoolStore`]: login and
//! sessions, role dashboards, scoped listings and authorized mutations.

pub mod auth;
pub mod credentials;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod lists;
pub mod mutations;
pub mod rate_limit;
pub mod session;

pub use error::{ApiError, ConfigError};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use examboard_core::store::SchoolStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use rate_limit::LoginLimiter;
use session::SessionKeys;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `EXAMBOARD_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  /// HMAC secret for session tokens.
  pub session_secret:       String,
  #[serde(default = "default_session_ttl")]
  pub session_ttl_minutes:  i64,
  /// Failed logins allowed per identifier and window; `0` disables.
  #[serde(default = "default_login_max_attempts")]
  pub login_max_attempts:   u32,
  #[serde(default = "default_login_window")]
  pub login_window_seconds: u64,
}

/// Shortest accepted `session_secret`.
pub const MIN_SESSION_SECRET_LEN: usize = 16;
/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_MINUTES: i64 = 525_600;

impl ServerConfig {
  /// Reject settings that would leave sessions forgeable or unrepresentable.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.session_secret.trim().chars().count() < MIN_SESSION_SECRET_LEN {
      return Err(ConfigError::WeakSessionSecret);
    }
    if !(1..=MAX_SESSION_TTL_MINUTES).contains(&self.session_ttl_minutes) {
      return Err(ConfigError::SessionTtl(self.session_ttl_minutes));
    }
    Ok(())
  }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("examboard.db") }
fn default_session_ttl() -> i64 { 1440 }
fn default_login_max_attempts() -> u32 { 5 }
fn default_login_window() -> u64 { 300 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: SchoolStore> {
  pub store:    Arc<S>,
  pub config:   Arc<ServerConfig>,
  pub sessions: Arc<SessionKeys>,
  pub limiter:  Arc<LoginLimiter>,
}

impl<S: SchoolStore> AppState<S> {
  pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
    let sessions = SessionKeys::new(&config.session_secret, config.session_ttl_minutes);
    let limiter = LoginLimiter::new(config.login_max_attempts, config.login_window_seconds);
    Self {
      store,
      config: Arc::new(config),
      sessions: Arc::new(sessions),
      limiter: Arc::new(limiter),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SchoolStore + Clone + 'static,
{
  Router::new()
    // Sessions
    .route("/sign-in",     post(auth::sign_in::<S>))
    .route("/sign-up",     post(auth::sign_up::<S>))
    .route("/sign-out",    post(auth::sign_out))
    .route("/api/session", get(auth::session_info::<S>))
    // Pages
    .route("/",       get(auth::home::<S>))
    .route("/admin",  get(dashboard::admin::<S>))
    .route("/Suser",  get(dashboard::leader::<S>))
    .route("/suser",  get(dashboard::leader::<S>))
    .route("/user",   get(dashboard::member::<S>))
    // Listings
    .route("/list/leaders",        get(lists::leaders::<S>))
    .route("/list/leaders/{key}",  get(lists::leader::<S>))
    .route("/list/members",        get(lists::members::<S>))
    .route("/list/members/{key}",  get(lists::member::<S>))
    .route("/list/subjects",       get(lists::subjects::<S>))
    .route("/list/exams",          get(lists::exams::<S>))
    .route("/list/results",        get(lists::results::<S>))
    .route("/list/events",         get(lists::events::<S>))
    .route("/list/announcements",  get(lists::announcements::<S>))
    // Mutations
    .route("/subjects",            post(mutations::create_subject::<S>))
    .route("/subjects/{id}",       put(mutations::update_subject::<S>).delete(mutations::delete_subject::<S>))
    .route("/exams",               post(mutations::create_exam::<S>))
    .route("/exams/{id}",          put(mutations::update_exam::<S>).delete(mutations::delete_exam::<S>))
    .route("/leaders",             post(mutations::create_leader::<S>))
    .route("/leaders/{key}",       put(mutations::update_leader::<S>).delete(mutations::delete_leader::<S>))
    .route("/members",             post(mutations::create_member::<S>))
    .route("/members/{key}",       put(mutations::update_member::<S>).delete(mutations::delete_member::<S>))
    .route("/results",             post(mutations::create_result::<S>))
    .route("/results/{id}",        put(mutations::update_result::<S>).delete(mutations::delete_result::<S>))
    .route("/events",              post(mutations::create_event::<S>))
    .route("/events/{id}",         put(mutations::update_event::<S>).delete(mutations::delete_event::<S>))
    .route("/announcements",       post(mutations::create_announcement::<S>))
    .route("/announcements/{id}",  put(mutations::update_announcement::<S>).delete(mutations::delete_announcement::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
