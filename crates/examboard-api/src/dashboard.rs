//! Role dashboards: `/admin`, `/Suser` and `/user`.

use axum::{Json, extract::State};
use examboard_core::{
  auth::AuthContext,
  exam::Exam,
  notice::{Announcement, Event},
  scope::{ListQuery, Listing, Page as Listed, build_filter},
  store::{SchoolStore, StreamCount},
};
use serde::Serialize;

use crate::{AppState, error::ApiError, guard::Page};

/// How many announcements a dashboard shows.
const RECENT_ANNOUNCEMENTS: usize = 3;

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
  pub session:       AuthContext,
  pub streams:       Vec<StreamCount>,
  pub announcements: Vec<Announcement>,
}

/// A leader's or member's own schedule and notices.
#[derive(Debug, Serialize)]
pub struct PersonalDashboard {
  pub session:       AuthContext,
  pub exams:         Listed<Exam>,
  pub events:        Listed<Event>,
  pub announcements: Vec<Announcement>,
}

fn recent() -> ListQuery {
  ListQuery { per_page: Some(RECENT_ANNOUNCEMENTS), ..ListQuery::default() }
}

/// `GET /admin`
pub async fn admin<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
) -> Result<Json<AdminDashboard>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let streams = state.store.stream_counts().await.map_err(ApiError::store)?;
  let announcements = state
    .store
    .list_announcements(build_filter(&ctx, Listing::Announcements), recent())
    .await
    .map_err(ApiError::store)?
    .data;
  Ok(Json(AdminDashboard { session: ctx, streams, announcements }))
}

/// `GET /Suser`
pub async fn leader<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
) -> Result<Json<PersonalDashboard>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  personal(&state, ctx).await.map(Json)
}

/// `GET /user`
pub async fn member<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
) -> Result<Json<PersonalDashboard>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  personal(&state, ctx).await.map(Json)
}

async fn personal<S>(state: &AppState<S>, ctx: AuthContext) -> Result<PersonalDashboard, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let store = &state.store;
  let exams = store
    .list_exams(build_filter(&ctx, Listing::Exams), ListQuery::default())
    .await
    .map_err(ApiError::store)?;
  let events = store
    .list_events(build_filter(&ctx, Listing::Events), ListQuery::default())
    .await
    .map_err(ApiError::store)?;
  let announcements = store
    .list_announcements(build_filter(&ctx, Listing::Announcements), recent())
    .await
    .map_err(ApiError::store)?
    .data;
  Ok(PersonalDashboard { session: ctx, exams, events, announcements })
}
