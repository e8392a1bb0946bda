//! Scoped listings under `/list/*`.
//!
//! Every handler builds the caller's row predicate with
//! [`build_filter`] and hands it to the store together with the query's
//! search, filters and page. The route policy has already admitted the caller
//! by the time a handler runs.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use examboard_core::{
  exam::Exam,
  identity::{Identity, IdentityKey, Leader, Member},
  notice::{Announcement, Event},
  result::ExamResult,
  scope::{ListQuery, Listing, Page as Listed, Predicate, build_filter},
  store::SchoolStore,
  subject::Subject,
};

use crate::{AppState, error::ApiError, guard::Page};

/// `GET /list/leaders`
pub async fn leaders<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Query(query): Query<ListQuery>,
) -> Result<Json<Listed<Leader>>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let scope = build_filter(&ctx, Listing::Leaders);
  let page = state.store.list_leaders(scope, query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /list/members`
pub async fn members<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Query(query): Query<ListQuery>,
) -> Result<Json<Listed<Member>>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let scope = build_filter(&ctx, Listing::Members);
  let page = state.store.list_members(scope, query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /list/subjects`
pub async fn subjects<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Query(query): Query<ListQuery>,
) -> Result<Json<Listed<Subject>>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let scope = build_filter(&ctx, Listing::Subjects);
  let page = state.store.list_subjects(scope, query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /list/exams`
pub async fn exams<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Query(query): Query<ListQuery>,
) -> Result<Json<Listed<Exam>>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let scope = build_filter(&ctx, Listing::Exams);
  let page = state.store.list_exams(scope, query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /list/results`
pub async fn results<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Query(query): Query<ListQuery>,
) -> Result<Json<Listed<ExamResult>>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let scope = build_filter(&ctx, Listing::Results);
  let page = state.store.list_results(scope, query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /list/events`
pub async fn events<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Query(query): Query<ListQuery>,
) -> Result<Json<Listed<Event>>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let scope = build_filter(&ctx, Listing::Events);
  let page = state.store.list_events(scope, query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /list/announcements`
pub async fn announcements<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Query(query): Query<ListQuery>,
) -> Result<Json<Listed<Announcement>>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  let scope = build_filter(&ctx, Listing::Announcements);
  let page = state.store.list_announcements(scope, query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Detail ───────────────────────────────────────────────────────────────────

/// `GET /list/leaders/{key}`
pub async fn leader<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Path(key): Path<String>,
) -> Result<Json<Leader>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  if build_filter(&ctx, Listing::Leaders) == Predicate::Nothing {
    return Err(ApiError::Unauthorized);
  }
  match state.store.get_identity(IdentityKey::normalize(&key)).await.map_err(ApiError::store)? {
    Some(Identity::Leader(leader)) => Ok(Json(leader)),
    _ => Err(ApiError::NotFound),
  }
}

/// `GET /list/members/{key}`
pub async fn member<S>(
  State(state): State<AppState<S>>,
  Page(ctx): Page,
  Path(key): Path<String>,
) -> Result<Json<Member>, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  if build_filter(&ctx, Listing::Members) == Predicate::Nothing {
    return Err(ApiError::Unauthorized);
  }
  match state.store.get_identity(IdentityKey::normalize(&key)).await.map_err(ApiError::store)? {
    Some(Identity::Member(member)) => Ok(Json(member)),
    _ => Err(ApiError::NotFound),
  }
}
