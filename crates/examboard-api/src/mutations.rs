//! Create, update and delete handlers.
//!
//! | Method | Path | Roles |
//! |--------|------|-------|
//! | `POST`, `PUT` | `/subjects`, `/exams`, `/results`, `/events`, `/announcements` | admin, leader |
//! | `POST`, `PUT` | `/leaders`, `/members` | admin |
//! | `DELETE` | any of the above `/{id}` | admin |
//!
//! The mutation table is consulted before the body is validated and before
//! any store call; a denial is final.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use examboard_core::{
  auth::AuthContext,
  exam::ExamInput,
  identity::{IdentityKey, IdentityKind, LeaderInput, LeaderUpdate, MemberInput, MemberUpdate},
  mutation::{self, Action, Decision, Entity},
  notice::{AnnouncementInput, EventInput},
  result::ResultInput,
  store::SchoolStore,
  subject::SubjectInput,
};
use validator::Validate;

use crate::{AppState, credentials, error::ApiError, guard::Session};

fn permit(ctx: &AuthContext, action: Action, entity: Entity) -> Result<(), ApiError> {
  match mutation::authorize(ctx, action, entity) {
    Decision::Allowed => Ok(()),
    Decision::Denied(reason) => {
      tracing::warn!(key = %ctx.key, %reason, "mutation denied");
      Err(ApiError::Unauthorized)
    }
  }
}

// ─── Subjects ─────────────────────────────────────────────────────────────────

/// `POST /subjects`
pub async fn create_subject<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Json(input): Json<SubjectInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Create, Entity::Subject)?;
  input.validate()?;
  let subject = state.store.create_subject(input).await.map_err(ApiError::store)?;
  tracing::info!(id = subject.id, by = %ctx.key, "subject created");
  Ok((StatusCode::CREATED, Json(subject)))
}

/// `PUT /subjects/{id}`
pub async fn update_subject<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
  Json(input): Json<SubjectInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Update, Entity::Subject)?;
  input.validate()?;
  let subject = state.store.update_subject(id, input).await.map_err(ApiError::store)?;
  Ok(Json(subject))
}

/// `DELETE /subjects/{id}`
pub async fn delete_subject<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Delete, Entity::Subject)?;
  state.store.delete_subject(id).await.map_err(ApiError::store)?;
  tracing::info!(id, by = %ctx.key, "subject deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Exams ────────────────────────────────────────────────────────────────────

/// `POST /exams`
pub async fn create_exam<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Json(input): Json<ExamInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Create, Entity::Exam)?;
  input.validate()?;
  let exam = input.resolve(&ctx)?;
  let exam = state.store.create_exam(exam).await.map_err(ApiError::store)?;
  tracing::info!(id = exam.id, by = %ctx.key, "exam created");
  Ok((StatusCode::CREATED, Json(exam)))
}

/// `PUT /exams/{id}`
pub async fn update_exam<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
  Json(input): Json<ExamInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Update, Entity::Exam)?;
  input.validate()?;
  let exam = input.resolve(&ctx)?;
  let exam = state.store.update_exam(id, exam).await.map_err(ApiError::store)?;
  Ok(Json(exam))
}

/// `DELETE /exams/{id}`
pub async fn delete_exam<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Delete, Entity::Exam)?;
  state.store.delete_exam(id).await.map_err(ApiError::store)?;
  tracing::info!(id, by = %ctx.key, "exam deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Leaders ──────────────────────────────────────────────────────────────────

/// `POST /leaders`
pub async fn create_leader<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Json(input): Json<LeaderInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Create, Entity::Leader)?;
  input.validate()?;
  let hash = credentials::hash_secret(&input.password)?;
  let leader = state.store.create_leader(input.into_draft(hash)).await.map_err(ApiError::store)?;
  tracing::info!(key = %leader.key, by = %ctx.key, "leader created");
  Ok((StatusCode::CREATED, Json(leader)))
}

/// `PUT /leaders/{key}`
pub async fn update_leader<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(key): Path<String>,
  Json(update): Json<LeaderUpdate>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Update, Entity::Leader)?;
  update.validate()?;
  let leader = state
    .store
    .update_leader(IdentityKey::normalize(&key), update)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(leader))
}

/// `DELETE /leaders/{key}`
pub async fn delete_leader<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(key): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Delete, Entity::Leader)?;
  let key = IdentityKey::normalize(&key);
  state.store.delete_identity(key.clone(), IdentityKind::Leader).await.map_err(ApiError::store)?;
  tracing::info!(%key, by = %ctx.key, "leader deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Members ──────────────────────────────────────────────────────────────────

/// `POST /members`
pub async fn create_member<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Json(input): Json<MemberInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Create, Entity::Member)?;
  input.validate()?;
  let hash = credentials::hash_secret(&input.password)?;
  let member = state.store.create_member(input.into_draft(hash)).await.map_err(ApiError::store)?;
  tracing::info!(key = %member.key, by = %ctx.key, "member created");
  Ok((StatusCode::CREATED, Json(member)))
}

/// `PUT /members/{key}`
pub async fn update_member<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(key): Path<String>,
  Json(update): Json<MemberUpdate>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Update, Entity::Member)?;
  update.validate()?;
  let member = state
    .store
    .update_member(IdentityKey::normalize(&key), update)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(member))
}

/// `DELETE /members/{key}`
pub async fn delete_member<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(key): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Delete, Entity::Member)?;
  let key = IdentityKey::normalize(&key);
  state.store.delete_identity(key.clone(), IdentityKind::Member).await.map_err(ApiError::store)?;
  tracing::info!(%key, by = %ctx.key, "member deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Results ──────────────────────────────────────────────────────────────────

/// `POST /results`
pub async fn create_result<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Json(input): Json<ResultInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Create, Entity::Result)?;
  let result = state.store.create_result(input.into_new()?).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(result)))
}

/// `PUT /results/{id}`
pub async fn update_result<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
  Json(input): Json<ResultInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Update, Entity::Result)?;
  let result = state.store.update_result(id, input.into_new()?).await.map_err(ApiError::store)?;
  Ok(Json(result))
}

/// `DELETE /results/{id}`
pub async fn delete_result<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Delete, Entity::Result)?;
  state.store.delete_result(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// `POST /events`
pub async fn create_event<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Json(input): Json<EventInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Create, Entity::Event)?;
  input.validate()?;
  let event = state.store.create_event(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(event)))
}

/// `PUT /events/{id}`
pub async fn update_event<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
  Json(input): Json<EventInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Update, Entity::Event)?;
  input.validate()?;
  let event = state.store.update_event(id, input).await.map_err(ApiError::store)?;
  Ok(Json(event))
}

/// `DELETE /events/{id}`
pub async fn delete_event<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Delete, Entity::Event)?;
  state.store.delete_event(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Announcements ────────────────────────────────────────────────────────────

/// `POST /announcements`
pub async fn create_announcement<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Json(input): Json<AnnouncementInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Create, Entity::Announcement)?;
  input.validate()?;
  let announcement = state.store.create_announcement(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(announcement)))
}

/// `PUT /announcements/{id}`
pub async fn update_announcement<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
  Json(input): Json<AnnouncementInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Update, Entity::Announcement)?;
  input.validate()?;
  let announcement =
    state.store.update_announcement(id, input).await.map_err(ApiError::store)?;
  Ok(Json(announcement))
}

/// `DELETE /announcements/{id}`
pub async fn delete_announcement<S>(
  State(state): State<AppState<S>>,
  Session(ctx): Session,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: SchoolStore + Clone + 'static,
{
  permit(&ctx, Action::Delete, Entity::Announcement)?;
  state.store.delete_announcement(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
