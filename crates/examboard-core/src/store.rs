//! The `SchoolStore` trait.
//!
//! Implemented by storage backends (e.g. `examboard-store-sqlite`). The HTTP
//! layer depends on this abstraction, never on a concrete backend. Listing
//! methods take an already-built [`Predicate`]; they never see the caller's
//! role.

use std::future::Future;

use serde::Serialize;

use crate::{
  exam::{Exam, NewExam},
  identity::{
    Admin, Credential, Identity, IdentityKey, IdentityKind, Leader, LeaderDraft, LeaderUpdate,
    Member, MemberDraft, MemberUpdate, Stream,
  },
  notice::{Announcement, AnnouncementInput, Event, EventInput},
  result::{ExamResult, NewResult},
  scope::{ListQuery, Page, Predicate},
  subject::{Subject, SubjectInput},
};

// ─── Failure classification ──────────────────────────────────────────────────

/// How a store failure should be reported to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure<'a> {
  /// The addressed row (or a row it references) does not exist.
  NotFound,
  /// A uniqueness rule was violated; names the field.
  Conflict(&'a str),
  /// The row is still referenced by rows of the named kind.
  InUse(&'a str),
  /// The request cannot be served as asked; carries a caller-safe message.
  Rejected(&'a str),
  /// Anything else. Not safe to show to the caller.
  Internal,
}

/// Implemented by backend error types so callers can map failures without
/// knowing the backend.
pub trait Classify {
  fn classify(&self) -> Failure<'_>;
}

/// Identity counts per stream, for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCount {
  pub stream:  Stream,
  pub leaders: u64,
  pub members: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an examboard store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SchoolStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Identities ────────────────────────────────────────────────────────

  /// Persist a leader. Fails with a conflict if the key is taken by any
  /// identity, or the username or email is taken.
  fn create_leader(
    &self,
    draft: LeaderDraft,
  ) -> impl Future<Output = Result<Leader, Self::Error>> + Send + '_;

  /// Persist a member. The referenced leader must exist.
  fn create_member(
    &self,
    draft: MemberDraft,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  fn create_admin(
    &self,
    admin: Admin,
  ) -> impl Future<Output = Result<Admin, Self::Error>> + Send + '_;

  /// Look up a loginable identity (leader or member) with its hash.
  /// Admins are never returned.
  fn find_credential(
    &self,
    key: IdentityKey,
  ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + '_;

  fn get_identity(
    &self,
    key: IdentityKey,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  fn update_leader(
    &self,
    key: IdentityKey,
    update: LeaderUpdate,
  ) -> impl Future<Output = Result<Leader, Self::Error>> + Send + '_;

  fn update_member(
    &self,
    key: IdentityKey,
    update: MemberUpdate,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  /// Delete the identity `key` if it is of `kind`; not-found otherwise.
  fn delete_identity(
    &self,
    key: IdentityKey,
    kind: IdentityKind,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_leaders(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<Leader>, Self::Error>> + Send + '_;

  fn list_members(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<Member>, Self::Error>> + Send + '_;

  fn stream_counts(
    &self,
  ) -> impl Future<Output = Result<Vec<StreamCount>, Self::Error>> + Send + '_;

  // ── Subjects ──────────────────────────────────────────────────────────

  fn create_subject(
    &self,
    input: SubjectInput,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn update_subject(
    &self,
    id: i64,
    input: SubjectInput,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn delete_subject(&self, id: i64) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_subjects(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<Subject>, Self::Error>> + Send + '_;

  // ── Exams ─────────────────────────────────────────────────────────────

  /// Persist an exam with its participant links in one transaction.
  fn create_exam(
    &self,
    exam: NewExam,
  ) -> impl Future<Output = Result<Exam, Self::Error>> + Send + '_;

  /// Replace an exam's fields and participant links.
  fn update_exam(
    &self,
    id: i64,
    exam: NewExam,
  ) -> impl Future<Output = Result<Exam, Self::Error>> + Send + '_;

  fn delete_exam(&self, id: i64) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_exams(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<Exam>, Self::Error>> + Send + '_;

  // ── Results ───────────────────────────────────────────────────────────

  fn create_result(
    &self,
    result: NewResult,
  ) -> impl Future<Output = Result<ExamResult, Self::Error>> + Send + '_;

  fn update_result(
    &self,
    id: i64,
    result: NewResult,
  ) -> impl Future<Output = Result<ExamResult, Self::Error>> + Send + '_;

  fn delete_result(&self, id: i64) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_results(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<ExamResult>, Self::Error>> + Send + '_;

  // ── Events and announcements ──────────────────────────────────────────

  fn create_event(
    &self,
    input: EventInput,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn update_event(
    &self,
    id: i64,
    input: EventInput,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn delete_event(&self, id: i64) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_events(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<Event>, Self::Error>> + Send + '_;

  fn create_announcement(
    &self,
    input: AnnouncementInput,
  ) -> impl Future<Output = Result<Announcement, Self::Error>> + Send + '_;

  fn update_announcement(
    &self,
    id: i64,
    input: AnnouncementInput,
  ) -> impl Future<Output = Result<Announcement, Self::Error>> + Send + '_;

  fn delete_announcement(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Newest first.
  fn list_announcements(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<Announcement>, Self::Error>> + Send + '_;
}
