//! Integration tests for `SqliteStore`, mostly against an in-memory database.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use chrono::{NaiveDate, NaiveTime, Utc};
use examboard_core::{
  auth::{AuthContext, DisplayInfo},
  exam::{Day, NewExam},
  identity::{
    Admin, Gender, Identity, IdentityKey, IdentityKind, LeaderDraft, MemberDraft, MemberUpdate,
    Person, PersonInput, Role, Stream,
  },
  notice::{AnnouncementInput, EventInput},
  result::{ExamStatus, NewResult, ResultHolder},
  scope::{Listing, ListQuery, Predicate, build_filter},
  store::{Classify, Failure, SchoolStore},
  subject::SubjectInput,
};

use crate::{Error, SqliteStore, encode::encode_dt};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn key(raw: &str) -> IdentityKey { IdentityKey::normalize(raw) }

fn person(first: &str, email: &str) -> Person {
  Person {
    first_name: first.into(),
    last_name:  "Tester".into(),
    email:      Some(email.into()),
    phone:      "0771234567".into(),
    address:    None,
    gender:     Gender::Male,
  }
}

fn leader(k: &str, username: &str) -> LeaderDraft {
  LeaderDraft {
    key:         key(k),
    username:    username.into(),
    person:      person("Lead", &format!("{username}@example.com")),
    school:      "ABC High School".into(),
    stream:      Stream::Maths,
    role:        None,
    subject_ids: vec![],
    secret_hash: "$argon2id$stub".into(),
  }
}

fn member(k: &str, leader_key: &str) -> MemberDraft {
  MemberDraft {
    key:         key(k),
    person:      person("Mem", &format!("{}@example.com", k.to_lowercase())),
    leader_key:  key(leader_key),
    stream:      Stream::Maths,
    role:        None,
    subject_ids: vec![],
    secret_hash: "$argon2id$stub".into(),
  }
}

fn ctx(k: &str, role: Role) -> AuthContext {
  AuthContext { key: key(k), role, display: DisplayInfo::default() }
}

fn exam(name: &str, subject_id: i64, leaders: &[&str], members: &[&str]) -> NewExam {
  NewExam {
    name: name.into(),
    date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
    day: Day::Monday,
    subject_id,
    admin_key: key("ADM1"),
    leader_keys: leaders.iter().map(|k| key(k)).collect(),
    member_keys: members.iter().map(|k| key(k)).collect(),
  }
}

fn all() -> ListQuery { ListQuery { per_page: Some(10_000), ..Default::default() } }

/// Admin `ADM1`, subject "Mathematics", leader `T100`, member `S200`.
async fn seeded() -> (SqliteStore, i64) {
  let s = store().await;
  s.create_admin(Admin { key: key("ADM1"), username: "admin1".into() }).await.unwrap();
  let maths = s
    .create_subject(SubjectInput { name: "Mathematics".into(), stream: Some(Stream::Maths) })
    .await
    .unwrap();
  s.create_leader(leader("T100", "teacher_t")).await.unwrap();
  s.create_member(member("S200", "T100")).await.unwrap();
  (s, maths.id)
}

// ─── Identities ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_leader() {
  let (s, maths) = seeded().await;
  let mut draft = leader("L001", "lead_one");
  draft.subject_ids = vec![maths];
  let created = s.create_leader(draft).await.unwrap();
  assert_eq!(created.key.as_str(), "L001");
  assert_eq!(created.subject_ids, vec![maths]);

  match s.get_identity(key("l001")).await.unwrap() {
    Some(Identity::Leader(l)) => assert_eq!(l.username, "lead_one"),
    other => panic!("expected leader, got {other:?}"),
  }
  assert!(s.get_identity(key("NOPE")).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_key_conflicts_across_variants() {
  let (s, _) = seeded().await;

  // Member key reused for a leader.
  let err = s.create_leader(leader("S200", "someone")).await.unwrap_err();
  assert!(matches!(err, Error::Conflict("identity key")));
  assert_eq!(err.classify(), Failure::Conflict("identity key"));

  // Leader key reused for a member.
  let err = s.create_member(member("T100", "T100")).await.unwrap_err();
  assert!(matches!(err, Error::Conflict("identity key")));

  // Admin key reused for a leader.
  let err = s.create_leader(leader("ADM1", "other")).await.unwrap_err();
  assert!(matches!(err, Error::Conflict("identity key")));

  // Leader key reused for an admin.
  let err = s
    .create_admin(Admin { key: key("T100"), username: "admin2".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict("identity key")));
}

#[tokio::test]
async fn duplicate_username_and_email_conflict() {
  let (s, _) = seeded().await;
  let err = s.create_leader(leader("T101", "teacher_t")).await.unwrap_err();
  assert!(matches!(err, Error::Conflict("username")));

  let mut draft = leader("T102", "fresh_name");
  draft.person.email = Some("teacher_t@example.com".into());
  let err = s.create_leader(draft).await.unwrap_err();
  assert!(matches!(err, Error::Conflict("email")));
}

#[tokio::test]
async fn member_requires_existing_leader() {
  let (s, _) = seeded().await;
  let err = s.create_member(member("S201", "T999")).await.unwrap_err();
  assert_eq!(err.classify(), Failure::NotFound);

  // A member key is not a leader.
  let err = s.create_member(member("S202", "S200")).await.unwrap_err();
  assert_eq!(err.classify(), Failure::NotFound);
}

#[tokio::test]
async fn credential_lookup_excludes_admins() {
  let (s, _) = seeded().await;
  let cred = s.find_credential(key("t100")).await.unwrap().expect("leader credential");
  assert_eq!(cred.identity.kind(), IdentityKind::Leader);
  assert_eq!(cred.secret_hash, "$argon2id$stub");

  let cred = s.find_credential(key("S200")).await.unwrap().expect("member credential");
  assert_eq!(cred.identity.role(), Role::Member);

  assert!(s.find_credential(key("ADM1")).await.unwrap().is_none());
}

#[tokio::test]
async fn update_member_moves_leader() {
  let (s, _) = seeded().await;
  s.create_leader(leader("T200", "teacher_two")).await.unwrap();
  let update = MemberUpdate {
    person:      PersonInput {
      first_name: "Sam".into(),
      last_name:  "Lee".into(),
      email:      "sam@example.com".into(),
      phone:      "0770000000".into(),
      address:    Some("1 Main St".into()),
      gender:     Gender::Female,
    },
    leader_key:  "t200".into(),
    stream:      Stream::Bio,
    subject_ids: vec![],
  };
  let m = s.update_member(key("S200"), update).await.unwrap();
  assert_eq!(m.leader_key.as_str(), "T200");
  assert_eq!(m.stream, Stream::Bio);
  assert_eq!(m.person.gender, Gender::Female);
}

#[tokio::test]
async fn leader_with_members_cannot_be_deleted() {
  let (s, _) = seeded().await;
  let err = s.delete_identity(key("T100"), IdentityKind::Leader).await.unwrap_err();
  assert_eq!(err.classify(), Failure::InUse("members"));

  s.delete_identity(key("S200"), IdentityKind::Member).await.unwrap();
  s.delete_identity(key("T100"), IdentityKind::Leader).await.unwrap();
  assert!(s.get_identity(key("T100")).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_checks_the_variant() {
  let (s, _) = seeded().await;
  let err = s.delete_identity(key("S200"), IdentityKind::Leader).await.unwrap_err();
  assert_eq!(err.classify(), Failure::NotFound);
}

#[tokio::test]
async fn stream_counts_cover_both_streams() {
  let (s, _) = seeded().await;
  let mut bio = member("S300", "T100");
  bio.stream = Stream::Bio;
  s.create_member(bio).await.unwrap();

  let counts = s.stream_counts().await.unwrap();
  assert_eq!(counts.len(), 2);
  assert_eq!((counts[0].stream, counts[0].leaders, counts[0].members), (Stream::Maths, 1, 1));
  assert_eq!((counts[1].stream, counts[1].leaders, counts[1].members), (Stream::Bio, 0, 1));
}

// ─── Exams and scoping ───────────────────────────────────────────────────────

#[tokio::test]
async fn linked_leader_sees_exam_others_do_not() {
  let (s, maths) = seeded().await;
  s.create_leader(leader("L001", "lead_one")).await.unwrap();
  s.create_leader(leader("L002", "lead_two")).await.unwrap();
  let e = s.create_exam(exam("Geometry", maths, &["L001"], &[])).await.unwrap();
  assert_eq!(e.leader_keys, vec![key("L001")]);

  let seen = |role: Role, k: &'static str| {
    let s = s.clone();
    async move {
      let pred = build_filter(&ctx(k, role), Listing::Exams);
      s.list_exams(pred, all()).await.unwrap()
    }
  };

  let l1 = seen(Role::Leader, "L001").await;
  assert_eq!(l1.count, 1);
  assert_eq!(l1.data[0].id, e.id);

  let l2 = seen(Role::Leader, "L002").await;
  assert_eq!(l2.count, 0);
  assert!(l2.data.is_empty());

  let admin = seen(Role::Admin, "ADM1").await;
  assert_eq!(admin.count, 1);
}

#[tokio::test]
async fn member_does_not_see_exam_linked_only_to_their_leader() {
  let (s, maths) = seeded().await;
  s.create_exam(exam("Algebra Final", maths, &["T100"], &[])).await.unwrap();

  let pred = build_filter(&ctx("S200", Role::Member), Listing::Exams);
  let page = s.list_exams(pred, all()).await.unwrap();
  assert_eq!(page.count, 0);
  assert!(page.data.is_empty());

  let pred = build_filter(&ctx("T100", Role::Leader), Listing::Exams);
  let page = s.list_exams(pred, all()).await.unwrap();
  assert_eq!(page.data[0].name, "Algebra Final");
}

#[tokio::test]
async fn exam_participants_must_have_matching_kind() {
  let (s, maths) = seeded().await;
  let err = s.create_exam(exam("Mixup", maths, &["S200"], &[])).await.unwrap_err();
  assert_eq!(err.classify(), Failure::NotFound);

  let err = s.create_exam(exam("No subject", 999, &[], &[])).await.unwrap_err();
  assert_eq!(err.classify(), Failure::NotFound);

  // Nothing was half-written.
  assert_eq!(s.list_exams(Predicate::All, all()).await.unwrap().count, 0);
}

#[tokio::test]
async fn update_exam_replaces_links() {
  let (s, maths) = seeded().await;
  let e = s.create_exam(exam("Algebra", maths, &["T100"], &[])).await.unwrap();
  let updated = s.update_exam(e.id, exam("Algebra II", maths, &[], &["S200"])).await.unwrap();
  assert_eq!(updated.name, "Algebra II");
  assert!(updated.leader_keys.is_empty());
  assert_eq!(updated.member_keys, vec![key("S200")]);
}

#[tokio::test]
async fn subject_in_use_cannot_be_deleted() {
  let (s, maths) = seeded().await;
  let e = s.create_exam(exam("Algebra", maths, &[], &[])).await.unwrap();
  let err = s.delete_subject(maths).await.unwrap_err();
  assert_eq!(err.classify(), Failure::InUse("exams"));

  s.delete_exam(e.id).await.unwrap();
  s.delete_subject(maths).await.unwrap();
  assert_eq!(s.delete_subject(maths).await.unwrap_err().classify(), Failure::NotFound);
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn results_are_scoped_to_their_holder() {
  let (s, maths) = seeded().await;
  let e = s.create_exam(exam("Algebra", maths, &["T100"], &["S200"])).await.unwrap();
  let mine = s
    .create_result(NewResult {
      score:   81.0,
      status:  ExamStatus::Pass,
      exam_id: e.id,
      holder:  ResultHolder::Member(key("S200")),
    })
    .await
    .unwrap();
  assert_eq!(mine.holder_name, "Mem Tester");
  s.create_result(NewResult {
    score:   40.0,
    status:  ExamStatus::Fail,
    exam_id: e.id,
    holder:  ResultHolder::Leader(key("T100")),
  })
  .await
  .unwrap();

  let member_view = s
    .list_results(build_filter(&ctx("S200", Role::Member), Listing::Results), all())
    .await
    .unwrap();
  assert_eq!(member_view.count, 1);
  assert_eq!(member_view.data[0].id, mine.id);

  let leader_view = s
    .list_results(build_filter(&ctx("T100", Role::Leader), Listing::Results), all())
    .await
    .unwrap();
  assert_eq!(leader_view.count, 1);
  assert_eq!(leader_view.data[0].holder, ResultHolder::Leader(key("T100")));

  let passes = s
    .list_results(Predicate::All, ListQuery { status: Some(ExamStatus::Pass), ..all() })
    .await
    .unwrap();
  assert_eq!(passes.count, 1);
}

#[tokio::test]
async fn results_follow_their_exam_on_delete() {
  let (s, maths) = seeded().await;
  let e = s.create_exam(exam("Algebra", maths, &[], &["S200"])).await.unwrap();
  s.create_result(NewResult {
    score:   10.0,
    status:  ExamStatus::Absent,
    exam_id: e.id,
    holder:  ResultHolder::Member(key("S200")),
  })
  .await
  .unwrap();
  s.delete_exam(e.id).await.unwrap();
  assert_eq!(s.list_results(Predicate::All, all()).await.unwrap().count, 0);
}

#[tokio::test]
async fn result_holder_kind_is_checked() {
  let (s, maths) = seeded().await;
  let e = s.create_exam(exam("Algebra", maths, &[], &[])).await.unwrap();
  let err = s
    .create_result(NewResult {
      score:   50.0,
      status:  ExamStatus::Pass,
      exam_id: e.id,
      holder:  ResultHolder::Member(key("T100")),
    })
    .await
    .unwrap_err();
  assert_eq!(err.classify(), Failure::NotFound);
}

// ─── Notices ─────────────────────────────────────────────────────────────────

fn notice(title: &str, exam_id: Option<i64>) -> AnnouncementInput {
  AnnouncementInput { title: title.into(), description: None, exam_id }
}

#[tokio::test]
async fn notices_show_general_and_linked_rows() {
  let (s, maths) = seeded().await;
  let linked = s.create_exam(exam("Algebra", maths, &["T100"], &[])).await.unwrap();
  let other = s.create_exam(exam("Calculus", maths, &[], &[])).await.unwrap();

  s.create_announcement(notice("General", None)).await.unwrap();
  s.create_announcement(notice("For T100", Some(linked.id))).await.unwrap();
  s.create_announcement(notice("Elsewhere", Some(other.id))).await.unwrap();

  let page = s
    .list_announcements(build_filter(&ctx("T100", Role::Leader), Listing::Announcements), all())
    .await
    .unwrap();
  let titles: Vec<&str> = page.data.iter().map(|a| a.title.as_str()).collect();
  // Newest first.
  assert_eq!(titles, vec!["For T100", "General"]);
  assert_eq!(page.count, 2);

  s.create_event(EventInput {
    title:       "Parents day".into(),
    description: Some("Hall A".into()),
    start_time:  Utc::now(),
    exam_id:     None,
  })
  .await
  .unwrap();
  let events = s
    .list_events(build_filter(&ctx("S200", Role::Member), Listing::Events), all())
    .await
    .unwrap();
  assert_eq!(events.count, 1);
}

#[tokio::test]
async fn deleting_exam_keeps_notices_as_general() {
  let (s, maths) = seeded().await;
  let e = s.create_exam(exam("Algebra", maths, &[], &[])).await.unwrap();
  let a = s.create_announcement(notice("Bring pencils", Some(e.id))).await.unwrap();
  assert_eq!(a.exam_name.as_deref(), Some("Algebra"));

  s.delete_exam(e.id).await.unwrap();
  let page = s.list_announcements(Predicate::All, all()).await.unwrap();
  assert_eq!(page.data[0].exam_id, None);
}

// ─── Search and paging ───────────────────────────────────────────────────────

#[tokio::test]
async fn search_is_case_insensitive_and_escapes_wildcards() {
  let (s, maths) = seeded().await;
  s.create_exam(exam("Algebra Final", maths, &[], &[])).await.unwrap();
  s.create_exam(exam("100% Geometry", maths, &[], &[])).await.unwrap();

  let q = |term: &str| ListQuery { search: Some(term.into()), ..all() };

  let page = s.list_exams(Predicate::All, q("ALGEBRA")).await.unwrap();
  assert_eq!(page.count, 1);

  // Matches via the subject name.
  let page = s.list_exams(Predicate::All, q("mathem")).await.unwrap();
  assert_eq!(page.count, 2);

  let page = s.list_exams(Predicate::All, q("%")).await.unwrap();
  assert_eq!(page.count, 1);
  assert_eq!(page.data[0].name, "100% Geometry");
}

#[tokio::test]
async fn search_matches_non_ascii_text_as_written() {
  let s = store().await;
  s.create_subject(SubjectInput { name: "Élan Physics".into(), stream: None }).await.unwrap();

  let q = |term: &str| ListQuery { search: Some(term.into()), ..all() };
  assert_eq!(s.list_subjects(Predicate::All, q("Élan")).await.unwrap().count, 1);
  assert_eq!(s.list_subjects(Predicate::All, q("ÉLAN")).await.unwrap().count, 1);
}

#[tokio::test]
async fn pages_hold_ten_rows_and_count_everything() {
  let s = store().await;
  for i in 0..23 {
    s.create_subject(SubjectInput { name: format!("Subject {i:02}"), stream: None })
      .await
      .unwrap();
  }

  let first = s.list_subjects(Predicate::All, ListQuery::default()).await.unwrap();
  assert_eq!(first.count, 23);
  assert_eq!(first.data.len(), 10);
  assert_eq!(first.data[0].name, "Subject 00");

  let third = s
    .list_subjects(Predicate::All, ListQuery { page: Some(3), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(third.data.len(), 3);
  assert_eq!(third.data[0].name, "Subject 20");

  let nothing = s.list_subjects(Predicate::Nothing, ListQuery::default()).await.unwrap();
  assert_eq!(nothing.count, 0);
}

#[tokio::test]
async fn leaders_filter_by_stream() {
  let (s, _) = seeded().await;
  let mut bio = leader("T300", "bio_teacher");
  bio.stream = Stream::Bio;
  s.create_leader(bio).await.unwrap();

  let page = s
    .list_leaders(Predicate::All, ListQuery { stream: Some(Stream::Bio), ..all() })
    .await
    .unwrap();
  assert_eq!(page.count, 1);
  assert_eq!(page.data[0].key.as_str(), "T300");

  let page = s
    .list_members(Predicate::All, ListQuery { search: Some("s2".into()), ..all() })
    .await
    .unwrap();
  assert_eq!(page.count, 1);
}

#[tokio::test]
async fn count_and_rows_come_from_one_snapshot() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("examboard.db");
  let s = SqliteStore::open(&path).await.unwrap();
  s.create_announcement(notice("Existing", None)).await.unwrap();

  // A second connection that commits between the count and the page read.
  let writer = rusqlite::Connection::open(&path).unwrap();
  let mode: String = writer.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0)).unwrap();
  assert_eq!(mode, "wal");

  let inserted = Arc::new(AtomicUsize::new(0));
  let counter = inserted.clone();
  s.between_reads(move || {
    writer
      .execute(
        "INSERT INTO announcements (title, created_at) VALUES ('Interleaved', ?1)",
        [encode_dt(Utc::now())],
      )
      .unwrap();
    counter.fetch_add(1, Ordering::SeqCst);
  })
  .await
  .unwrap();

  for expected in 1..=3 {
    let page = s.list_announcements(Predicate::All, all()).await.unwrap();
    assert_eq!(page.count as usize, expected);
    assert_eq!(page.data.len(), expected);
  }
  assert_eq!(inserted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn oversized_page_is_rejected_and_store_keeps_serving() {
  let (s, maths) = seeded().await;
  s.create_exam(exam("Algebra Final", maths, &[], &[])).await.unwrap();

  let err = s
    .list_exams(Predicate::All, ListQuery { page: Some(usize::MAX), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PageOutOfRange));
  assert_eq!(err.classify(), Failure::Rejected("page out of range"));

  let page = s.list_exams(Predicate::All, ListQuery::default()).await.unwrap();
  assert_eq!(page.count, 1);
}
