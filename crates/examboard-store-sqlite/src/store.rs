//! [`SqliteStore`], the SQLite implementation of [`SchoolStore`].

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter, types::Value};

use examboard_core::{
  exam::{Exam, NewExam},
  identity::{
    Admin, Credential, Identity, IdentityKey, IdentityKind, Leader, LeaderDraft, LeaderUpdate,
    Member, MemberDraft, MemberUpdate, Person, Stream,
  },
  notice::{Announcement, AnnouncementInput, Event, EventInput},
  result::{ExamResult, NewResult, ResultHolder},
  scope::{ListQuery, Page, Predicate},
  store::{SchoolStore, StreamCount},
  subject::{Subject, SubjectInput},
};

use crate::{
  Error, Result,
  encode::{
    ANNOUNCEMENT_COLUMNS, EVENT_COLUMNS, EXAM_COLUMNS, IDENTITY_COLUMNS, RESULT_COLUMNS,
    RawAnnouncement, RawEvent, RawExam, RawIdentity, RawResult, RawSubject, SUBJECT_COLUMNS,
    encode_date, encode_dt, encode_time,
  },
  filter::{Target, Where},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An examboard store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("schema initialised");
    Ok(())
  }

  /// Run `f` on the database thread. Domain errors raised inside `f` come
  /// back unchanged.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Install `hook` to run on the database thread between a listing's count
  /// and its page read.
  #[cfg(test)]
  pub(crate) async fn between_reads(&self, hook: impl FnMut() + Send + 'static) -> Result<()> {
    self
      .run(move |_| {
        BETWEEN_READS.with_borrow_mut(|slot| *slot = Some(Box::new(hook)));
        Ok(())
      })
      .await
  }
}

// Each tokio-rusqlite connection owns one thread, so a hook stored here only
// affects the store that installed it.
#[cfg(test)]
thread_local! {
  static BETWEEN_READS: std::cell::RefCell<Option<Box<dyn FnMut()>>> =
    const { std::cell::RefCell::new(None) };
}

// ─── Shared row helpers ──────────────────────────────────────────────────────

fn exists(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<bool> {
  Ok(conn.query_row(sql, params, |_| Ok(())).optional()?.is_some())
}

fn kind_of(conn: &Connection, key: &str) -> Result<Option<String>> {
  Ok(
    conn
      .query_row("SELECT kind FROM identities WHERE identity_key = ?1", [key], |r| r.get(0))
      .optional()?,
  )
}

/// Fails with not-found unless `key` is an identity of `kind`.
fn require_kind(conn: &Connection, key: &str, kind: IdentityKind) -> Result<()> {
  match kind_of(conn, key)? {
    Some(k) if k == kind.as_str() => Ok(()),
    _ => Err(Error::NotFound),
  }
}

fn require_row(conn: &Connection, table: &str, id: i64) -> Result<()> {
  if exists(conn, &format!("SELECT 1 FROM {table} WHERE id = ?1"), [id])? {
    Ok(())
  } else {
    Err(Error::NotFound)
  }
}

fn ensure_unique(
  conn: &Connection,
  column: &str,
  value: &str,
  except: Option<&str>,
  field: &'static str,
) -> Result<()> {
  let sql = format!(
    "SELECT 1 FROM identities WHERE {column} = ?1 AND identity_key IS NOT ?2"
  );
  if exists(conn, &sql, params![value, except])? {
    Err(Error::Conflict(field))
  } else {
    Ok(())
  }
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
  Ok(conn.query_row(sql, params, |r| r.get(0))?)
}

fn subject_ids(conn: &Connection, key: &str) -> Result<Vec<i64>> {
  let mut stmt = conn.prepare_cached(
    "SELECT subject_id FROM identity_subjects WHERE identity_key = ?1 ORDER BY subject_id",
  )?;
  let ids = stmt
    .query_map([key], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<i64>>>()?;
  Ok(ids)
}

fn link_subjects(conn: &Connection, key: &str, ids: &[i64]) -> Result<()> {
  conn.execute("DELETE FROM identity_subjects WHERE identity_key = ?1", [key])?;
  for id in ids {
    require_row(conn, "subjects", *id)?;
    conn.execute(
      "INSERT OR IGNORE INTO identity_subjects (identity_key, subject_id) VALUES (?1, ?2)",
      params![key, id],
    )?;
  }
  Ok(())
}

fn load_identity(conn: &Connection, key: &str) -> Result<Option<Identity>> {
  let raw = conn
    .query_row(
      &format!("SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.identity_key = ?1"),
      [key],
      RawIdentity::from_row,
    )
    .optional()?;
  match raw {
    Some(raw) => {
      let ids = subject_ids(conn, key)?;
      raw.into_identity(ids).map(Some)
    }
    None => Ok(None),
  }
}

fn load_leader(conn: &Connection, key: &str) -> Result<Leader> {
  match load_identity(conn, key)? {
    Some(Identity::Leader(l)) => Ok(l),
    _ => Err(Error::NotFound),
  }
}

fn load_member(conn: &Connection, key: &str) -> Result<Member> {
  match load_identity(conn, key)? {
    Some(Identity::Member(m)) => Ok(m),
    _ => Err(Error::NotFound),
  }
}

fn exam_keys(conn: &Connection, exam_id: i64) -> Result<(Vec<IdentityKey>, Vec<IdentityKey>)> {
  let mut leaders = conn.prepare_cached(
    "SELECT leader_key FROM exam_leaders WHERE exam_id = ?1 ORDER BY leader_key",
  )?;
  let leader_keys = leaders
    .query_map([exam_id], |r| r.get::<_, String>(0))?
    .map(|k| k.map(|k| IdentityKey::normalize(&k)))
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut members = conn.prepare_cached(
    "SELECT member_key FROM exam_members WHERE exam_id = ?1 ORDER BY member_key",
  )?;
  let member_keys = members
    .query_map([exam_id], |r| r.get::<_, String>(0))?
    .map(|k| k.map(|k| IdentityKey::normalize(&k)))
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok((leader_keys, member_keys))
}

const EXAM_FROM: &str = "exams e JOIN subjects s ON s.id = e.subject_id";
const RESULT_FROM: &str = "results r \
   JOIN exams e ON e.id = r.exam_id \
   LEFT JOIN identities m ON m.identity_key = r.member_key \
   LEFT JOIN identities l ON l.identity_key = r.leader_key";
const EVENT_FROM: &str = "events v LEFT JOIN exams e ON e.id = v.exam_id";
const ANNOUNCEMENT_FROM: &str = "announcements a LEFT JOIN exams e ON e.id = a.exam_id";

fn load_exam(conn: &Connection, id: i64) -> Result<Exam> {
  let raw = conn
    .query_row(
      &format!("SELECT {EXAM_COLUMNS} FROM {EXAM_FROM} WHERE e.id = ?1"),
      [id],
      RawExam::from_row,
    )
    .optional()?
    .ok_or(Error::NotFound)?;
  let (leaders, members) = exam_keys(conn, id)?;
  raw.into_exam(leaders, members)
}

fn load_result(conn: &Connection, id: i64) -> Result<ExamResult> {
  conn
    .query_row(
      &format!("SELECT {RESULT_COLUMNS} FROM {RESULT_FROM} WHERE r.id = ?1"),
      [id],
      RawResult::from_row,
    )
    .optional()?
    .ok_or(Error::NotFound)?
    .into_result()
}

fn load_event(conn: &Connection, id: i64) -> Result<Event> {
  conn
    .query_row(
      &format!("SELECT {EVENT_COLUMNS} FROM {EVENT_FROM} WHERE v.id = ?1"),
      [id],
      RawEvent::from_row,
    )
    .optional()?
    .ok_or(Error::NotFound)?
    .into_event()
}

fn load_announcement(conn: &Connection, id: i64) -> Result<Announcement> {
  conn
    .query_row(
      &format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM {ANNOUNCEMENT_FROM} WHERE a.id = ?1"),
      [id],
      RawAnnouncement::from_row,
    )
    .optional()?
    .ok_or(Error::NotFound)?
    .into_announcement()
}

/// Validate the participant keys of an exam and replace its link rows.
fn link_exam(conn: &Connection, exam_id: i64, exam: &NewExam) -> Result<()> {
  conn.execute("DELETE FROM exam_leaders WHERE exam_id = ?1", [exam_id])?;
  conn.execute("DELETE FROM exam_members WHERE exam_id = ?1", [exam_id])?;
  for key in &exam.leader_keys {
    require_kind(conn, key.as_str(), IdentityKind::Leader)?;
    conn.execute(
      "INSERT INTO exam_leaders (exam_id, leader_key) VALUES (?1, ?2)",
      params![exam_id, key.as_str()],
    )?;
  }
  for key in &exam.member_keys {
    require_kind(conn, key.as_str(), IdentityKind::Member)?;
    conn.execute(
      "INSERT INTO exam_members (exam_id, member_key) VALUES (?1, ?2)",
      params![exam_id, key.as_str()],
    )?;
  }
  Ok(())
}

fn check_exam_refs(conn: &Connection, exam: &NewExam) -> Result<()> {
  require_row(conn, "subjects", exam.subject_id)?;
  require_kind(conn, exam.admin_key.as_str(), IdentityKind::Admin)
}

fn check_holder(conn: &Connection, result: &NewResult) -> Result<()> {
  require_row(conn, "exams", result.exam_id)?;
  match &result.holder {
    ResultHolder::Member(k) => require_kind(conn, k.as_str(), IdentityKind::Member),
    ResultHolder::Leader(k) => require_kind(conn, k.as_str(), IdentityKind::Leader),
  }
}

fn holder_columns(holder: &ResultHolder) -> (Option<String>, Option<String>) {
  match holder {
    ResultHolder::Member(k) => (Some(k.as_str().to_owned()), None),
    ResultHolder::Leader(k) => (None, Some(k.as_str().to_owned())),
  }
}

fn check_exam_ref(conn: &Connection, exam_id: Option<i64>) -> Result<()> {
  match exam_id {
    Some(id) => require_row(conn, "exams", id),
    None => Ok(()),
  }
}

fn delete_by_id(conn: &Connection, table: &str, id: i64) -> Result<()> {
  let n = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
  if n == 0 { Err(Error::NotFound) } else { Ok(()) }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// One listing query: its joins, columns, ordering and scoping columns.
struct Listing {
  columns: &'static str,
  from:    &'static str,
  order:   &'static str,
  target:  Target,
}

/// Read the count and one page under the same filter, inside one read
/// transaction, then let `finish` decode rows (it may issue further reads on
/// the same transaction).
fn fetch_page<R, T>(
  conn: &mut Connection,
  listing: &Listing,
  filter: Where,
  query: &ListQuery,
  map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<R>,
  finish: impl Fn(&Connection, R) -> Result<T>,
) -> Result<Page<T>> {
  let Some(offset) = query.offset() else {
    return Err(Error::PageOutOfRange);
  };
  let limit = i64::try_from(query.limit()).unwrap_or(i64::MAX);

  let tx = conn.transaction()?;
  let clause = filter.render();

  let total: i64 = tx.query_row(
    &format!("SELECT COUNT(*) FROM {} {clause}", listing.from),
    params_from_iter(filter.params()),
    |r| r.get(0),
  )?;

  #[cfg(test)]
  BETWEEN_READS.with_borrow_mut(|hook| {
    if let Some(hook) = hook {
      hook();
    }
  });

  let raws = {
    let sql = format!(
      "SELECT {} FROM {} {clause} ORDER BY {} LIMIT ? OFFSET ?",
      listing.columns, listing.from, listing.order
    );
    let paging = [Value::Integer(limit), Value::Integer(offset)];
    let mut stmt = tx.prepare(&sql)?;
    stmt
      .query_map(params_from_iter(filter.params().iter().chain(paging.iter())), map)?
      .collect::<rusqlite::Result<Vec<R>>>()?
  };

  let data = raws
    .into_iter()
    .map(|raw| finish(&tx, raw))
    .collect::<Result<Vec<T>>>()?;
  tx.commit()?;

  Ok(Page { data, count: total.max(0) as u64 })
}

fn identity_listing() -> Listing {
  Listing {
    columns: IDENTITY_COLUMNS,
    from:    "identities i",
    order:   "i.identity_key",
    target:  Target::default(),
  }
}

fn into_leader(conn: &Connection, raw: RawIdentity) -> Result<Leader> {
  let ids = subject_ids(conn, &raw.identity_key)?;
  match raw.into_identity(ids)? {
    Identity::Leader(l) => Ok(l),
    _ => Err(Error::UnknownKind("expected leader".into())),
  }
}

fn into_member(conn: &Connection, raw: RawIdentity) -> Result<Member> {
  let ids = subject_ids(conn, &raw.identity_key)?;
  match raw.into_identity(ids)? {
    Identity::Member(m) => Ok(m),
    _ => Err(Error::UnknownKind("expected member".into())),
  }
}

fn insert_person_columns(person: &Person) -> (String, String, Option<String>, String, Option<String>, &'static str) {
  (
    person.first_name.clone(),
    person.last_name.clone(),
    person.email.clone(),
    person.phone.clone(),
    person.address.clone(),
    person.gender.as_str(),
  )
}

// ─── SchoolStore impl ────────────────────────────────────────────────────────

impl SchoolStore for SqliteStore {
  type Error = Error;

  // ── Identities ────────────────────────────────────────────────────────────

  async fn create_leader(&self, draft: LeaderDraft) -> Result<Leader> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let key = draft.key.as_str();
        if kind_of(&tx, key)?.is_some() {
          return Err(Error::Conflict("identity key"));
        }
        ensure_unique(&tx, "username", &draft.username, None, "username")?;
        if let Some(email) = &draft.person.email {
          ensure_unique(&tx, "email", email, None, "email")?;
        }

        let (first, last, email, phone, address, gender) = insert_person_columns(&draft.person);
        tx.execute(
          "INSERT INTO identities (
             identity_key, kind, username, first_name, last_name, email, phone,
             address, gender, school, stream, role, secret_hash, created_at
           ) VALUES (?1, 'leader', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          params![
            key,
            draft.username,
            first,
            last,
            email,
            phone,
            address,
            gender,
            draft.school,
            draft.stream.as_str(),
            draft.role.map(|r| r.as_str()),
            draft.secret_hash,
            encode_dt(Utc::now()),
          ],
        )?;
        link_subjects(&tx, key, &draft.subject_ids)?;

        let leader = load_leader(&tx, key)?;
        tx.commit()?;
        Ok(leader)
      })
      .await
  }

  async fn create_member(&self, draft: MemberDraft) -> Result<Member> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let key = draft.key.as_str();
        if kind_of(&tx, key)?.is_some() {
          return Err(Error::Conflict("identity key"));
        }
        if let Some(email) = &draft.person.email {
          ensure_unique(&tx, "email", email, None, "email")?;
        }
        require_kind(&tx, draft.leader_key.as_str(), IdentityKind::Leader)?;

        let (first, last, email, phone, address, gender) = insert_person_columns(&draft.person);
        tx.execute(
          "INSERT INTO identities (
             identity_key, kind, first_name, last_name, email, phone, address,
             gender, stream, leader_key, role, secret_hash, created_at
           ) VALUES (?1, 'member', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          params![
            key,
            first,
            last,
            email,
            phone,
            address,
            gender,
            draft.stream.as_str(),
            draft.leader_key.as_str(),
            draft.role.map(|r| r.as_str()),
            draft.secret_hash,
            encode_dt(Utc::now()),
          ],
        )?;
        link_subjects(&tx, key, &draft.subject_ids)?;

        let member = load_member(&tx, key)?;
        tx.commit()?;
        Ok(member)
      })
      .await
  }

  async fn create_admin(&self, admin: Admin) -> Result<Admin> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        if kind_of(&tx, admin.key.as_str())?.is_some() {
          return Err(Error::Conflict("identity key"));
        }
        ensure_unique(&tx, "username", &admin.username, None, "username")?;
        tx.execute(
          "INSERT INTO identities (identity_key, kind, username, created_at)
           VALUES (?1, 'admin', ?2, ?3)",
          params![admin.key.as_str(), admin.username, encode_dt(Utc::now())],
        )?;
        tx.commit()?;
        Ok(admin)
      })
      .await
  }

  async fn find_credential(&self, key: IdentityKey) -> Result<Option<Credential>> {
    self
      .run(move |conn| {
        let raw = conn
          .query_row(
            &format!(
              "SELECT {IDENTITY_COLUMNS} FROM identities i
               WHERE i.identity_key = ?1 AND i.kind IN ('leader', 'member')"
            ),
            [key.as_str()],
            RawIdentity::from_row,
          )
          .optional()?;

        let Some(mut raw) = raw else { return Ok(None) };
        let Some(secret_hash) = raw.secret_hash.take() else { return Ok(None) };
        let ids = subject_ids(conn, key.as_str())?;
        Ok(Some(Credential { identity: raw.into_identity(ids)?, secret_hash }))
      })
      .await
  }

  async fn get_identity(&self, key: IdentityKey) -> Result<Option<Identity>> {
    self.run(move |conn| load_identity(conn, key.as_str())).await
  }

  async fn update_leader(&self, key: IdentityKey, update: LeaderUpdate) -> Result<Leader> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let key = key.as_str();
        require_kind(&tx, key, IdentityKind::Leader)?;
        ensure_unique(&tx, "username", &update.username, Some(key), "username")?;
        ensure_unique(&tx, "email", &update.person.email, Some(key), "email")?;

        let person = Person::from(update.person);
        let (first, last, email, phone, address, gender) = insert_person_columns(&person);
        tx.execute(
          "UPDATE identities SET
             username = ?2, first_name = ?3, last_name = ?4, email = ?5, phone = ?6,
             address = ?7, gender = ?8, school = ?9, stream = ?10
           WHERE identity_key = ?1",
          params![
            key,
            update.username,
            first,
            last,
            email,
            phone,
            address,
            gender,
            update.school,
            update.stream.as_str(),
          ],
        )?;
        link_subjects(&tx, key, &update.subject_ids)?;

        let leader = load_leader(&tx, key)?;
        tx.commit()?;
        Ok(leader)
      })
      .await
  }

  async fn update_member(&self, key: IdentityKey, update: MemberUpdate) -> Result<Member> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let key = key.as_str();
        require_kind(&tx, key, IdentityKind::Member)?;
        ensure_unique(&tx, "email", &update.person.email, Some(key), "email")?;
        let leader_key = IdentityKey::normalize(&update.leader_key);
        require_kind(&tx, leader_key.as_str(), IdentityKind::Leader)?;

        let person = Person::from(update.person);
        let (first, last, email, phone, address, gender) = insert_person_columns(&person);
        tx.execute(
          "UPDATE identities SET
             first_name = ?2, last_name = ?3, email = ?4, phone = ?5, address = ?6,
             gender = ?7, stream = ?8, leader_key = ?9
           WHERE identity_key = ?1",
          params![
            key,
            first,
            last,
            email,
            phone,
            address,
            gender,
            update.stream.as_str(),
            leader_key.as_str(),
          ],
        )?;
        link_subjects(&tx, key, &update.subject_ids)?;

        let member = load_member(&tx, key)?;
        tx.commit()?;
        Ok(member)
      })
      .await
  }

  async fn delete_identity(&self, key: IdentityKey, kind: IdentityKind) -> Result<()> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let key = key.as_str();
        require_kind(&tx, key, kind)?;
        match kind {
          IdentityKind::Leader => {
            let owned =
              count(&tx, "SELECT COUNT(*) FROM identities WHERE leader_key = ?1", [key])?;
            if owned > 0 {
              return Err(Error::InUse("members"));
            }
          }
          IdentityKind::Admin => {
            let owned = count(&tx, "SELECT COUNT(*) FROM exams WHERE admin_key = ?1", [key])?;
            if owned > 0 {
              return Err(Error::InUse("exams"));
            }
          }
          IdentityKind::Member => {}
        }
        tx.execute("DELETE FROM identities WHERE identity_key = ?1", [key])?;
        tx.commit()?;
        tracing::info!(key, kind = kind.as_str(), "identity deleted");
        Ok(())
      })
      .await
  }

  async fn list_leaders(&self, scope: Predicate, query: ListQuery) -> Result<Page<Leader>> {
    self
      .run(move |conn| {
        let listing = identity_listing();
        let mut filter = Where::new();
        filter.push("i.kind = 'leader'", []);
        filter.scope(&scope, listing.target);
        filter.eq("i.stream", query.stream.map(Stream::as_str));
        filter.search(
          query.search_term(),
          &["i.identity_key", "i.username", "i.school", "i.phone"],
        );
        fetch_page(conn, &listing, filter, &query, RawIdentity::from_row, into_leader)
      })
      .await
  }

  async fn list_members(&self, scope: Predicate, query: ListQuery) -> Result<Page<Member>> {
    self
      .run(move |conn| {
        let listing = identity_listing();
        let mut filter = Where::new();
        filter.push("i.kind = 'member'", []);
        filter.scope(&scope, listing.target);
        filter.eq("i.stream", query.stream.map(Stream::as_str));
        filter.search(
          query.search_term(),
          &["i.identity_key", "i.first_name", "i.last_name", "i.email", "i.phone"],
        );
        fetch_page(conn, &listing, filter, &query, RawIdentity::from_row, into_member)
      })
      .await
  }

  async fn stream_counts(&self) -> Result<Vec<StreamCount>> {
    self
      .run(|conn| {
        let mut stmt = conn.prepare(
          "SELECT stream,
                  SUM(CASE WHEN kind = 'leader' THEN 1 ELSE 0 END),
                  SUM(CASE WHEN kind = 'member' THEN 1 ELSE 0 END)
           FROM identities
           WHERE kind IN ('leader', 'member') AND stream IS NOT NULL
           GROUP BY stream",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let by_stream: HashMap<String, (i64, i64)> =
          rows.into_iter().map(|(s, l, m)| (s, (l, m))).collect();

        Ok(
          [Stream::Maths, Stream::Bio]
            .into_iter()
            .map(|stream| {
              let (leaders, members) = by_stream.get(stream.as_str()).copied().unwrap_or((0, 0));
              StreamCount { stream, leaders: leaders as u64, members: members as u64 }
            })
            .collect(),
        )
      })
      .await
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn create_subject(&self, input: SubjectInput) -> Result<Subject> {
    self
      .run(move |conn| {
        if exists(conn, "SELECT 1 FROM subjects WHERE name = ?1", [&input.name])? {
          return Err(Error::Conflict("subject name"));
        }
        conn.execute(
          "INSERT INTO subjects (name, stream) VALUES (?1, ?2)",
          params![input.name, input.stream.map(Stream::as_str)],
        )?;
        Ok(Subject { id: conn.last_insert_rowid(), name: input.name, stream: input.stream })
      })
      .await
  }

  async fn update_subject(&self, id: i64, input: SubjectInput) -> Result<Subject> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        require_row(&tx, "subjects", id)?;
        if exists(&tx, "SELECT 1 FROM subjects WHERE name = ?1 AND id != ?2", params![
          input.name, id
        ])? {
          return Err(Error::Conflict("subject name"));
        }
        tx.execute(
          "UPDATE subjects SET name = ?2, stream = ?3 WHERE id = ?1",
          params![id, input.name, input.stream.map(Stream::as_str)],
        )?;
        tx.commit()?;
        Ok(Subject { id, name: input.name, stream: input.stream })
      })
      .await
  }

  async fn delete_subject(&self, id: i64) -> Result<()> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        require_row(&tx, "subjects", id)?;
        if count(&tx, "SELECT COUNT(*) FROM exams WHERE subject_id = ?1", [id])? > 0 {
          return Err(Error::InUse("exams"));
        }
        delete_by_id(&tx, "subjects", id)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn list_subjects(&self, scope: Predicate, query: ListQuery) -> Result<Page<Subject>> {
    self
      .run(move |conn| {
        let listing = Listing {
          columns: SUBJECT_COLUMNS,
          from:    "subjects s",
          order:   "s.name, s.id",
          target:  Target::default(),
        };
        let mut filter = Where::new();
        filter.scope(&scope, listing.target);
        filter.eq("s.stream", query.stream.map(Stream::as_str));
        filter.search(query.search_term(), &["s.name"]);
        fetch_page(conn, &listing, filter, &query, RawSubject::from_row, |_, raw| {
          raw.into_subject()
        })
      })
      .await
  }

  // ── Exams ─────────────────────────────────────────────────────────────────

  async fn create_exam(&self, exam: NewExam) -> Result<Exam> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        check_exam_refs(&tx, &exam)?;
        tx.execute(
          "INSERT INTO exams (name, date, start_time, end_time, day, subject_id, admin_key)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![
            exam.name,
            encode_date(exam.date),
            encode_time(exam.start_time),
            encode_time(exam.end_time),
            exam.day.as_str(),
            exam.subject_id,
            exam.admin_key.as_str(),
          ],
        )?;
        let id = tx.last_insert_rowid();
        link_exam(&tx, id, &exam)?;

        let created = load_exam(&tx, id)?;
        tx.commit()?;
        Ok(created)
      })
      .await
  }

  async fn update_exam(&self, id: i64, exam: NewExam) -> Result<Exam> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        require_row(&tx, "exams", id)?;
        check_exam_refs(&tx, &exam)?;
        tx.execute(
          "UPDATE exams SET
             name = ?2, date = ?3, start_time = ?4, end_time = ?5, day = ?6,
             subject_id = ?7, admin_key = ?8
           WHERE id = ?1",
          params![
            id,
            exam.name,
            encode_date(exam.date),
            encode_time(exam.start_time),
            encode_time(exam.end_time),
            exam.day.as_str(),
            exam.subject_id,
            exam.admin_key.as_str(),
          ],
        )?;
        link_exam(&tx, id, &exam)?;

        let updated = load_exam(&tx, id)?;
        tx.commit()?;
        Ok(updated)
      })
      .await
  }

  async fn delete_exam(&self, id: i64) -> Result<()> {
    self.run(move |conn| delete_by_id(conn, "exams", id)).await
  }

  async fn list_exams(&self, scope: Predicate, query: ListQuery) -> Result<Page<Exam>> {
    self
      .run(move |conn| {
        let listing = Listing {
          columns: EXAM_COLUMNS,
          from:    EXAM_FROM,
          order:   "e.id",
          target:  Target { exam: Some("e.id"), holder: None },
        };
        let mut filter = Where::new();
        filter.scope(&scope, listing.target);
        filter.search(query.search_term(), &["e.name", "s.name"]);
        fetch_page(conn, &listing, filter, &query, RawExam::from_row, |conn, raw: RawExam| {
          let (leaders, members) = exam_keys(conn, raw.id)?;
          raw.into_exam(leaders, members)
        })
      })
      .await
  }

  // ── Results ───────────────────────────────────────────────────────────────

  async fn create_result(&self, result: NewResult) -> Result<ExamResult> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        check_holder(&tx, &result)?;
        let (member_key, leader_key) = holder_columns(&result.holder);
        tx.execute(
          "INSERT INTO results (score, status, exam_id, member_key, leader_key, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            result.score,
            result.status.as_str(),
            result.exam_id,
            member_key,
            leader_key,
            encode_dt(Utc::now()),
          ],
        )?;
        let created = load_result(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(created)
      })
      .await
  }

  async fn update_result(&self, id: i64, result: NewResult) -> Result<ExamResult> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        require_row(&tx, "results", id)?;
        check_holder(&tx, &result)?;
        let (member_key, leader_key) = holder_columns(&result.holder);
        tx.execute(
          "UPDATE results SET score = ?2, status = ?3, exam_id = ?4, member_key = ?5,
             leader_key = ?6
           WHERE id = ?1",
          params![
            id,
            result.score,
            result.status.as_str(),
            result.exam_id,
            member_key,
            leader_key,
          ],
        )?;
        let updated = load_result(&tx, id)?;
        tx.commit()?;
        Ok(updated)
      })
      .await
  }

  async fn delete_result(&self, id: i64) -> Result<()> {
    self.run(move |conn| delete_by_id(conn, "results", id)).await
  }

  async fn list_results(&self, scope: Predicate, query: ListQuery) -> Result<Page<ExamResult>> {
    self
      .run(move |conn| {
        let listing = Listing {
          columns: RESULT_COLUMNS,
          from:    RESULT_FROM,
          order:   "r.created_at DESC, r.id DESC",
          target:  Target { exam: None, holder: Some(("r.leader_key", "r.member_key")) },
        };
        let mut filter = Where::new();
        filter.scope(&scope, listing.target);
        filter.eq("r.status", query.status.map(|s| s.as_str()));
        filter.search(query.search_term(), &["e.name", "m.first_name", "l.first_name"]);
        fetch_page(conn, &listing, filter, &query, RawResult::from_row, |_, raw| {
          raw.into_result()
        })
      })
      .await
  }

  // ── Events and announcements ──────────────────────────────────────────────

  async fn create_event(&self, input: EventInput) -> Result<Event> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        check_exam_ref(&tx, input.exam_id)?;
        tx.execute(
          "INSERT INTO events (title, description, start_time, exam_id) VALUES (?1, ?2, ?3, ?4)",
          params![input.title, input.description, encode_dt(input.start_time), input.exam_id],
        )?;
        let created = load_event(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(created)
      })
      .await
  }

  async fn update_event(&self, id: i64, input: EventInput) -> Result<Event> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        require_row(&tx, "events", id)?;
        check_exam_ref(&tx, input.exam_id)?;
        tx.execute(
          "UPDATE events SET title = ?2, description = ?3, start_time = ?4, exam_id = ?5
           WHERE id = ?1",
          params![id, input.title, input.description, encode_dt(input.start_time), input.exam_id],
        )?;
        let updated = load_event(&tx, id)?;
        tx.commit()?;
        Ok(updated)
      })
      .await
  }

  async fn delete_event(&self, id: i64) -> Result<()> {
    self.run(move |conn| delete_by_id(conn, "events", id)).await
  }

  async fn list_events(&self, scope: Predicate, query: ListQuery) -> Result<Page<Event>> {
    self
      .run(move |conn| {
        let listing = Listing {
          columns: EVENT_COLUMNS,
          from:    EVENT_FROM,
          order:   "v.id",
          target:  Target { exam: Some("v.exam_id"), holder: None },
        };
        let mut filter = Where::new();
        filter.scope(&scope, listing.target);
        filter.search(query.search_term(), &["v.title", "v.description"]);
        fetch_page(conn, &listing, filter, &query, RawEvent::from_row, |_, raw| raw.into_event())
      })
      .await
  }

  async fn create_announcement(&self, input: AnnouncementInput) -> Result<Announcement> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        check_exam_ref(&tx, input.exam_id)?;
        tx.execute(
          "INSERT INTO announcements (title, description, exam_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![input.title, input.description, input.exam_id, encode_dt(Utc::now())],
        )?;
        let created = load_announcement(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(created)
      })
      .await
  }

  async fn update_announcement(&self, id: i64, input: AnnouncementInput) -> Result<Announcement> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        require_row(&tx, "announcements", id)?;
        check_exam_ref(&tx, input.exam_id)?;
        tx.execute(
          "UPDATE announcements SET title = ?2, description = ?3, exam_id = ?4 WHERE id = ?1",
          params![id, input.title, input.description, input.exam_id],
        )?;
        let updated = load_announcement(&tx, id)?;
        tx.commit()?;
        Ok(updated)
      })
      .await
  }

  async fn delete_announcement(&self, id: i64) -> Result<()> {
    self.run(move |conn| delete_by_id(conn, "announcements", id)).await
  }

  async fn list_announcements(
    &self,
    scope: Predicate,
    query: ListQuery,
  ) -> Result<Page<Announcement>> {
    self
      .run(move |conn| {
        let listing = Listing {
          columns: ANNOUNCEMENT_COLUMNS,
          from:    ANNOUNCEMENT_FROM,
          order:   "a.created_at DESC, a.id DESC",
          target:  Target { exam: Some("a.exam_id"), holder: None },
        };
        let mut filter = Where::new();
        filter.scope(&scope, listing.target);
        filter.search(query.search_term(), &["a.title"]);
        fetch_page(conn, &listing, filter, &query, RawAnnouncement::from_row, |_, raw| {
          raw.into_announcement()
        })
      })
      .await
  }
}
