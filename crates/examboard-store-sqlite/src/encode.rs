//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order equals chronological order. Dates are `YYYY-MM-DD`
//! and times `HH:MM:SS`. Closed sets are stored as their wire spelling.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use examboard_core::{
  exam::{Day, Exam},
  identity::{Admin, Gender, Identity, IdentityKey, Leader, Member, Person, Role, Stream},
  notice::{Announcement, Event},
  result::{ExamResult, ExamStatus, ResultHolder},
  subject::Subject,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate / NaiveTime ───────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_time(t: NaiveTime) -> String { t.format("%H:%M:%S").to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Optional closed sets ────────────────────────────────────────────────────

fn decode_stream(s: Option<&str>) -> Result<Option<Stream>> {
  Ok(s.map(Stream::parse).transpose()?)
}

fn decode_gender(s: Option<&str>) -> Result<Gender> {
  Ok(s.map(Gender::parse).transpose()?.unwrap_or_default())
}

/// Unknown role tags are ignored and the variant default applies.
fn decode_role(s: Option<&str>) -> Option<Role> { s.and_then(Role::parse) }

fn required<T>(value: Option<T>, column: &'static str) -> Result<T> {
  value.ok_or(Error::MissingColumn(column))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawIdentity`]'s field order.
pub const IDENTITY_COLUMNS: &str = "i.identity_key, i.kind, i.username, i.first_name, \
   i.last_name, i.email, i.phone, i.address, i.gender, i.school, i.stream, i.leader_key, \
   i.role, i.secret_hash, i.created_at";

/// Raw values read directly from an `identities` row.
pub struct RawIdentity {
  pub identity_key: String,
  pub kind:         String,
  pub username:     Option<String>,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub address:      Option<String>,
  pub gender:       Option<String>,
  pub school:       Option<String>,
  pub stream:       Option<String>,
  pub leader_key:   Option<String>,
  pub role:         Option<String>,
  pub secret_hash:  Option<String>,
  pub created_at:   String,
}

impl RawIdentity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_key: row.get(0)?,
      kind:         row.get(1)?,
      username:     row.get(2)?,
      first_name:   row.get(3)?,
      last_name:    row.get(4)?,
      email:        row.get(5)?,
      phone:        row.get(6)?,
      address:      row.get(7)?,
      gender:       row.get(8)?,
      school:       row.get(9)?,
      stream:       row.get(10)?,
      leader_key:   row.get(11)?,
      role:         row.get(12)?,
      secret_hash:  row.get(13)?,
      created_at:   row.get(14)?,
    })
  }

  /// Stored key values are already normalized.
  fn key(&self) -> IdentityKey { IdentityKey::normalize(&self.identity_key) }

  fn person(&self) -> Result<Person> {
    Ok(Person {
      first_name: self.first_name.clone(),
      last_name:  self.last_name.clone(),
      email:      self.email.clone(),
      phone:      self.phone.clone().unwrap_or_default(),
      address:    self.address.clone(),
      gender:     decode_gender(self.gender.as_deref())?,
    })
  }

  pub fn into_identity(self, subject_ids: Vec<i64>) -> Result<Identity> {
    let key = self.key();
    match self.kind.as_str() {
      "admin" => Ok(Identity::Admin(Admin { key, username: self.username.unwrap_or_default() })),
      "leader" => Ok(Identity::Leader(Leader {
        key,
        person: self.person()?,
        stream: required(decode_stream(self.stream.as_deref())?, "stream")?,
        role: decode_role(self.role.as_deref()),
        created_at: decode_dt(&self.created_at)?,
        username: required(self.username, "username")?,
        school: self.school.unwrap_or_default(),
        subject_ids,
      })),
      "member" => Ok(Identity::Member(Member {
        key,
        person: self.person()?,
        leader_key: IdentityKey::normalize(&required(self.leader_key.clone(), "leader_key")?),
        stream: required(decode_stream(self.stream.as_deref())?, "stream")?,
        role: decode_role(self.role.as_deref()),
        subject_ids,
        created_at: decode_dt(&self.created_at)?,
      })),
      other => Err(Error::UnknownKind(other.to_owned())),
    }
  }
}

pub const SUBJECT_COLUMNS: &str = "s.id, s.name, s.stream";

pub struct RawSubject {
  pub id:     i64,
  pub name:   String,
  pub stream: Option<String>,
}

impl RawSubject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { id: row.get(0)?, name: row.get(1)?, stream: row.get(2)? })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject { id: self.id, name: self.name, stream: decode_stream(self.stream.as_deref())? })
  }
}

pub const EXAM_COLUMNS: &str =
  "e.id, e.name, e.date, e.start_time, e.end_time, e.day, e.subject_id, s.name, e.admin_key";

pub struct RawExam {
  pub id:           i64,
  pub name:         String,
  pub date:         String,
  pub start_time:   String,
  pub end_time:     String,
  pub day:          String,
  pub subject_id:   i64,
  pub subject_name: String,
  pub admin_key:    String,
}

impl RawExam {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      name:         row.get(1)?,
      date:         row.get(2)?,
      start_time:   row.get(3)?,
      end_time:     row.get(4)?,
      day:          row.get(5)?,
      subject_id:   row.get(6)?,
      subject_name: row.get(7)?,
      admin_key:    row.get(8)?,
    })
  }

  pub fn into_exam(
    self,
    leader_keys: Vec<IdentityKey>,
    member_keys: Vec<IdentityKey>,
  ) -> Result<Exam> {
    Ok(Exam {
      id: self.id,
      name: self.name,
      date: decode_date(&self.date)?,
      start_time: decode_time(&self.start_time)?,
      end_time: decode_time(&self.end_time)?,
      day: Day::parse(&self.day)?,
      subject_id: self.subject_id,
      subject_name: self.subject_name,
      admin_key: IdentityKey::normalize(&self.admin_key),
      leader_keys,
      member_keys,
    })
  }
}

pub const RESULT_COLUMNS: &str = "r.id, r.score, r.status, r.exam_id, e.name, r.member_key, \
   r.leader_key, COALESCE(m.first_name || ' ' || m.last_name, \
   l.first_name || ' ' || l.last_name, ''), r.created_at";

pub struct RawResult {
  pub id:          i64,
  pub score:       f64,
  pub status:      String,
  pub exam_id:     i64,
  pub exam_name:   String,
  pub member_key:  Option<String>,
  pub leader_key:  Option<String>,
  pub holder_name: String,
  pub created_at:  String,
}

impl RawResult {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      score:       row.get(1)?,
      status:      row.get(2)?,
      exam_id:     row.get(3)?,
      exam_name:   row.get(4)?,
      member_key:  row.get(5)?,
      leader_key:  row.get(6)?,
      holder_name: row.get(7)?,
      created_at:  row.get(8)?,
    })
  }

  pub fn into_result(self) -> Result<ExamResult> {
    let holder = match (self.member_key, self.leader_key) {
      (Some(m), None) => ResultHolder::Member(IdentityKey::normalize(&m)),
      (None, Some(l)) => ResultHolder::Leader(IdentityKey::normalize(&l)),
      _ => return Err(Error::MissingColumn("member_key/leader_key")),
    };
    Ok(ExamResult {
      id: self.id,
      score: self.score,
      status: ExamStatus::parse(&self.status)?,
      exam_id: self.exam_id,
      exam_name: self.exam_name,
      holder,
      holder_name: self.holder_name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const EVENT_COLUMNS: &str = "v.id, v.title, v.description, v.start_time, v.exam_id, e.name";

pub struct RawEvent {
  pub id:          i64,
  pub title:       String,
  pub description: Option<String>,
  pub start_time:  String,
  pub exam_id:     Option<i64>,
  pub exam_name:   Option<String>,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      title:       row.get(1)?,
      description: row.get(2)?,
      start_time:  row.get(3)?,
      exam_id:     row.get(4)?,
      exam_name:   row.get(5)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:          self.id,
      title:       self.title,
      description: self.description,
      start_time:  decode_dt(&self.start_time)?,
      exam_id:     self.exam_id,
      exam_name:   self.exam_name,
    })
  }
}

pub const ANNOUNCEMENT_COLUMNS: &str =
  "a.id, a.title, a.description, a.exam_id, e.name, a.created_at";

pub struct RawAnnouncement {
  pub id:          i64,
  pub title:       String,
  pub description: Option<String>,
  pub exam_id:     Option<i64>,
  pub exam_name:   Option<String>,
  pub created_at:  String,
}

impl RawAnnouncement {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      title:       row.get(1)?,
      description: row.get(2)?,
      exam_id:     row.get(3)?,
      exam_name:   row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_announcement(self) -> Result<Announcement> {
    Ok(Announcement {
      id:          self.id,
      title:       self.title,
      description: self.description,
      exam_id:     self.exam_id,
      exam_name:   self.exam_name,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
