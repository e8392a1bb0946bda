//! Identities: the people (and the admin accounts) that can hold a session.
//!
//! Leaders, members and admins share one key space. The key is a national
//! identity number stored uppercase; [`IdentityKey::normalize`] is the only
//! way raw input becomes a key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{Error, Result, validate as check};

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The identity key (NIC). Always trimmed and uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
  /// Trim and case-fold raw input to the stored convention.
  pub fn normalize(raw: &str) -> Self { Self(raw.trim().to_uppercase()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for IdentityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Closed sets ─────────────────────────────────────────────────────────────

/// The role an authenticated identity acts under.
///
/// `suser` and `user` are accepted as legacy spellings of `leader` and
/// `member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  #[serde(alias = "suser")]
  Leader,
  #[serde(alias = "user")]
  Member,
}

impl Role {
  pub const ALL: [Role; 3] = [Role::Admin, Role::Leader, Role::Member];

  pub fn as_str(self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::Leader => "leader",
      Role::Member => "member",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "admin" => Some(Role::Admin),
      "leader" | "suser" => Some(Role::Leader),
      "member" | "user" => Some(Role::Member),
      _ => None,
    }
  }

  /// Landing page for the role after login.
  pub fn dashboard(self) -> &'static str {
    match self {
      Role::Admin => "/admin",
      Role::Leader => "/Suser",
      Role::Member => "/user",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Curriculum stream. `None` at use sites means common to all streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stream {
  Maths,
  Bio,
}

impl Stream {
  pub fn as_str(self) -> &'static str {
    match self {
      Stream::Maths => "MATHS",
      Stream::Bio => "BIO",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "MATHS" => Ok(Stream::Maths),
      "BIO" => Ok(Stream::Bio),
      other => Err(Error::UnknownVariant { kind: "stream", value: other.to_owned() }),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
  #[default]
  Male,
  Female,
}

impl Gender {
  pub fn as_str(self) -> &'static str {
    match self {
      Gender::Male => "MALE",
      Gender::Female => "FEMALE",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "MALE" => Ok(Gender::Male),
      "FEMALE" => Ok(Gender::Female),
      other => Err(Error::UnknownVariant { kind: "gender", value: other.to_owned() }),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Personal fields shared by leaders and members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      String,
  pub address:    Option<String>,
  pub gender:     Gender,
}

/// A team leader (teacher). Owns a set of members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
  pub key:         IdentityKey,
  pub username:    String,
  #[serde(flatten)]
  pub person:      Person,
  pub school:      String,
  pub stream:      Stream,
  /// Explicit role tag, if one was stored.
  pub role:        Option<Role>,
  pub subject_ids: Vec<i64>,
  pub created_at:  DateTime<Utc>,
}

/// A team member (student). Belongs to exactly one leader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
  pub key:         IdentityKey,
  #[serde(flatten)]
  pub person:      Person,
  pub leader_key:  IdentityKey,
  pub stream:      Stream,
  pub role:        Option<Role>,
  pub subject_ids: Vec<i64>,
  pub created_at:  DateTime<Utc>,
}

/// An administrator account. Has no password login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
  pub key:      IdentityKey,
  pub username: String,
}

/// Discriminator of [`Identity`], also used to address a variant in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
  Admin,
  Leader,
  Member,
}

impl IdentityKind {
  pub fn as_str(self) -> &'static str {
    match self {
      IdentityKind::Admin => "admin",
      IdentityKind::Leader => "leader",
      IdentityKind::Member => "member",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "admin" => Ok(IdentityKind::Admin),
      "leader" => Ok(IdentityKind::Leader),
      "member" => Ok(IdentityKind::Member),
      other => Err(Error::UnknownVariant { kind: "identity kind", value: other.to_owned() }),
    }
  }
}

/// Any identity, as one tagged union over a single key space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
  Admin(Admin),
  Leader(Leader),
  Member(Member),
}

impl Identity {
  pub fn key(&self) -> &IdentityKey {
    match self {
      Identity::Admin(a) => &a.key,
      Identity::Leader(l) => &l.key,
      Identity::Member(m) => &m.key,
    }
  }

  pub fn kind(&self) -> IdentityKind {
    match self {
      Identity::Admin(_) => IdentityKind::Admin,
      Identity::Leader(_) => IdentityKind::Leader,
      Identity::Member(_) => IdentityKind::Member,
    }
  }

  /// The explicit stored role if present, otherwise the variant's default.
  pub fn role(&self) -> Role {
    match self {
      Identity::Admin(_) => Role::Admin,
      Identity::Leader(l) => l.role.unwrap_or(Role::Leader),
      Identity::Member(m) => m.role.unwrap_or(Role::Member),
    }
  }
}

/// A stored identity together with its password hash (argon2 PHC string).
#[derive(Debug, Clone)]
pub struct Credential {
  pub identity:    Identity,
  pub secret_hash: String,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Body of the public leader self-registration endpoint.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LeaderRegistration {
  #[validate(
    length(min = 1, max = 12, message = "NIC can have maximum 12 characters"),
    custom(function = "check::registration_key")
  )]
  #[serde(alias = "NIC")]
  pub nic:          String,
  #[validate(
    length(min = 3, max = 30, message = "Username must be 3-30 characters"),
    custom(function = "check::username")
  )]
  pub username:     String,
  #[validate(length(min = 1, message = "First name is required"))]
  pub first_name:   String,
  #[validate(length(min = 1, message = "Last name is required"))]
  pub last_name:    String,
  #[validate(email(message = "Invalid email"))]
  pub email:        String,
  #[validate(custom(function = "check::phone_number"))]
  pub phone_number: String,
  #[validate(length(min = 1, message = "School is required"))]
  pub school:       String,
  #[validate(
    length(min = 8, message = "Password must be at least 8 characters"),
    custom(function = "check::strong_password")
  )]
  pub password:     String,
  pub gender:       Option<Gender>,
  pub stream:       Option<Stream>,
}

impl LeaderRegistration {
  /// The persistable draft; registered leaders carry an explicit role tag.
  pub fn into_draft(self, secret_hash: String) -> LeaderDraft {
    LeaderDraft {
      key: IdentityKey::normalize(&self.nic),
      username: self.username,
      person: Person {
        first_name: self.first_name,
        last_name:  self.last_name,
        email:      Some(self.email),
        phone:      self.phone_number,
        address:    None,
        gender:     self.gender.unwrap_or_default(),
      },
      school: self.school,
      stream: self.stream.unwrap_or(Stream::Maths),
      role: Some(Role::Leader),
      subject_ids: Vec::new(),
      secret_hash,
    }
  }
}

/// Admin-side leader creation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LeaderInput {
  #[validate(length(min = 1, max = 12, message = "NIC is required"))]
  pub key:         String,
  #[validate(
    length(min = 3, max = 50, message = "Username must be at least 3 characters"),
    custom(function = "check::username")
  )]
  pub username:    String,
  #[validate(nested)]
  #[serde(flatten)]
  pub person:      PersonInput,
  #[validate(
    length(min = 1, max = 100, message = "School is required"),
    custom(function = "check::not_blank")
  )]
  pub school:      String,
  pub stream:      Stream,
  #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
  pub password:    String,
  #[serde(default)]
  pub subject_ids: Vec<i64>,
}

impl LeaderInput {
  pub fn into_draft(self, secret_hash: String) -> LeaderDraft {
    LeaderDraft {
      key: IdentityKey::normalize(&self.key),
      username: self.username,
      person: self.person.into(),
      school: self.school,
      stream: self.stream,
      role: None,
      subject_ids: self.subject_ids,
      secret_hash,
    }
  }
}

/// Admin-side member creation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MemberInput {
  #[validate(length(min = 1, max = 12, message = "NIC is required"))]
  pub key:         String,
  #[validate(nested)]
  #[serde(flatten)]
  pub person:      PersonInput,
  #[validate(length(min = 1, message = "Leader ID is required"))]
  pub leader_key:  String,
  pub stream:      Stream,
  #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
  pub password:    String,
  #[serde(default)]
  pub subject_ids: Vec<i64>,
}

impl MemberInput {
  pub fn into_draft(self, secret_hash: String) -> MemberDraft {
    MemberDraft {
      key: IdentityKey::normalize(&self.key),
      person: self.person.into(),
      leader_key: IdentityKey::normalize(&self.leader_key),
      stream: self.stream,
      role: None,
      subject_ids: self.subject_ids,
      secret_hash,
    }
  }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersonInput {
  #[validate(length(min = 1, max = 100, message = "First name is required"))]
  pub first_name: String,
  #[validate(length(min = 1, max = 100, message = "Last name is required"))]
  pub last_name:  String,
  #[validate(email(message = "Invalid email"), length(max = 100))]
  pub email:      String,
  #[validate(length(min = 1, max = 20, message = "Phone number is required"))]
  pub phone:      String,
  #[validate(length(max = 200))]
  pub address:    Option<String>,
  #[serde(default)]
  pub gender:     Gender,
}

impl From<PersonInput> for Person {
  fn from(p: PersonInput) -> Self {
    Person {
      first_name: p.first_name,
      last_name:  p.last_name,
      email:      Some(p.email),
      phone:      p.phone,
      address:    p.address,
      gender:     p.gender,
    }
  }
}

/// Replacement fields for `PUT /leaders/{key}`. Key and password are fixed.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LeaderUpdate {
  #[validate(
    length(min = 3, max = 50, message = "Username must be at least 3 characters"),
    custom(function = "check::username")
  )]
  pub username:    String,
  #[validate(nested)]
  #[serde(flatten)]
  pub person:      PersonInput,
  #[validate(length(min = 1, max = 100, message = "School is required"))]
  pub school:      String,
  pub stream:      Stream,
  #[serde(default)]
  pub subject_ids: Vec<i64>,
}

/// Replacement fields for `PUT /members/{key}`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MemberUpdate {
  #[validate(nested)]
  #[serde(flatten)]
  pub person:      PersonInput,
  #[validate(length(min = 1, message = "Leader ID is required"))]
  pub leader_key:  String,
  pub stream:      Stream,
  #[serde(default)]
  pub subject_ids: Vec<i64>,
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

/// A validated leader ready to persist. The secret is already hashed.
#[derive(Debug, Clone)]
pub struct LeaderDraft {
  pub key:         IdentityKey,
  pub username:    String,
  pub person:      Person,
  pub school:      String,
  pub stream:      Stream,
  pub role:        Option<Role>,
  pub subject_ids: Vec<i64>,
  pub secret_hash: String,
}

/// A validated member ready to persist. The secret is already hashed.
#[derive(Debug, Clone)]
pub struct MemberDraft {
  pub key:         IdentityKey,
  pub person:      Person,
  pub leader_key:  IdentityKey,
  pub stream:      Stream,
  pub role:        Option<Role>,
  pub subject_ids: Vec<i64>,
  pub secret_hash: String,
}
