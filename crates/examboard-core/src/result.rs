//! Exam results. A result belongs to exactly one exam and is held by exactly
//! one of a member or a leader.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
  Error, Result,
  identity::IdentityKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExamStatus {
  Pass,
  Fail,
  Absent,
}

impl ExamStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      ExamStatus::Pass => "PASS",
      ExamStatus::Fail => "FAIL",
      ExamStatus::Absent => "ABSENT",
    }
  }

  /// Case-insensitive, as the result listing's `status` filter is.
  pub fn parse(s: &str) -> Result<Self> {
    match s.to_ascii_uppercase().as_str() {
      "PASS" => Ok(ExamStatus::Pass),
      "FAIL" => Ok(ExamStatus::Fail),
      "ABSENT" => Ok(ExamStatus::Absent),
      _ => Err(Error::UnknownVariant { kind: "exam status", value: s.to_owned() }),
    }
  }
}

/// Who a result belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum ResultHolder {
  Member(IdentityKey),
  Leader(IdentityKey),
}

impl ResultHolder {
  /// Build from the two optional wire fields. Exactly one must be present.
  pub fn from_parts(
    member: Option<&str>,
    leader: Option<&str>,
  ) -> Result<Self, ValidationError> {
    let member = member.filter(|k| !k.trim().is_empty());
    let leader = leader.filter(|k| !k.trim().is_empty());
    match (member, leader) {
      (Some(m), None) => Ok(ResultHolder::Member(IdentityKey::normalize(m))),
      (None, Some(l)) => Ok(ResultHolder::Leader(IdentityKey::normalize(l))),
      (Some(_), Some(_)) => Err(
        ValidationError::new("holder_exclusive")
          .with_message(Cow::Borrowed("Only one of member_key or leader_key may be provided")),
      ),
      (None, None) => Err(
        ValidationError::new("holder_required")
          .with_message(Cow::Borrowed("Either member_key or leader_key must be provided")),
      ),
    }
  }

  pub fn key(&self) -> &IdentityKey {
    match self {
      ResultHolder::Member(k) | ResultHolder::Leader(k) => k,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
  pub id:          i64,
  pub score:       f64,
  pub status:      ExamStatus,
  pub exam_id:     i64,
  pub exam_name:   String,
  pub holder:      ResultHolder,
  /// "First Last" of the holder.
  pub holder_name: String,
  pub created_at:  DateTime<Utc>,
}

/// Body of `POST /results` and `PUT /results/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "holder_is_exclusive"))]
pub struct ResultInput {
  #[validate(range(min = 0.0, message = "Score must be positive"))]
  pub score:      f64,
  pub status:     ExamStatus,
  #[validate(range(min = 1, message = "Exam ID is required"))]
  pub exam_id:    i64,
  pub member_key: Option<String>,
  pub leader_key: Option<String>,
}

fn holder_is_exclusive(input: &ResultInput) -> Result<(), ValidationError> {
  ResultHolder::from_parts(input.member_key.as_deref(), input.leader_key.as_deref())
    .map(|_| ())
}

/// A validated result ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
  pub score:   f64,
  pub status:  ExamStatus,
  pub exam_id: i64,
  pub holder:  ResultHolder,
}

impl ResultInput {
  /// Validate every field and the holder rule, then build the draft.
  pub fn into_new(self) -> Result<NewResult> {
    self.validate()?;
    let holder =
      ResultHolder::from_parts(self.member_key.as_deref(), self.leader_key.as_deref())
        .map_err(|e| Error::field("holder", e))?;
    Ok(NewResult {
      score: self.score,
      status: self.status,
      exam_id: self.exam_id,
      holder,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn input(member: Option<&str>, leader: Option<&str>) -> ResultInput {
    ResultInput {
      score:      72.5,
      status:     ExamStatus::Pass,
      exam_id:    1,
      member_key: member.map(Into::into),
      leader_key: leader.map(Into::into),
    }
  }

  #[test]
  fn both_holders_is_invalid() {
    assert!(input(Some("S200"), Some("T100")).validate().is_err());
    assert!(input(Some("S200"), Some("T100")).into_new().is_err());
  }

  #[test]
  fn neither_holder_is_invalid() {
    assert!(input(None, None).validate().is_err());
    assert!(input(Some("  "), None).into_new().is_err());
  }

  #[test]
  fn exactly_one_holder_is_valid() {
    let r = input(Some("s200"), None).into_new().unwrap();
    assert_eq!(r.holder, ResultHolder::Member(IdentityKey::normalize("S200")));

    let r = input(None, Some("t100")).into_new().unwrap();
    assert_eq!(r.holder, ResultHolder::Leader(IdentityKey::normalize("T100")));
  }

  #[test]
  fn negative_score_is_invalid() {
    let mut i = input(Some("S200"), None);
    i.score = -1.0;
    assert!(i.into_new().is_err());
  }

  #[test]
  fn status_parse_is_case_insensitive() {
    assert_eq!(ExamStatus::parse("pass").unwrap(), ExamStatus::Pass);
    assert_eq!(ExamStatus::parse("ABSENT").unwrap(), ExamStatus::Absent);
    assert!(ExamStatus::parse("late").is_err());
  }
}
