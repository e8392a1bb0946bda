//! Exams: scheduled sittings of one subject, owned by one admin and linked to
//! the leaders and members who sit them.

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
  Error, Result,
  auth::AuthContext,
  identity::{IdentityKey, Role},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Day {
  Monday,
  Tuesday,
  Wednesday,
  Thursday,
  Friday,
  Saturday,
  Sunday,
}

impl Day {
  pub fn as_str(self) -> &'static str {
    match self {
      Day::Monday => "Monday",
      Day::Tuesday => "Tuesday",
      Day::Wednesday => "Wednesday",
      Day::Thursday => "Thursday",
      Day::Friday => "Friday",
      Day::Saturday => "Saturday",
      Day::Sunday => "Sunday",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "Monday" => Ok(Day::Monday),
      "Tuesday" => Ok(Day::Tuesday),
      "Wednesday" => Ok(Day::Wednesday),
      "Thursday" => Ok(Day::Thursday),
      "Friday" => Ok(Day::Friday),
      "Saturday" => Ok(Day::Saturday),
      "Sunday" => Ok(Day::Sunday),
      other => Err(Error::UnknownVariant { kind: "day", value: other.to_owned() }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
  pub id:           i64,
  pub name:         String,
  pub date:         NaiveDate,
  pub start_time:   NaiveTime,
  pub end_time:     NaiveTime,
  pub day:          Day,
  pub subject_id:   i64,
  pub subject_name: String,
  pub admin_key:    IdentityKey,
  pub leader_keys:  Vec<IdentityKey>,
  pub member_keys:  Vec<IdentityKey>,
}

/// Body of `POST /exams` and `PUT /exams/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "end_after_start"))]
pub struct ExamInput {
  #[validate(length(min = 1, max = 100, message = "Name is required"))]
  pub name:        String,
  pub date:        NaiveDate,
  pub start_time:  NaiveTime,
  pub end_time:    NaiveTime,
  pub day:         Day,
  #[validate(range(min = 1, message = "Subject ID is required"))]
  pub subject_id:  i64,
  /// Owning admin. Defaults to the caller when the caller is an admin.
  pub admin_key:   Option<String>,
  #[serde(default)]
  pub leader_keys: Vec<String>,
  #[serde(default)]
  pub member_keys: Vec<String>,
}

fn end_after_start(input: &ExamInput) -> Result<(), ValidationError> {
  if input.end_time > input.start_time {
    Ok(())
  } else {
    Err(
      ValidationError::new("time_order")
        .with_message(Cow::Borrowed("End time must be after start time")),
    )
  }
}

/// A fully resolved exam ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExam {
  pub name:        String,
  pub date:        NaiveDate,
  pub start_time:  NaiveTime,
  pub end_time:    NaiveTime,
  pub day:         Day,
  pub subject_id:  i64,
  pub admin_key:   IdentityKey,
  pub leader_keys: Vec<IdentityKey>,
  pub member_keys: Vec<IdentityKey>,
}

impl ExamInput {
  /// Resolve ownership against the caller.
  ///
  /// Admins own the exams they create unless another admin is named. Leaders
  /// must name the owning admin and are linked to the exam themselves.
  pub fn resolve(self, ctx: &AuthContext) -> Result<NewExam> {
    let admin_key = match (self.admin_key.as_deref(), ctx.role) {
      (Some(raw), _) if !raw.trim().is_empty() => IdentityKey::normalize(raw),
      (_, Role::Admin) => ctx.key.clone(),
      _ => {
        return Err(Error::field(
          "admin_key",
          ValidationError::new("required")
            .with_message(Cow::Borrowed("Admin ID is required")),
        ));
      }
    };

    let mut leader_keys = normalize_all(&self.leader_keys);
    if ctx.role == Role::Leader && !leader_keys.contains(&ctx.key) {
      leader_keys.push(ctx.key.clone());
    }

    Ok(NewExam {
      name: self.name,
      date: self.date,
      start_time: self.start_time,
      end_time: self.end_time,
      day: self.day,
      subject_id: self.subject_id,
      admin_key,
      leader_keys,
      member_keys: normalize_all(&self.member_keys),
    })
  }
}

fn normalize_all(raw: &[String]) -> Vec<IdentityKey> {
  let mut keys: Vec<IdentityKey> = raw.iter().map(|k| IdentityKey::normalize(k)).collect();
  keys.sort();
  keys.dedup();
  keys
}
