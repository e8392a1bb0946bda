//! Calendar events and announcements. Either may be tied to an exam; those
//! without one are general and visible to everyone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub id:          i64,
  pub title:       String,
  pub description: Option<String>,
  pub start_time:  DateTime<Utc>,
  pub exam_id:     Option<i64>,
  pub exam_name:   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
  pub id:          i64,
  pub title:       String,
  pub description: Option<String>,
  pub exam_id:     Option<i64>,
  pub exam_name:   Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Body of `POST /events` and `PUT /events/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EventInput {
  #[validate(length(min = 1, max = 100, message = "Title is required"))]
  pub title:       String,
  #[validate(length(max = 500))]
  pub description: Option<String>,
  pub start_time:  DateTime<Utc>,
  #[validate(range(min = 1))]
  pub exam_id:     Option<i64>,
}

/// Body of `POST /announcements` and `PUT /announcements/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnnouncementInput {
  #[validate(length(min = 1, max = 100, message = "Title is required"))]
  pub title:       String,
  #[validate(length(max = 500))]
  pub description: Option<String>,
  #[validate(range(min = 1))]
  pub exam_id:     Option<i64>,
}
