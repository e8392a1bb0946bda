//! The mutation authorizer: a fixed table of which roles may create, update
//! or delete each entity type. Evaluated before any store call.

use std::fmt;

use serde::Serialize;

use crate::{auth::AuthContext, identity::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Create,
  Update,
  Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
  Subject,
  Exam,
  Leader,
  Member,
  Result,
  Event,
  Announcement,
}

impl Entity {
  pub const ALL: [Entity; 7] = [
    Entity::Subject,
    Entity::Exam,
    Entity::Leader,
    Entity::Member,
    Entity::Result,
    Entity::Event,
    Entity::Announcement,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Entity::Subject => "subject",
      Entity::Exam => "exam",
      Entity::Leader => "leader",
      Entity::Member => "member",
      Entity::Result => "result",
      Entity::Event => "event",
      Entity::Announcement => "announcement",
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Action::Create => "create",
      Action::Update => "update",
      Action::Delete => "delete",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  Allowed,
  Denied(DenyReason),
}

impl Decision {
  pub fn is_allowed(&self) -> bool { matches!(self, Decision::Allowed) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyReason {
  pub role:   Role,
  pub action: Action,
  pub entity: Entity,
}

impl fmt::Display for DenyReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "role {} may not {} {}", self.role, self.action, self.entity.as_str())
  }
}

const STAFF: &[Role] = &[Role::Admin, Role::Leader];
const ADMIN: &[Role] = &[Role::Admin];

/// Roles permitted to perform `action` on `entity`.
pub fn allowed_roles(action: Action, entity: Entity) -> &'static [Role] {
  match (entity, action) {
    (_, Action::Delete) => ADMIN,
    (Entity::Leader | Entity::Member, _) => ADMIN,
    (
      Entity::Subject | Entity::Exam | Entity::Result | Entity::Event | Entity::Announcement,
      Action::Create | Action::Update,
    ) => STAFF,
  }
}

pub fn authorize(ctx: &AuthContext, action: Action, entity: Entity) -> Decision {
  if allowed_roles(action, entity).contains(&ctx.role) {
    Decision::Allowed
  } else {
    Decision::Denied(DenyReason { role: ctx.role, action, entity })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{auth::DisplayInfo, identity::IdentityKey};

  fn ctx(role: Role) -> AuthContext {
    AuthContext { key: IdentityKey::normalize("K1"), role, display: DisplayInfo::default() }
  }

  #[test]
  fn admin_may_do_everything() {
    for entity in Entity::ALL {
      for action in [Action::Create, Action::Update, Action::Delete] {
        assert!(authorize(&ctx(Role::Admin), action, entity).is_allowed());
      }
    }
  }

  #[test]
  fn members_may_do_nothing() {
    for entity in Entity::ALL {
      for action in [Action::Create, Action::Update, Action::Delete] {
        assert!(!authorize(&ctx(Role::Member), action, entity).is_allowed());
      }
    }
  }

  #[test]
  fn leaders_write_but_never_delete() {
    let leader = ctx(Role::Leader);
    for entity in [Entity::Subject, Entity::Exam, Entity::Result, Entity::Event, Entity::Announcement] {
      assert!(authorize(&leader, Action::Create, entity).is_allowed());
      assert!(authorize(&leader, Action::Update, entity).is_allowed());
      assert!(!authorize(&leader, Action::Delete, entity).is_allowed());
    }
  }

  #[test]
  fn identity_records_are_admin_only() {
    let leader = ctx(Role::Leader);
    for entity in [Entity::Leader, Entity::Member] {
      for action in [Action::Create, Action::Update, Action::Delete] {
        assert_eq!(
          authorize(&leader, action, entity),
          Decision::Denied(DenyReason { role: Role::Leader, action, entity })
        );
      }
    }
  }
}
