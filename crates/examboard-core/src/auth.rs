//! The per-request authorization context.

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, IdentityKey, Role};

/// Display fields carried in the session next to the key and role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub school:     Option<String>,
}

/// Who is asking, resolved once per request from a verified session and
/// passed explicitly to every policy decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
  pub key:     IdentityKey,
  pub role:    Role,
  pub display: DisplayInfo,
}

impl AuthContext {
  /// Build the context for a freshly verified identity.
  pub fn for_identity(identity: &Identity) -> Self {
    let display = match identity {
      Identity::Admin(a) => DisplayInfo {
        first_name: a.username.clone(),
        ..DisplayInfo::default()
      },
      Identity::Leader(l) => DisplayInfo {
        first_name: l.person.first_name.clone(),
        last_name:  l.person.last_name.clone(),
        email:      l.person.email.clone(),
        phone:      Some(l.person.phone.clone()),
        school:     Some(l.school.clone()),
      },
      Identity::Member(m) => DisplayInfo {
        first_name: m.person.first_name.clone(),
        last_name:  m.person.last_name.clone(),
        email:      m.person.email.clone(),
        phone:      Some(m.person.phone.clone()),
        school:     None,
      },
    };

    Self { key: identity.key().clone(), role: identity.role(), display }
  }

  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
