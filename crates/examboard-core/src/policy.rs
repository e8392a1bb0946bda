//! The route access table: which roles may open which page route.
//!
//! Pure data plus lookup. Anything not in the table is denied.

use crate::identity::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
  /// `/`, which only redirects to the caller's dashboard.
  Home,
  AdminDashboard,
  LeaderDashboard,
  MemberDashboard,
  Leaders,
  Members,
  Subjects,
  Exams,
  Results,
  Events,
  Announcements,
}

const EVERYONE: &[Role] = &[Role::Admin, Role::Leader, Role::Member];
const STAFF: &[Role] = &[Role::Admin, Role::Leader];
const ADMIN: &[Role] = &[Role::Admin];
const LEADER: &[Role] = &[Role::Leader];
const MEMBER: &[Role] = &[Role::Member];

impl Route {
  pub const ALL: [Route; 11] = [
    Route::Home,
    Route::AdminDashboard,
    Route::LeaderDashboard,
    Route::MemberDashboard,
    Route::Leaders,
    Route::Members,
    Route::Subjects,
    Route::Exams,
    Route::Results,
    Route::Events,
    Route::Announcements,
  ];

  /// Canonical path. Sub-paths (`/list/leaders/{id}`) belong to the route.
  pub fn path(self) -> &'static str {
    match self {
      Route::Home => "/",
      Route::AdminDashboard => "/admin",
      Route::LeaderDashboard => "/Suser",
      Route::MemberDashboard => "/user",
      Route::Leaders => "/list/leaders",
      Route::Members => "/list/members",
      Route::Subjects => "/list/subjects",
      Route::Exams => "/list/exams",
      Route::Results => "/list/results",
      Route::Events => "/list/events",
      Route::Announcements => "/list/announcements",
    }
  }

  pub fn allowed_roles(self) -> &'static [Role] {
    match self {
      Route::Home => EVERYONE,
      Route::AdminDashboard => ADMIN,
      Route::LeaderDashboard => LEADER,
      Route::MemberDashboard => MEMBER,
      Route::Leaders | Route::Members => STAFF,
      Route::Subjects => ADMIN,
      Route::Exams | Route::Results | Route::Events | Route::Announcements => EVERYONE,
    }
  }

  pub fn allows(self, role: Role) -> bool { self.allowed_roles().contains(&role) }

  /// Map a request path onto the table. Matching ignores ASCII case and a
  /// trailing slash; `/` only matches itself.
  pub fn resolve(path: &str) -> Option<Route> {
    if path == "/" {
      return Some(Route::Home);
    }
    let path = path.strip_suffix('/').unwrap_or(path);

    Route::ALL
      .into_iter()
      .filter(|r| *r != Route::Home)
      .find(|r| {
        let canonical = r.path();
        match path.get(..canonical.len()) {
          Some(head) if head.eq_ignore_ascii_case(canonical) => {
            let rest = &path[canonical.len()..];
            rest.is_empty() || rest.starts_with('/')
          }
          _ => false,
        }
      })
  }
}

/// Whether `role` may open `path`. Unknown paths are denied.
pub fn is_allowed(role: Role, path: &str) -> bool {
  Route::resolve(path).is_some_and(|r| r.allows(role))
}
