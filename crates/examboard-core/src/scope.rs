//! Row scoping for listings.
//!
//! [`build_filter`] turns the caller's [`AuthContext`] into a [`Predicate`]
//! describing which rows of a listing they may see. Storage backends render
//! the predicate (plus the [`ListQuery`] search, filters and paging) into
//! their own query language and must read the count and the page in one read
//! transaction.

use serde::{Deserialize, Serialize};

use crate::{
  auth::AuthContext,
  identity::{IdentityKey, Role, Stream},
  result::ExamStatus,
};

/// Fixed page size of every listing.
pub const PAGE_SIZE: usize = 10;

/// The listings that can be scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
  Leaders,
  Members,
  Subjects,
  Exams,
  Results,
  Events,
  Announcements,
}

/// Which participant set of an exam (or which holder column of a result) a
/// key is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
  Leader,
  Member,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
  /// Every row.
  All,
  /// No row.
  Nothing,
  /// Rows linked to `key` through an exam's participant set: the exam row
  /// itself for exam listings, or the row's exam for events and
  /// announcements. With `include_unlinked`, rows with no exam also match.
  ExamLinked {
    key:              IdentityKey,
    via:              Participant,
    include_unlinked: bool,
  },
  /// Results held by `key` in the given holder column.
  HeldBy { key: IdentityKey, via: Participant },
}

/// Build the row predicate for `ctx` on `listing`.
pub fn build_filter(ctx: &AuthContext, listing: Listing) -> Predicate {
  let via = match ctx.role {
    Role::Admin => return Predicate::All,
    Role::Leader => Participant::Leader,
    Role::Member => Participant::Member,
  };
  let key = ctx.key.clone();

  match listing {
    Listing::Exams => Predicate::ExamLinked { key, via, include_unlinked: false },
    Listing::Events | Listing::Announcements => {
      Predicate::ExamLinked { key, via, include_unlinked: true }
    }
    Listing::Results => Predicate::HeldBy { key, via },
    Listing::Leaders | Listing::Members => match via {
      Participant::Leader => Predicate::All,
      Participant::Member => Predicate::Nothing,
    },
    Listing::Subjects => Predicate::Nothing,
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Search, filters and paging for a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListQuery {
  /// 1-based page index; `None` or `0` means the first page.
  pub page:     Option<usize>,
  /// Case-insensitive substring matched across the listing's text columns.
  pub search:   Option<String>,
  pub stream:   Option<Stream>,
  pub status:   Option<ExamStatus>,
  /// Page size override; defaults to [`PAGE_SIZE`].
  #[serde(skip)]
  pub per_page: Option<usize>,
}

impl ListQuery {
  pub fn page(&self) -> usize { self.page.filter(|p| *p > 0).unwrap_or(1) }

  pub fn limit(&self) -> usize { self.per_page.filter(|n| *n > 0).unwrap_or(PAGE_SIZE) }

  /// Rows before the requested page, or `None` when that does not fit an SQL
  /// `OFFSET`.
  pub fn offset(&self) -> Option<i64> {
    let rows = self.limit().checked_mul(self.page() - 1)?;
    i64::try_from(rows).ok()
  }

  /// The trimmed search term, if any.
  pub fn search_term(&self) -> Option<&str> {
    self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
  }
}

/// One page of a listing plus the total row count under the same filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
  pub data:  Vec<T>,
  pub count: u64,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::DisplayInfo;

  fn ctx(key: &str, role: Role) -> AuthContext {
    AuthContext { key: IdentityKey::normalize(key), role, display: DisplayInfo::default() }
  }

  #[test]
  fn admin_sees_everything() {
    let admin = ctx("ADM1", Role::Admin);
    for listing in [
      Listing::Leaders,
      Listing::Members,
      Listing::Subjects,
      Listing::Exams,
      Listing::Results,
      Listing::Events,
      Listing::Announcements,
    ] {
      assert_eq!(build_filter(&admin, listing), Predicate::All);
    }
  }

  #[test]
  fn exams_are_linked_only() {
    assert_eq!(
      build_filter(&ctx("L001", Role::Leader), Listing::Exams),
      Predicate::ExamLinked {
        key:              IdentityKey::normalize("L001"),
        via:              Participant::Leader,
        include_unlinked: false,
      }
    );
  }

  #[test]
  fn notices_include_general_rows() {
    for listing in [Listing::Events, Listing::Announcements] {
      assert_eq!(
        build_filter(&ctx("S200", Role::Member), listing),
        Predicate::ExamLinked {
          key:              IdentityKey::normalize("S200"),
          via:              Participant::Member,
          include_unlinked: true,
        }
      );
    }
  }

  #[test]
  fn results_are_held_by_caller() {
    assert_eq!(
      build_filter(&ctx("T100", Role::Leader), Listing::Results),
      Predicate::HeldBy { key: IdentityKey::normalize("T100"), via: Participant::Leader }
    );
    assert_eq!(
      build_filter(&ctx("S200", Role::Member), Listing::Results),
      Predicate::HeldBy { key: IdentityKey::normalize("S200"), via: Participant::Member }
    );
  }

  #[test]
  fn restricted_listings_yield_nothing() {
    assert_eq!(build_filter(&ctx("T100", Role::Leader), Listing::Subjects), Predicate::Nothing);
    assert_eq!(build_filter(&ctx("S200", Role::Member), Listing::Members), Predicate::Nothing);
    assert_eq!(build_filter(&ctx("T100", Role::Leader), Listing::Members), Predicate::All);
  }

  #[test]
  fn paging_is_one_based() {
    let q = ListQuery::default();
    assert_eq!((q.page(), q.offset(), q.limit()), (1, Some(0), PAGE_SIZE));

    let q = ListQuery { page: Some(3), ..Default::default() };
    assert_eq!(q.offset(), Some(20));

    let q = ListQuery { page: Some(0), ..Default::default() };
    assert_eq!(q.offset(), Some(0));
  }

  #[test]
  fn unrepresentable_pages_have_no_offset() {
    let q = ListQuery { page: Some(usize::MAX), ..Default::default() };
    assert_eq!(q.offset(), None);

    let q = ListQuery { page: Some(usize::MAX / PAGE_SIZE), ..Default::default() };
    assert_eq!(q.offset(), None);
  }

  #[test]
  fn blank_search_is_ignored() {
    let q = ListQuery { search: Some("   ".into()), ..Default::default() };
    assert_eq!(q.search_term(), None);
    let q = ListQuery { search: Some(" alg ".into()), ..Default::default() };
    assert_eq!(q.search_term(), Some("alg"));
  }
}
