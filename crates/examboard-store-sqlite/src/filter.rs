//! Rendering of scoped predicates, search and filters into SQL `WHERE`
//! clauses with positional parameters.

use examboard_core::scope::{Participant, Predicate};
use rusqlite::types::Value;

/// Columns of a listing query that predicates can be rendered against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Target {
  /// Column holding the exam id the row is linked through.
  pub exam:   Option<&'static str>,
  /// `(leader column, member column)` of a result holder.
  pub holder: Option<(&'static str, &'static str)>,
}

/// Accumulated `AND`ed conditions and their parameters.
#[derive(Debug, Default)]
pub struct Where {
  conds:  Vec<String>,
  params: Vec<Value>,
}

fn link_table(via: Participant) -> (&'static str, &'static str) {
  match via {
    Participant::Leader => ("exam_leaders", "leader_key"),
    Participant::Member => ("exam_members", "member_key"),
  }
}

/// Escape LIKE wildcards in a search term; `\` is the escape character.
///
/// Only ASCII letters are folded, the same as SQLite's `LOWER()` and `LIKE`.
pub fn like_pattern(term: &str) -> String {
  let mut out = String::with_capacity(term.len() + 2);
  out.push('%');
  for c in term.to_ascii_lowercase().chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

impl Where {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, cond: impl Into<String>, params: impl IntoIterator<Item = Value>) {
    self.conds.push(cond.into());
    self.params.extend(params);
  }

  /// Restrict rows to `pred`. A predicate the target has no columns for
  /// matches nothing.
  pub fn scope(&mut self, pred: &Predicate, target: Target) {
    match pred {
      Predicate::All => {}
      Predicate::Nothing => self.deny(),

      Predicate::ExamLinked { key, via, include_unlinked } => {
        let Some(col) = target.exam else { return self.deny() };
        let (table, column) = link_table(*via);
        let linked = format!("{col} IN (SELECT exam_id FROM {table} WHERE {column} = ?)");
        let cond = if *include_unlinked {
          format!("({col} IS NULL OR {linked})")
        } else {
          linked
        };
        self.push(cond, [Value::Text(key.as_str().to_owned())]);
      }

      Predicate::HeldBy { key, via } => {
        let Some((leader, member)) = target.holder else { return self.deny() };
        let col = match via {
          Participant::Leader => leader,
          Participant::Member => member,
        };
        self.push(format!("{col} = ?"), [Value::Text(key.as_str().to_owned())]);
      }
    }
  }

  /// Case-insensitive substring match over any of `columns`.
  pub fn search(&mut self, term: Option<&str>, columns: &[&str]) {
    let Some(term) = term else { return };
    if columns.is_empty() {
      return;
    }
    let pattern = like_pattern(term);
    let cond = columns
      .iter()
      .map(|c| format!("LOWER({c}) LIKE ? ESCAPE '\\'"))
      .collect::<Vec<_>>()
      .join(" OR ");
    self.push(
      format!("({cond})"),
      std::iter::repeat_n(Value::Text(pattern), columns.len()),
    );
  }

  /// `column = value` when `value` is present.
  pub fn eq(&mut self, column: &str, value: Option<&str>) {
    if let Some(v) = value {
      self.push(format!("{column} = ?"), [Value::Text(v.to_owned())]);
    }
  }

  fn deny(&mut self) { self.conds.push("0".to_owned()); }

  /// `WHERE a AND b ...`, or an empty string.
  pub fn render(&self) -> String {
    if self.conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", self.conds.join(" AND "))
    }
  }

  pub fn params(&self) -> &[Value] { &self.params }
}
