//! Fixed-window limiter for login attempts, keyed by normalized identifier.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Duration, Utc};

/// Outcome of [`LoginLimiter::check_and_increment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
  Allowed { remaining: u32 },
  Exceeded { retry_after: Duration },
}

impl Attempt {
  pub fn is_allowed(&self) -> bool { matches!(self, Attempt::Allowed { .. }) }
}

#[derive(Debug, Clone)]
struct Window {
  count: u32,
  start: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Table {
  windows:    HashMap<String, Window>,
  last_sweep: Option<DateTime<Utc>>,
}

impl Table {
  /// Drop expired windows, at most once per window length.
  fn sweep(&mut self, now: DateTime<Utc>, window: Duration) {
    if self.last_sweep.is_some_and(|at| now < at + window) {
      return;
    }
    self.windows.retain(|_, w| now < w.start + window);
    self.last_sweep = Some(now);
  }
}

#[derive(Debug)]
pub struct LoginLimiter {
  max_attempts: u32,
  window:       Duration,
  state:        Mutex<Table>,
}

impl LoginLimiter {
  /// `max_attempts == 0` disables limiting.
  pub fn new(max_attempts: u32, window_seconds: u64) -> Self {
    let seconds = i64::try_from(window_seconds).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
    Self {
      max_attempts,
      window: Duration::seconds(seconds),
      state: Mutex::new(Table::default()),
    }
  }

  pub fn check_and_increment(&self, key: &str) -> Attempt {
    self.check_at(key, Utc::now())
  }

  pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> Attempt {
    if self.max_attempts == 0 {
      return Attempt::Allowed { remaining: u32::MAX };
    }

    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    state.sweep(now, self.window);
    let window = state.windows.entry(key.to_owned()).or_insert(Window { count: 0, start: now });

    if now >= window.start + self.window {
      *window = Window { count: 0, start: now };
    }

    if window.count >= self.max_attempts {
      return Attempt::Exceeded { retry_after: (window.start + self.window) - now };
    }

    window.count += 1;
    Attempt::Allowed { remaining: self.max_attempts - window.count }
  }

  /// Forget `key`'s window, e.g. after a successful login.
  pub fn reset(&self, key: &str) {
    self.state.lock().unwrap_or_else(PoisonError::into_inner).windows.remove(key);
  }

  #[cfg(test)]
  fn tracked(&self) -> usize {
    self.state.lock().unwrap_or_else(PoisonError::into_inner).windows.len()
  }
}
