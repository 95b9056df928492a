//! Time source for the cache.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Source of "now" for expiry, staleness and hook timers.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Manually advanced clock.
///
/// Clones share the same instant, so a test can hand one clone to the store
/// and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct ManualClock {
  now: Arc<Mutex<DateTime<Utc>>>,
}

#[allow(dead_code)]
impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Arc::new(Mutex::new(start)),
    }
  }

  /// Move the clock forward.
  pub fn advance(&self, by: Duration) {
    if let Ok(mut now) = self.now.lock() {
      *now += by;
    }
  }

  pub fn set(&self, to: DateTime<Utc>) {
    if let Ok(mut now) = self.now.lock() {
      *now = to;
    }
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new(DateTime::<Utc>::UNIX_EPOCH)
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    self
      .now
      .lock()
      .map(|now| *now)
      .unwrap_or_else(|poisoned| *poisoned.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_manual_clock_clones_share_time() {
    let clock = ManualClock::default();
    let handle = clock.clone();

    handle.advance(Duration::seconds(90));

    assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(90));
  }
}
