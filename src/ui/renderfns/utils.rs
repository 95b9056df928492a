use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

use crate::api::ApplicationStatus;
use crate::query::QueryStatus;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for an application status
pub fn status_color(status: ApplicationStatus) -> Color {
  match status {
    ApplicationStatus::Offered => Color::Green,
    ApplicationStatus::Shortlisted | ApplicationStatus::Interview => Color::Yellow,
    ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => Color::DarkGray,
    ApplicationStatus::Pending | ApplicationStatus::Reviewed => Color::White,
  }
}

/// Header badge for a query's state, if it needs one
pub fn status_badge(status: QueryStatus) -> Option<(&'static str, Color)> {
  match status {
    QueryStatus::Loading => Some(("loading", Color::Yellow)),
    QueryStatus::Refreshing => Some(("refreshing", Color::Yellow)),
    QueryStatus::Stale => Some(("stale", Color::Magenta)),
    QueryStatus::Error => Some(("error", Color::Red)),
    QueryStatus::Idle | QueryStatus::Ready => None,
  }
}

/// Block title for a view backed by one query
pub fn query_title(
  label: &str,
  status: QueryStatus,
  error: Option<&str>,
  count: Option<usize>,
) -> String {
  match (status, error) {
    (QueryStatus::Loading, _) => format!(" {} (loading...) ", label),
    (QueryStatus::Error, Some(e)) => format!(" {} (error: {}) ", label, truncate(e, 40)),
    _ => match count {
      Some(n) => format!(" {} ({}) ", label, n),
      None => format!(" {} ", label),
    },
  }
}

/// Coarse "time since" label
pub fn age_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let secs = (now - then).num_seconds().max(0);
  match secs {
    0..=9 => "just now".to_string(),
    10..=59 => format!("{}s ago", secs),
    60..=3599 => format!("{}m ago", secs / 60),
    _ => format!("{}h ago", secs / 3600),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Zürich Büro GmbH", 9), "Zürich...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color(ApplicationStatus::Offered), Color::Green);
    assert_eq!(status_color(ApplicationStatus::Interview), Color::Yellow);
    assert_eq!(status_color(ApplicationStatus::Withdrawn), Color::DarkGray);
    assert_eq!(status_color(ApplicationStatus::Pending), Color::White);
  }

  #[test]
  fn test_status_badge() {
    assert_eq!(status_badge(QueryStatus::Ready), None);
    assert_eq!(status_badge(QueryStatus::Stale).map(|(s, _)| s), Some("stale"));
  }

  #[test]
  fn test_query_title() {
    assert_eq!(
      query_title("Jobs", QueryStatus::Loading, None, None),
      " Jobs (loading...) "
    );
    assert_eq!(
      query_title("Jobs", QueryStatus::Error, Some("HTTP 500"), None),
      " Jobs (error: HTTP 500) "
    );
    assert_eq!(query_title("Jobs", QueryStatus::Stale, None, Some(3)), " Jobs (3) ");
  }

  #[test]
  fn test_age_label() {
    let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(1);
    assert_eq!(age_label(now, now), "just now");
    assert_eq!(age_label(now - Duration::seconds(42), now), "42s ago");
    assert_eq!(age_label(now - Duration::minutes(7), now), "7m ago");
    assert_eq!(age_label(now - Duration::hours(3), now), "3h ago");
  }
}
