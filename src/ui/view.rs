use chrono::{DateTime, Duration, Utc};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use tokio::sync::mpsc;

use crate::api::{CachedApiClient, Role};
use crate::event::Event;
use crate::query::{QueryOptions, QueryStatus};

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Everything a view needs to build its queries and start writes
#[derive(Clone)]
pub struct ViewContext {
  pub client: CachedApiClient,
  pub user_id: u64,
  pub role: Role,
  pub stale_check: Duration,
  pub events: mpsc::UnboundedSender<Event>,
}

impl ViewContext {
  /// Query options shared by every view
  pub fn options<T>(&self) -> QueryOptions<T> {
    QueryOptions::default().stale_check_interval(self.stale_check)
  }

  /// Report the outcome of a background write in the status line
  pub fn notify(&self, message: impl Into<String>) {
    let _ = self.events.send(Event::Notice(message.into()));
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views own their queries. The App calls `tick()` on every view in the
/// stack, covered ones included, so their queries keep polling, and
/// `unmount()` before dropping a view.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to allow views to poll async queries
  fn tick(&mut self) {}

  /// Tear down the view's queries
  fn unmount(&mut self) {}

  /// Status of the view's main query, for the header badge
  fn status(&self) -> Option<QueryStatus> {
    None
  }

  fn last_updated(&self) -> Option<DateTime<Utc>> {
    None
  }

  /// Whether the view is capturing text input (disables global keys)
  fn is_typing(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
