use chrono::{DateTime, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use super::utils::{age_label, status_badge};
use crate::ui::view::View;

/// Draw the header bar with title, user, data freshness and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  user: &str,
  view: Option<&dyn View>,
  now: DateTime<Utc>,
) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut spans = vec![
    Span::styled(" campus ", Style::default().fg(Color::Cyan).bold()),
    separator(),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    separator(),
    Span::styled(format!(" {} ", user), Style::default().fg(Color::Yellow).bold()),
  ];

  if let Some(view) = view {
    if let Some(updated) = view.last_updated() {
      spans.push(separator());
      spans.push(Span::styled(
        format!(" {} ", age_label(updated, now)),
        Style::default().fg(Color::DarkGray),
      ));
    }
    if let Some((badge, color)) = view.status().and_then(status_badge) {
      spans.push(Span::styled(format!("[{}]", badge), Style::default().fg(color).bold()));
    }

    let mut shortcuts = view.shortcuts();
    shortcuts.sort_by_key(|s| s.priority);
    spans.push(Span::raw("  "));
    for shortcut in shortcuts {
      spans.push(Span::styled(
        format!("<{}>", shortcut.key),
        Style::default().fg(Color::Cyan),
      ));
      spans.push(Span::styled(
        format!(" {}   ", shortcut.label),
        Style::default().fg(Color::DarkGray),
      ));
    }
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host part of the portal URL
pub fn extract_host(url: &str) -> &str {
  let rest = url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url);
  rest.split('/').next().unwrap_or(rest)
}
