use crate::api::{DashboardStats, Role};
use crate::bindings;
use crate::query::{Query, QueryStatus};
use crate::ui::renderfns::query_title;
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Role-specific counters next to a summary of the local cache
pub struct DashboardView {
  ctx: ViewContext,
  query: Query<DashboardStats>,
}

impl DashboardView {
  pub fn new(ctx: ViewContext) -> Self {
    let query = bindings::dashboard_stats(&ctx.client, ctx.user_id, ctx.role, ctx.options());
    Self { ctx, query }
  }

  fn counters(&self, stats: &DashboardStats) -> Vec<(&'static str, String)> {
    match self.ctx.role {
      Role::Student => vec![
        ("Applications", stats.applications.to_string()),
        ("Pending", stats.pending.to_string()),
        ("Shortlisted", stats.shortlisted.to_string()),
        ("Interviews", stats.interviews.to_string()),
        ("Offers", stats.offers.to_string()),
        ("Profile", format!("{}% complete", stats.profile_completeness)),
      ],
      Role::Recruiter | Role::Admin => vec![
        ("Active jobs", stats.active_jobs.to_string()),
        ("Applicants", stats.total_applicants.to_string()),
        ("Applications", stats.applications.to_string()),
        ("Interviews", stats.interviews.to_string()),
        ("Offers", stats.offers.to_string()),
      ],
    }
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect) {
    let title = query_title(
      &format!("Dashboard [{}]", self.ctx.role),
      self.query.status(),
      self.query.error(),
      None,
    );
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let lines: Vec<Line> = match self.query.data() {
      Some(stats) => self
        .counters(stats)
        .into_iter()
        .map(|(name, value)| {
          Line::from(vec![
            Span::styled(format!("{:<14}", name), Style::default().fg(Color::DarkGray)),
            Span::styled(value, Style::default().fg(Color::White).bold()),
          ])
        })
        .collect(),
      None if self.query.is_loading() => vec![Line::from("Loading...")],
      None => vec![Line::from("No data. Press 'r' to retry.")],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_cache(&self, frame: &mut Frame, area: Rect) {
    let stats = self.ctx.client.store().stats();
    let row = |name: &'static str, value: usize, color: Color| {
      Line::from(vec![
        Span::styled(format!("{:<12}", name), Style::default().fg(Color::DarkGray)),
        Span::styled(value.to_string(), Style::default().fg(color)),
      ])
    };
    let lines = vec![
      row("Entries", stats.entries, Color::White),
      row("Fresh", stats.fresh, Color::Green),
      row("Stale", stats.stale, Color::Magenta),
      row("Expired", stats.expired, Color::Red),
      row("Listeners", stats.listeners, Color::Cyan),
    ];

    let block = Block::default()
      .title(" Cache ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
      .split(area);
    self.render_stats(frame, chunks[0]);
    self.render_cache(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn unmount(&mut self) {
    self.query.unmount();
  }

  fn status(&self) -> Option<QueryStatus> {
    Some(self.query.status())
  }

  fn last_updated(&self) -> Option<DateTime<Utc>> {
    self.query.last_updated()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
    ]
  }
}
