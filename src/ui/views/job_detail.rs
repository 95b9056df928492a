use crate::api::Job;
use crate::bindings;
use crate::query::{Query, QueryStatus};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::spawn_apply;
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// View for a single job posting
pub struct JobDetailView {
  ctx: ViewContext,
  job_id: u64,
  title: String,
  query: Query<Job>,
}

impl JobDetailView {
  pub fn new(ctx: ViewContext, job_id: u64, title: String) -> Self {
    let query = bindings::job(&ctx.client, job_id, ctx.options());
    Self {
      ctx,
      job_id,
      title,
      query,
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.status() {
      QueryStatus::Loading => format!(" {} (loading...) ", self.title),
      _ => format!(" {} ", self.title),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let job = match self.query.data() {
      Some(job) => job,
      None => {
        let (text, color) = match self.query.error() {
          Some(error) => (format!("Error: {}\n\nPress 'r' to retry.", error), Color::Red),
          None => ("Loading job...".to_string(), Color::DarkGray),
        };
        frame.render_widget(Paragraph::new(text).style(Style::default().fg(color)), inner);
        return;
      }
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(3), // Company, type, dates
        Constraint::Length(1), // Separator
        Constraint::Min(1),    // Description
      ])
      .split(inner);

    let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::DarkGray));
    let header = vec![
      Line::from(vec![
        label("Company: "),
        Span::styled(&job.company, Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        label("Location: "),
        Span::raw(job.location.as_deref().unwrap_or("Remote / unspecified")),
      ]),
      Line::from(vec![
        label("Type: "),
        Span::styled(&job.job_type, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        label("Posted: "),
        Span::raw(&job.posted_at),
        Span::raw("  "),
        label("Deadline: "),
        Span::raw(job.deadline.as_deref().unwrap_or("none")),
      ]),
    ];
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let sep = Paragraph::new("─".repeat(chunks[1].width as usize))
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(sep, chunks[1]);

    let desc = job.description.as_deref().unwrap_or("No description");
    frame.render_widget(Paragraph::new(desc).wrap(Wrap { trim: true }), chunks[2]);
  }
}

impl View for JobDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('a') => spawn_apply(&self.ctx, self.job_id, &self.title),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("#{}", self.job_id)
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
      Shortcut::new("a", "apply"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "back"),
    ]
  }
}
