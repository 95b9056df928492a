use crate::api::Application;
use crate::bindings;
use crate::query::{Query, QueryStatus};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{query_title, status_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::JobDetailView;
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::warn;

/// The current user's applications
pub struct ApplicationsView {
  ctx: ViewContext,
  query: Query<Vec<Application>>,
  list_state: ListState,
}

impl ApplicationsView {
  pub fn new(ctx: ViewContext) -> Self {
    let query = bindings::applications(&ctx.client, ctx.user_id, ctx.options());
    Self {
      ctx,
      query,
      list_state: ListState::default(),
    }
  }

  fn applications(&self) -> &[Application] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&Application> {
    self
      .list_state
      .selected()
      .and_then(|i| self.applications().get(i))
  }

  fn withdraw_selected(&self) {
    let Some(application) = self.selected() else {
      return;
    };
    if !application.status.is_open() {
      self.ctx.notify(format!(
        "Application to {} is already {}",
        application.company,
        application.status.label().to_lowercase()
      ));
      return;
    }

    let ctx = self.ctx.clone();
    let application_id = application.id;
    let title = application.job_title.clone();
    tokio::spawn(async move {
      match ctx.client.withdraw_application(ctx.user_id, application_id).await {
        Ok(_) => ctx.notify(format!("Withdrew application for {}", title)),
        Err(e) => {
          warn!(application_id, error = %e, "Withdraw failed");
          ctx.notify(format!("Could not withdraw: {}", e));
        }
      }
    });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.applications().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = query_title(
      "Applications",
      self.query.status(),
      self.query.error(),
      self.query.data().map(Vec::len),
    );
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.status() == QueryStatus::Error {
        "Failed to load applications. Press 'r' to retry."
      } else {
        "No applications yet. Find something under :jobs."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .applications()
      .iter()
      .map(|app| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<12}", app.status.label()),
            Style::default().fg(status_color(app.status)),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<22}", truncate(&app.company, 22)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<11}", app.applied_at),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(truncate(&app.job_title, 50)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for ApplicationsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('w') => self.withdraw_selected(),
      KeyCode::Enter => {
        if let Some(app) = self.selected() {
          return ViewAction::Push(Box::new(JobDetailView::new(
            self.ctx.clone(),
            app.job_id,
            app.job_title.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Applications".to_string()
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
      Shortcut::new("w", "withdraw").with_priority(20),
      Shortcut::new("r", "refresh").with_priority(30),
    ]
  }
}
