use crate::api::{Job, JobFilters, JobPage};
use crate::bindings;
use crate::query::{Query, QueryStatus};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{query_title, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::{spawn_apply, JobDetailView};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Paged job board with a free-text search
pub struct JobListView {
  ctx: ViewContext,
  page: u32,
  filters: JobFilters,
  query: Query<JobPage>,
  list_state: ListState,
  search: Prompt,
}

impl JobListView {
  pub fn new(ctx: ViewContext) -> Self {
    let filters = JobFilters::default();
    let query = bindings::jobs(&ctx.client, 1, filters.clone(), ctx.options());
    Self {
      ctx,
      page: 1,
      filters,
      query,
      list_state: ListState::default(),
      search: Prompt::new('/', "Search jobs"),
    }
  }

  /// Page and filters are part of the key, so switching means a new query
  fn remount(&mut self) {
    self.query.unmount();
    self.query = bindings::jobs(
      &self.ctx.client,
      self.page,
      self.filters.clone(),
      self.ctx.options(),
    );
    self.list_state.select(Some(0));
  }

  fn jobs(&self) -> &[Job] {
    self.query.data().map(|p| p.jobs.as_slice()).unwrap_or(&[])
  }

  fn total_pages(&self) -> u32 {
    self.query.data().map(|p| p.total_pages).unwrap_or(1)
  }

  fn selected_job(&self) -> Option<&Job> {
    self.list_state.selected().and_then(|i| self.jobs().get(i))
  }

  fn label(&self) -> String {
    match &self.filters.search {
      Some(search) => format!("Jobs p{} \"{}\"", self.page, search),
      None => format!("Jobs p{}", self.page),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.jobs().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = query_title(
      &format!("{}/{}", self.label(), self.total_pages()),
      self.query.status(),
      self.query.error(),
      self.query.data().map(|p| p.total as usize),
    );
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.status() == QueryStatus::Error {
        "Failed to load jobs. Press 'r' to retry."
      } else if !self.filters.is_empty() {
        "No jobs match this search. Press 'c' to clear it."
      } else {
        "No open positions."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .jobs()
      .iter()
      .map(|job| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<22}", truncate(&job.company, 22)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<12}", truncate(&job.job_type, 12)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<16}", truncate(job.location.as_deref().unwrap_or("-"), 16)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(" "),
          Span::raw(truncate(&job.title, 50)),
        ]);
        ListItem::new(line)
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

impl View for JobListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(text)) => {
        self.filters.search = Some(text).filter(|s| !s.is_empty());
        self.page = 1;
        self.remount();
        return ViewAction::None;
      }
      KeyResult::Event(PromptEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') | KeyCode::Right if self.page < self.total_pages() => {
        self.page += 1;
        self.remount();
      }
      KeyCode::Char('p') | KeyCode::Left if self.page > 1 => {
        self.page -= 1;
        self.remount();
      }
      KeyCode::Char('c') if !self.filters.is_empty() => {
        self.filters = JobFilters::default();
        self.page = 1;
        self.remount();
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('a') => {
        if let Some(job) = self.selected_job() {
          spawn_apply(&self.ctx, job.id, &job.title);
        }
      }
      KeyCode::Enter => {
        if let Some(job) = self.selected_job() {
          return ViewAction::Push(Box::new(JobDetailView::new(
            self.ctx.clone(),
            job.id,
            job.title.clone(),
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
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.label()
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

  fn is_typing(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("/", "search").with_priority(20),
      Shortcut::new("n/p", "page").with_priority(30),
      Shortcut::new("a", "apply").with_priority(40),
      Shortcut::new("r", "refresh").with_priority(50),
    ]
  }
}
