use crate::api::CachedApiClient;
use crate::commands::CommandKind;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandInput, KeyResult};
use crate::ui::renderfns::extract_host;
use crate::ui::view::{View, ViewAction, ViewContext};
use crate::ui::views::{ApplicationsView, DashboardView, JobListView, ProfileView};
use chrono::{DateTime, Utc};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

/// How long a notice stays in the footer
const NOTICE_TTL: Duration = Duration::from_secs(6);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command overlay (after pressing :)
  command: CommandInput,

  /// Latest notice and when it arrived
  notice: Option<(String, Instant)>,

  config: Config,
  client: CachedApiClient,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = CachedApiClient::new(&config)?;
    Ok(Self::with_client(config, client))
  }

  pub fn with_client(config: Config, client: CachedApiClient) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    Self {
      view_stack: Vec::new(),
      command: CommandInput::new(),
      notice: None,
      config,
      client,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Views capture the sender, so the root is built once it is real
    self.execute(CommandKind::Jobs);

    let result = self.event_loop(&mut terminal, &mut events).await;

    self.set_root(None);
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn context(&self) -> ViewContext {
    ViewContext {
      client: self.client.clone(),
      user_id: self.config.user.id,
      role: self.config.user.role,
      stale_check: self.config.cache.stale_check_interval(),
      events: self.event_tx.clone(),
    }
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        // Every mounted view keeps its queries current, not just the visible one
        for view in self.view_stack.iter_mut() {
          view.tick();
        }
        if matches!(&self.notice, Some((_, at)) if at.elapsed() > NOTICE_TTL) {
          self.notice = None;
        }
      }
      Event::Notice(message) => self.set_notice(message),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let typing = self.view_stack.last().is_some_and(|v| v.is_typing());
    if !typing {
      match self.command.handle_key(key) {
        KeyResult::Event(Some(kind)) => return self.execute(kind),
        KeyResult::Event(None) => return self.set_notice("Unknown command"),
        KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };

    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          if let Some(mut view) = self.view_stack.pop() {
            view.unmount();
          }
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute(&mut self, kind: CommandKind) {
    info!(command = ?kind, "Executing command");
    let ctx = self.context();
    match kind {
      CommandKind::Jobs => self.set_root(Some(Box::new(JobListView::new(ctx)))),
      CommandKind::Applications => self.set_root(Some(Box::new(ApplicationsView::new(ctx)))),
      CommandKind::Dashboard => self.set_root(Some(Box::new(DashboardView::new(ctx)))),
      CommandKind::Profile => self.set_root(Some(Box::new(ProfileView::new(ctx)))),
      CommandKind::Purge => {
        let purged = self.client.store().purge_expired();
        self.set_notice(format!("Purged {} expired cache entries", purged));
      }
      CommandKind::Quit => self.should_quit = true,
    }
  }

  /// Unmount the whole stack, then start over from `root`
  fn set_root(&mut self, root: Option<Box<dyn View>>) {
    for mut view in self.view_stack.drain(..).rev() {
      view.unmount();
    }
    self.view_stack.extend(root);
  }

  fn set_notice(&mut self, message: impl Into<String>) {
    self.notice = Some((message.into(), Instant::now()));
  }

  // Accessors for UI rendering

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_ref().map(|(message, _)| message.as_str())
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.client.store().now()
  }

  pub fn title(&self) -> &str {
    match &self.config.title {
      Some(title) => title,
      None => extract_host(&self.config.api.base_url),
    }
  }

  pub fn user_label(&self) -> String {
    format!("{} #{}", self.config.user.role, self.config.user.id)
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }
}
