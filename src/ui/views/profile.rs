use crate::api::{ProfileUpdate, UserProfile};
use crate::bindings;
use crate::query::{Query, QueryStatus};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::warn;

/// The current user's profile, with inline skill editing
pub struct ProfileView {
  ctx: ViewContext,
  query: Query<UserProfile>,
  skills: Prompt,
}

impl ProfileView {
  pub fn new(ctx: ViewContext) -> Self {
    // Profiles are edited elsewhere too, so never open on a cached copy
    let options = ctx.options().force_refresh_on_mount();
    let query = bindings::profile(&ctx.client, ctx.user_id, options);
    Self {
      ctx,
      query,
      skills: Prompt::new('e', "Skills, comma separated"),
    }
  }

  fn save_skills(&self, text: &str) {
    let update = ProfileUpdate {
      skills: Some(parse_skills(text)),
      ..ProfileUpdate::default()
    };

    let ctx = self.ctx.clone();
    tokio::spawn(async move {
      match ctx.client.update_profile(ctx.user_id, &update).await {
        Ok(_) => ctx.notify("Profile saved"),
        Err(e) => {
          warn!(error = %e, "Profile update failed");
          ctx.notify(format!("Could not save profile: {}", e));
        }
      }
    });
  }

  fn render_profile(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.status() {
      QueryStatus::Loading => " Profile (loading...) ".to_string(),
      _ => " Profile ".to_string(),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(profile) = self.query.data() else {
      let text = match self.query.error() {
        Some(error) => format!("Error: {}\n\nPress 'r' to retry.", error),
        None => "Loading profile...".to_string(),
      };
      frame.render_widget(Paragraph::new(text).block(block), area);
      return;
    };

    let field = |name: &'static str, value: String| {
      Line::from(vec![
        Span::styled(format!("{:<12}", name), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
      ])
    };
    let or_dash = |v: Option<&str>| v.unwrap_or("-").to_string();

    let lines = vec![
      Line::from(Span::styled(
        profile.name.clone(),
        Style::default().fg(Color::Cyan).bold(),
      )),
      Line::from(""),
      field("Email", profile.email.clone()),
      field("Role", profile.role.to_string()),
      field("University", or_dash(profile.university.as_deref())),
      field(
        "Graduating",
        profile
          .graduation_year
          .map(|y| y.to_string())
          .unwrap_or_else(|| "-".to_string()),
      ),
      field("Skills", profile.skills.join(", ")),
      field("CV", or_dash(profile.cv_url.as_deref())),
    ];

    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
      area,
    );
  }
}

/// Split a comma separated list, dropping blanks and duplicates
fn parse_skills(text: &str) -> Vec<String> {
  let mut skills: Vec<String> = Vec::new();
  for skill in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
    if !skills.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
      skills.push(skill.to_string());
    }
  }
  skills
}

impl View for ProfileView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if !self.skills.is_active() && key.code == KeyCode::Char('e') {
      if let Some(profile) = self.query.data() {
        self.skills.open(&profile.skills.join(", "));
      }
      return ViewAction::None;
    }

    match self.skills.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(text)) => {
        self.save_skills(&text);
        return ViewAction::None;
      }
      KeyResult::Event(PromptEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_profile(frame, area);
    self.skills.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Profile".to_string()
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
    self.skills.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("e", "edit skills").with_priority(20),
      Shortcut::new("r", "refresh").with_priority(30),
    ]
  }
}
