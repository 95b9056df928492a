use super::prompt::{Prompt, PromptEvent};
use super::KeyResult;
use crate::commands::{self, Command, CommandKind};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

/// Command input component with autocomplete
#[derive(Debug, Clone)]
pub struct CommandInput {
  prompt: Prompt,
  selected_suggestion: usize,
}

impl Default for CommandInput {
  fn default() -> Self {
    Self::new()
  }
}

impl CommandInput {
  pub fn new() -> Self {
    Self {
      prompt: Prompt::new(':', "Command"),
      selected_suggestion: 0,
    }
  }

  pub fn is_active(&self) -> bool {
    self.prompt.is_active()
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.prompt.value())
  }

  /// Handle a key event. Unknown commands are reported as `None`.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<Option<CommandKind>> {
    if self.prompt.is_active() {
      let len = self.suggestions().len();
      match key.code {
        KeyCode::Tab | KeyCode::Down if len > 0 => {
          self.selected_suggestion = (self.selected_suggestion + 1) % len;
          return KeyResult::Handled;
        }
        KeyCode::BackTab | KeyCode::Up if len > 0 => {
          self.selected_suggestion = (self.selected_suggestion + len - 1) % len;
          return KeyResult::Handled;
        }
        KeyCode::Enter => {
          let kind = commands::resolve(self.prompt.value(), self.selected_suggestion);
          self.prompt.close();
          self.selected_suggestion = 0;
          return KeyResult::Event(kind);
        }
        _ => {}
      }
    }

    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Cancelled) => {
        self.selected_suggestion = 0;
        KeyResult::Handled
      }
      KeyResult::Event(PromptEvent::Submitted(_)) => KeyResult::Handled,
      KeyResult::Handled => {
        // Input changed
        self.selected_suggestion = 0;
        KeyResult::Handled
      }
      KeyResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Render the command overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.is_active() {
      return;
    }

    let suggestions = self.suggestions();
    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let height = (3 + suggestions.len().min(8) as u16).min(area.height);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Command ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(inner);

    let input_line = Line::from(vec![
      Span::styled(":", Style::default().fg(Color::Yellow)),
      Span::raw(self.prompt.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), chunks[0]);

    if !suggestions.is_empty() && chunks[1].height > 0 {
      let items: Vec<ListItem> = suggestions
        .iter()
        .take(8)
        .map(|cmd| {
          ListItem::new(Line::from(vec![
            Span::styled(format!("{:<14}", cmd.name), Style::default().fg(Color::Cyan)),
            Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
          ]))
        })
        .collect();

      let list =
        List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
      let mut state = ListState::default();
      state.select(Some(self.selected_suggestion));
      frame.render_stateful_widget(list, chunks[1], &mut state);
    }
  }
}
