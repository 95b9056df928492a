use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::KeyResult;

/// Events emitted by a prompt that its parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  Submitted(String),
  Cancelled,
}

/// Single-line text prompt opened by a trigger key
#[derive(Debug, Clone)]
pub struct Prompt {
  trigger: char,
  title: &'static str,
  buffer: String,
  active: bool,
}

impl Prompt {
  pub fn new(trigger: char, title: &'static str) -> Self {
    Self {
      trigger,
      title,
      buffer: String::new(),
      active: false,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn value(&self) -> &str {
    &self.buffer
  }

  /// Open the prompt, optionally pre-filled
  pub fn open(&mut self, initial: &str) {
    self.active = true;
    self.buffer = initial.to_string();
  }

  pub fn close(&mut self) {
    self.active = false;
    self.buffer.clear();
  }

  /// Handle a key event
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    if !self.active {
      let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
      if key.code == KeyCode::Char(self.trigger) && !ctrl {
        self.open("");
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.close();
        KeyResult::Event(PromptEvent::Cancelled)
      }
      KeyCode::Enter => {
        let value = self.buffer.trim().to_string();
        self.close();
        KeyResult::Event(PromptEvent::Submitted(value))
      }
      KeyCode::Backspace => {
        self.buffer.pop();
        KeyResult::Handled
      }
      KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.buffer.clear();
        KeyResult::Handled
      }
      KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.buffer.push(c);
        KeyResult::Handled
      }
      // Swallow everything else while typing
      _ => KeyResult::Handled,
    }
  }

  /// Render the one-line prompt box at the top of `area`
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let line = Line::from(vec![
      Span::styled(self.trigger.to_string(), Style::default().fg(Color::Yellow)),
      Span::raw(self.buffer.as_str()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), overlay_area);
  }
}
