//! Terminal user interface module
//!
//! Live dashboard for a running Monte Carlo batch: progress, running
//! statistics and a log of trials that lost data.

pub mod dashboard;

pub use dashboard::Dashboard;

use crossterm::event::{KeyCode, KeyEvent};

/// Events that can be triggered by user input
#[derive(Debug, Clone, PartialEq)]
pub enum UIEvent {
    /// Stop the batch and leave
    Quit,
    /// Pause or resume the workers
    TogglePause,
    /// Show or hide help
    ShowHelp,
    /// User pressed an unrecognized key
    Unknown(KeyCode),
}

impl From<KeyEvent> for UIEvent {
    fn from(key_event: KeyEvent) -> Self {
        match key_event.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => UIEvent::Quit,
            KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Char('P') => UIEvent::TogglePause,
            KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::F(1) => UIEvent::ShowHelp,
            other => UIEvent::Unknown(other),
        }
    }
}

/// Color scheme for the UI
#[derive(Debug, Clone, Copy)]
pub struct ColorScheme {
    pub healthy: ratatui::style::Color,
    pub degraded: ratatui::style::Color,
    pub failed: ratatui::style::Color,
    pub text: ratatui::style::Color,
    pub highlight: ratatui::style::Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            healthy: ratatui::style::Color::Green,
            degraded: ratatui::style::Color::Yellow,
            failed: ratatui::style::Color::Red,
            text: ratatui::style::Color::White,
            highlight: ratatui::style::Color::Cyan,
        }
    }
}

/// Configuration for UI rendering
#[derive(Debug, Clone)]
pub struct UIConfig {
    pub colors: ColorScheme,
    /// Redraw interval in milliseconds
    pub update_interval_ms: u64,
    /// Maximum number of log entries to keep
    pub max_log_entries: usize,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            colors: ColorScheme::default(),
            update_interval_ms: 100,
            max_log_entries: 200,
        }
    }
}

/// State of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UIState {
    Running,
    Paused,
    /// Every trial has reported
    Finished,
    Help,
    Shutdown,
}

impl std::fmt::Display for UIState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UIState::Running => "Running",
            UIState::Paused => "Paused",
            UIState::Finished => "Finished",
            UIState::Help => "Help",
            UIState::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Log entry for displaying messages to the user
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: std::time::Instant,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String) -> Self {
        Self {
            timestamp: std::time::Instant::now(),
            level,
            message,
        }
    }

    pub fn info(message: String) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn loss(message: String) -> Self {
        Self::new(LogLevel::Loss, message)
    }

    pub fn success(message: String) -> Self {
        Self::new(LogLevel::Success, message)
    }

    /// Format the entry relative to `start`
    pub fn format(&self, start: std::time::Instant) -> String {
        let seconds = self.timestamp.saturating_duration_since(start).as_secs();
        let prefix = match self.level {
            LogLevel::Info => "[INFO]",
            LogLevel::Loss => "[LOSS]",
            LogLevel::Success => "[OK]",
        };
        format!("[{:4}s] {} {}", seconds, prefix, self.message)
    }
}

/// Log levels for UI messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Loss,
    Success,
}

impl LogLevel {
    pub fn color(&self, colors: &ColorScheme) -> ratatui::style::Color {
        match self {
            LogLevel::Info => colors.text,
            LogLevel::Loss => colors.failed,
            LogLevel::Success => colors.healthy,
        }
    }
}

/// Help text for the dashboard
pub const HELP_TEXT: &str = r#"
Reliability Simulator - Controls

  Q, Esc    - Stop the batch and quit
  Space, P  - Pause/resume the workers
  H, F1     - Show/hide this help

The dashboard shows:
- Progress of the Monte Carlo batch
- Estimated data-loss probability with its 95% interval
- Mean blocked ratio and single-chunk repair ratio
- Every trial that ended with data loss

Press H to return.
"#;

/// Utility functions for UI rendering
pub mod utils {
    use ratatui::layout::{Constraint, Direction, Layout, Rect};

    /// Split a rectangle horizontally with given ratios
    pub fn horizontal_split(area: Rect, ratios: &[u16]) -> Vec<Rect> {
        let total: u32 = ratios.iter().map(|&x| x as u32).sum();
        let constraints: Vec<Constraint> = ratios
            .iter()
            .map(|&ratio| Constraint::Ratio(ratio as u32, total))
            .collect();

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area)
            .to_vec()
    }

    /// Create a centered rectangle with given width and height
    pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length((area.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((area.height.saturating_sub(height)) / 2),
            ])
            .split(area);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length((area.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((area.width.saturating_sub(width)) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> UIEvent {
        UIEvent::from(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key(KeyCode::Char('q')), UIEvent::Quit);
        assert_eq!(key(KeyCode::Esc), UIEvent::Quit);
        assert_eq!(key(KeyCode::Char(' ')), UIEvent::TogglePause);
        assert_eq!(key(KeyCode::F(1)), UIEvent::ShowHelp);
        assert_eq!(key(KeyCode::Char('z')), UIEvent::Unknown(KeyCode::Char('z')));
    }

    #[test]
    fn test_log_entry_format() {
        let start = std::time::Instant::now();
        let entry = LogEntry::loss("trial 3 lost 2 stripes".to_string());
        let line = entry.format(start);
        assert!(line.contains("[LOSS]"));
        assert!(line.ends_with("trial 3 lost 2 stripes"));
    }
}
