//! Batch dashboard using ratatui
//!
//! Consumes [`TrialUpdate`]s from a running batch and renders progress,
//! running statistics and a log of data-loss trials. Keys drive the batch's
//! shared [`BatchControl`].

use crate::simulation::batch::BatchControl;
use crate::simulation::{BatchSummary, TrialUpdate};
use crate::ui::{utils, LogEntry, UIConfig, UIEvent, UIState, HELP_TEXT};
use crate::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Everything a frame needs, detached from the terminal
#[derive(Debug, Clone)]
struct View {
    title: String,
    state: UIState,
    completed: usize,
    total: usize,
    elapsed: Duration,
    summary: BatchSummary,
}

/// Live view of a running batch
pub struct Dashboard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    config: UIConfig,
    state: UIState,
    /// State to return to when help closes
    previous: UIState,
    title: String,
    log_entries: Vec<LogEntry>,
    summary: BatchSummary,
    completed: usize,
    total: usize,
    started: Instant,
    last_update: Instant,
}

impl Dashboard {
    /// `title` describes the configuration; `total` is the trial count
    pub fn new(title: String, total: usize) -> Result<Self> {
        let stdout = io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            config: UIConfig::default(),
            state: UIState::Running,
            previous: UIState::Running,
            title,
            log_entries: Vec::new(),
            summary: BatchSummary::new(),
            completed: 0,
            total,
            started: Instant::now(),
            last_update: Instant::now(),
        })
    }

    /// Render until the user quits. Quitting before the batch finishes
    /// cancels the remaining trials. Returns the statistics seen so far.
    pub async fn run(
        &mut self,
        mut updates: mpsc::UnboundedReceiver<TrialUpdate>,
        control: Arc<BatchControl>,
    ) -> Result<BatchSummary> {
        enable_raw_mode()?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen)?;

        self.log(LogEntry::info(format!("Batch of {} trials started", self.total)));
        self.log(LogEntry::info("Press 'H' for help, 'Q' to quit".to_string()));

        let mut keys = self.spawn_key_reader();
        let mut updates_open = true;

        loop {
            while let Ok(event) = keys.try_recv() {
                self.handle_key(event, &control);
            }
            if self.state == UIState::Shutdown {
                break;
            }

            while updates_open {
                match updates.try_recv() {
                    Ok(update) => self.record(update),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        updates_open = false;
                        self.finish();
                    }
                }
            }

            if self.last_update.elapsed() >= Duration::from_millis(self.config.update_interval_ms) {
                self.draw()?;
                self.last_update = Instant::now();
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        self.cleanup()?;
        Ok(self.summary.clone())
    }

    fn handle_key(&mut self, event: UIEvent, control: &BatchControl) {
        match event {
            UIEvent::Quit => {
                control.cancel();
                self.state = UIState::Shutdown;
            }
            UIEvent::TogglePause => {
                if matches!(self.state, UIState::Running | UIState::Paused) {
                    let paused = control.toggle_pause();
                    self.state = if paused {
                        UIState::Paused
                    } else {
                        UIState::Running
                    };
                    let msg = if paused { "Paused" } else { "Resumed" };
                    self.log(LogEntry::info(msg.to_string()));
                }
            }
            UIEvent::ShowHelp => {
                if self.state == UIState::Help {
                    self.state = self.previous;
                } else {
                    self.previous = self.state;
                    self.state = UIState::Help;
                }
            }
            UIEvent::Unknown(_) => {}
        }
    }

    fn record(&mut self, update: TrialUpdate) {
        self.summary.record(&update.result);
        self.completed = update.completed;
        self.total = update.total;

        let result = update.result;
        if result.data_loss {
            self.log(LogEntry::loss(format!(
                "trial {} lost {} stripes ({} chunks) at {:.1} h",
                result.trial, result.failed_stripes, result.lost_chunks, result.end_time
            )));
        }
    }

    fn finish(&mut self) {
        self.log(LogEntry::success(format!(
            "Batch complete: {} trials, {} with data loss",
            self.summary.trials, self.summary.data_loss_trials
        )));
        if self.state == UIState::Help {
            self.previous = UIState::Finished;
        } else {
            self.state = UIState::Finished;
        }
    }

    /// Forward key presses from a background task
    fn spawn_key_reader(&self) -> mpsc::UnboundedReceiver<UIEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                if let Ok(true) = event::poll(Duration::from_millis(50)) {
                    if let Ok(Event::Key(key)) = event::read() {
                        if tx.send(UIEvent::from(key)).is_err() {
                            break;
                        }
                    }
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        rx
    }

    fn draw(&mut self) -> Result<()> {
        let view = View {
            title: self.title.clone(),
            state: self.state,
            completed: self.completed,
            total: self.total,
            elapsed: self.started.elapsed(),
            summary: self.summary.clone(),
        };
        let config = self.config.clone();
        let log_entries = self.log_entries.clone();
        let started = self.started;

        self.terminal.draw(|f| {
            if view.state == UIState::Help {
                render_help(f, &config);
            } else {
                render_main(f, &view, &config, &log_entries, started);
            }
        })?;
        Ok(())
    }

    fn log(&mut self, entry: LogEntry) {
        self.log_entries.push(entry);
        if self.log_entries.len() > self.config.max_log_entries {
            self.log_entries.remove(0);
        }
    }

    fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn render_main(
    f: &mut Frame,
    view: &View,
    config: &UIConfig,
    log_entries: &[LogEntry],
    started: Instant,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Progress
            Constraint::Min(10),   // Statistics and loss log
            Constraint::Length(1), // Status bar
        ])
        .split(f.size());

    render_title(f, chunks[0], view, config);
    render_progress(f, chunks[1], view, config);

    let main = utils::horizontal_split(chunks[2], &[2, 3]);
    render_statistics(f, main[0], view, config);
    render_logs(f, main[1], log_entries, config, started);

    render_status_bar(f, chunks[3], view, config);
}

fn render_title(f: &mut Frame, area: Rect, view: &View, config: &UIConfig) {
    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(config.colors.highlight));

    let paragraph = Paragraph::new(format!("{} - {}", view.title, view.state))
        .block(block)
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD));

    f.render_widget(paragraph, area);
}

fn render_progress(f: &mut Frame, area: Rect, view: &View, config: &UIConfig) {
    let ratio = if view.total == 0 {
        0.0
    } else {
        (view.completed as f64 / view.total as f64).clamp(0.0, 1.0)
    };
    let color = match view.state {
        UIState::Paused => config.colors.degraded,
        _ => config.colors.healthy,
    };

    let gauge = Gauge::default()
        .block(Block::default().title("Trials").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .label(format!("{}/{}", view.completed, view.total))
        .ratio(ratio);

    f.render_widget(gauge, area);
}

fn render_statistics(f: &mut Frame, area: Rect, view: &View, config: &UIConfig) {
    let block = Block::default().title("Statistics").borders(Borders::ALL);
    let summary = &view.summary;

    let secs = view.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.trials as f64 / secs
    } else {
        0.0
    };

    let stats_text = format!(
        "Trials done: {}\nWith data loss: {}\n\nLoss probability: {:.6}\n  95% interval: ± {:.6}\n\nMean failed stripes: {:.3}\nMean lost chunks: {:.3}\nMean blocked ratio: {:.3e}\nSingle-chunk repairs: {:.4}\n\nElapsed: {:.1}s ({:.2} trials/s)",
        summary.trials,
        summary.data_loss_trials,
        summary.loss_probability(),
        summary.confidence_95(),
        summary.mean_failed_stripes(),
        summary.mean_lost_chunks(),
        summary.mean_blocked_ratio(),
        summary.mean_single_chunk_repair_ratio(),
        secs,
        rate
    );

    let color = if summary.data_loss_trials > 0 {
        config.colors.degraded
    } else {
        config.colors.text
    };
    let paragraph = Paragraph::new(stats_text)
        .block(block)
        .style(Style::default().fg(color))
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, area);
}

fn render_logs(
    f: &mut Frame,
    area: Rect,
    log_entries: &[LogEntry],
    config: &UIConfig,
    started: Instant,
) {
    let block = Block::default().title("Activity Log").borders(Borders::ALL);

    let items: Vec<ListItem> = log_entries
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|entry| {
            let color = entry.level.color(&config.colors);
            ListItem::new(entry.format(started)).style(Style::default().fg(color))
        })
        .collect();

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, view: &View, config: &UIConfig) {
    let hint = match view.state {
        UIState::Finished => "Press 'Q' to exit",
        _ => "Space: pause | H: help | Q: quit",
    };
    let paragraph = Paragraph::new(format!("State: {} | {}", view.state, hint))
        .style(Style::default().fg(config.colors.text))
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_help(f: &mut Frame, config: &UIConfig) {
    let area = f.size();
    f.render_widget(Clear, area);

    let popup_area = utils::centered_rect(60, 20, area);

    let block = Block::default()
        .title("Help")
        .borders(Borders::ALL)
        .style(Style::default().fg(config.colors.highlight));

    let paragraph = Paragraph::new(HELP_TEXT)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(config.colors.text));

    f.render_widget(paragraph, popup_area);
}
