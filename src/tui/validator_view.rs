//! Full-screen progress view for a validation run

use crate::progress::Progress;
use crate::proxy::{Completion, ProbeResult, ProxyEndpoint, Validator, WorkingSet};
use crate::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Duration;

/// Maximum number of working proxies kept for display
const MAX_RECENT_PROXIES: usize = 100;

/// Validation TUI application state
pub struct ValidatorApp {
    /// Proxies to validate
    proxies: Vec<ProxyEndpoint>,
    validator: Validator,
    /// URL shown in the title
    target_url: String,
    progress: Progress,
    /// Working proxies tagged with their input position
    working: Vec<(usize, ProxyEndpoint)>,
    /// Most recent successes, newest last
    recent: VecDeque<ProbeResult>,
    list_state: ListState,
    status_message: String,
    should_quit: bool,
}

impl ValidatorApp {
    pub fn new(proxies: Vec<ProxyEndpoint>, validator: Validator, target_url: String) -> Self {
        let progress = Progress::new(proxies.len());
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            proxies,
            validator,
            target_url,
            progress,
            working: Vec::new(),
            recent: VecDeque::new(),
            list_state,
            status_message: "Validating proxies...".to_string(),
            should_quit: false,
        }
    }

    /// Run the TUI until every probe finished and the user quits
    pub async fn run(mut self) -> Result<WorkingSet> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result?;

        self.working.sort_by_key(|(index, _)| *index);
        Ok(self.working.into_iter().map(|(_, endpoint)| endpoint).collect())
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let mut rx = self.validator.spawn(std::mem::take(&mut self.proxies));

        while !self.should_quit {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                    }
                }
            }

            // Drain whatever finished since the last frame
            loop {
                match rx.try_recv() {
                    Ok(completion) => self.record(completion),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.finish();
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn record(&mut self, completion: Completion) {
        self.progress.record(&completion.result);

        if completion.result.is_success() {
            self.working
                .push((completion.index, completion.result.endpoint().clone()));
            self.recent.push_back(completion.result);
            if self.recent.len() > MAX_RECENT_PROXIES {
                self.recent.pop_front();
            }
        }

        self.status_message = format!(
            "Validating... {} | failed: {}",
            self.progress.status_line(),
            self.progress.failed()
        );
    }

    fn finish(&mut self) {
        self.status_message = format!(
            "Complete! Checked: {} | Working: {} | Failed: {} | Press 'q' to quit",
            self.progress.checked,
            self.progress.working,
            self.progress.failed()
        );
    }

    fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            // Runs cannot be cancelled; quitting only once everything reported
            KeyCode::Char('q') | KeyCode::Esc if self.is_complete() => {
                self.should_quit = true;
            }
            KeyCode::Down => {
                let i = match self.list_state.selected() {
                    Some(i) if i < self.recent.len().saturating_sub(1) => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let i = match self.list_state.selected() {
                    Some(0) | None => self.recent.len().saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Working proxies
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new(format!("Proxy Validator - {}", self.target_url))
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let progress_label = format!(
            "{}/{} ({}%)",
            self.progress.checked,
            self.progress.total,
            self.progress.percentage()
        );
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(self.progress.percentage().min(100))
            .label(progress_label);
        f.render_widget(gauge, chunks[1]);

        let items: Vec<ListItem> = self
            .recent
            .iter()
            .rev() // Show newest first
            .filter_map(|result| match result {
                ProbeResult::Success {
                    endpoint,
                    body_len,
                    elapsed_ms,
                } => Some(
                    ListItem::new(format!("{} ({} bytes, {}ms)", endpoint, body_len, elapsed_ms))
                        .style(Style::default().fg(Color::Green)),
                ),
                ProbeResult::Failure { .. } => None,
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Working Proxies ({})", self.progress.working))
                    .border_style(
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");
        f.render_stateful_widget(list, chunks[2], &mut self.list_state);

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.is_complete() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }
}
