//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, mouse, resize, remote completions, clock ticks)
//! - EmulatorClient for everything the timeline does
//! - DisplayState for rendering
//!
//! The App:
//! 1. Converts terminal events to `InputEvent`s
//! 2. Sends them to the embedded emulator via `EmulatorClient`
//! 3. Receives `RenderMessage`s and updates `DisplayState`
//! 4. Renders based on `DisplayState`

use std::time::Duration;

use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use tokio::time::MissedTickBehavior;

use glass_core::gesture::{CARD_HEIGHT, CARD_WIDTH};
use glass_core::{Key, ListenMode};

use crate::display::DisplayState;
use crate::emulator_client::EmulatorClient;
use crate::theme;
use crate::widgets::CardView;

/// How often timers are advanced
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Width of the activity panel
const ACTIVITY_WIDTH: u16 = 34;

/// Phrase sent by the hotword key
const PHOTO_HOTWORD: &str = "take a picture";

/// Key help shown in the status bar
const HELP: &str = "\u{2190}\u{2192}\u{2191}\u{2193} move  \u{23CE} tap  \u{232B} back  s sync  h hotword  p photo  q quit";

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,

    // === Emulator Integration ===
    /// Client for the embedded emulator
    client: EmulatorClient,
    /// Display state derived from RenderMessages
    display: DisplayState,

    // === Input State ===
    /// Reply text being typed while dictation is listening
    input_buffer: String,
    /// Where the active card was last drawn
    card_area: Rect,
    /// Pointer press, in card coordinates
    press: Option<(f64, f64)>,
}

impl App {
    /// Create a new App around a client
    pub fn new(client: EmulatorClient) -> Self {
        Self {
            running: true,
            client,
            display: DisplayState::new(),
            input_buffer: String::new(),
            card_area: Rect::default(),
            press: None,
        }
    }

    /// Current display state
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// The embedded emulator client
    pub fn client(&self) -> &EmulatorClient {
        &self.client
    }

    /// Mutable access to the client
    pub fn client_mut(&mut self) -> &mut EmulatorClient {
        &mut self.client
    }

    /// Whether the loop should keep going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Text typed so far for a reply
    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    /// Start the emulator; an unreachable remote is not fatal
    pub async fn start(&mut self) {
        if let Err(e) = self.client.start().await {
            tracing::warn!("Emulator start error: {:#}", e);
        }
        self.process_render_messages();
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        // Create async event stream for non-blocking terminal events
        let mut event_stream = EventStream::new();

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Render initial frame immediately so the user sees the prism
        self.render(terminal)?;
        self.start().await;
        self.render(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                // Terminal events - highest priority
                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(event)) => self.handle_event(event).await,
                        Some(Err(e)) => {
                            tracing::warn!("Terminal event error: {}", e);
                        }
                        None => self.running = false,
                    }
                }

                // Remote work finished
                Some(done) = self.client.next_completion() => {
                    self.client.apply_completion(done);
                }

                // Feedback auto-hide, polling, relative dates
                _ = ticker.tick() => {
                    self.client.tick();
                }
            }

            self.process_render_messages();
            self.render(terminal)?;
        }

        Ok(())
    }

    /// Apply all pending messages from the emulator
    pub fn process_render_messages(&mut self) {
        let dictating = self.display.is_dictating();
        for msg in self.client.recv_all() {
            self.display.apply_message(msg);
        }
        if dictating && !self.display.is_dictating() {
            self.input_buffer.clear();
        }
    }

    /// Dispatch one terminal event
    pub async fn handle_event(&mut self, event: Event) {
        match event {
            // Only handle Press events (not Release or Repeat)
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse).await,
            _ => {}
        }
    }

    /// Handle keyboard input
    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return;
        }

        if self.display.is_dictating() {
            self.handle_dictation_key(key).await;
            return;
        }

        let result = match key.code {
            // Quit
            KeyCode::Esc | KeyCode::Char('q') => {
                self.running = false;
                Ok(())
            }

            // Navigation
            KeyCode::Left => self.client.key(Key::Left).await,
            KeyCode::Right => self.client.key(Key::Right).await,
            KeyCode::Up => self.client.key(Key::Up).await,
            KeyCode::Down | KeyCode::Backspace => self.client.key(Key::Down).await,
            KeyCode::Enter => self.client.key(Key::Enter).await,
            KeyCode::Char(' ') => self.client.key(Key::Space).await,

            // Device simulation
            KeyCode::Char('s') => self.client.request_sync().await,
            KeyCode::Char('h') => self.client.hotword(PHOTO_HOTWORD).await,
            KeyCode::Char('p') => self.client.capture_photo().await,

            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to handle key {:?}: {:#}", key.code, e);
        }
    }

    /// Typing goes into the reply while dictation is listening
    async fn handle_dictation_key(&mut self, key: KeyEvent) {
        let result = match key.code {
            KeyCode::Enter if !self.input_buffer.trim().is_empty() => {
                let text = std::mem::take(&mut self.input_buffer);
                self.client.dictate(text).await
            }
            KeyCode::Char(c) => {
                self.input_buffer.push(c);
                Ok(())
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
                Ok(())
            }
            KeyCode::Esc => {
                self.input_buffer.clear();
                self.client.key(Key::Down).await
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to send dictation: {:#}", e);
        }
    }

    /// Handle mouse input: a press and release on the card form one stroke
    pub async fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.press = card_point(self.card_area, mouse.column, mouse.row, false);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(start) = self.press.take() else {
                    return;
                };
                let Some(end) = card_point(self.card_area, mouse.column, mouse.row, true) else {
                    return;
                };
                if let Err(e) = self.client.pointer(start, end).await {
                    tracing::warn!("Failed to send pointer stroke: {:#}", e);
                }
            }
            _ => {}
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render the UI
    pub fn render<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        terminal.draw(|frame| self.draw(frame))?;
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [main, status] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());

        let stage = if main.width >= ACTIVITY_WIDTH * 3 {
            let [stage, activity] =
                Layout::horizontal([Constraint::Min(20), Constraint::Length(ACTIVITY_WIDTH)])
                    .areas(main);
            self.draw_activity(frame, activity);
            stage
        } else {
            main
        };

        self.card_area = prism_area(stage);
        self.draw_cards(frame);
        self.draw_status(frame, status);
    }

    fn draw_cards(&self, frame: &mut Frame) {
        let area = self.card_area;
        if area.width == 0 || area.height == 0 {
            return;
        }

        let active_area = match &self.display.backdrop {
            Some(backdrop) => {
                frame.render_widget(CardView::new(backdrop).dimmed(true), area);
                inset(area)
            }
            None => area,
        };

        if let Some(card) = &self.display.active {
            frame.render_widget(
                CardView::new(card)
                    .feedback(self.display.active_feedback())
                    .route(self.display.visible_route()),
                active_area,
            );
        }
    }

    fn draw_activity(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .display
            .activity
            .iter()
            .map(|line| Line::from(Span::styled(line.clone(), Style::default().fg(theme::CARD_MUTED))))
            .collect();
        let panel = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::LEFT)
                .border_style(Style::default().fg(theme::CARD_BORDER))
                .title(" timeline "),
        );
        frame.render_widget(panel, area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        match self.display.device.listening {
            Some(ListenMode::Dictation) => {
                spans.push(Span::styled(
                    "\u{25CF} reply: ",
                    Style::default().fg(theme::LISTENING).add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::styled(
                    format!("{}_", self.input_buffer),
                    Style::default().fg(theme::REPLY_TEXT),
                ));
            }
            Some(ListenMode::Hotword) => {
                spans.push(Span::styled(
                    "\u{25CF} ok glass  ",
                    Style::default().fg(theme::LISTENING),
                ));
            }
            None => {}
        }
        if self.display.device.camera_on {
            spans.push(Span::styled("\u{25CF} camera  ", Style::default().fg(theme::CAMERA)));
        }
        if let Some(sync) = &self.display.last_sync {
            spans.push(Span::styled(
                format!("sync {sync}  "),
                Style::default().fg(theme::DIM_GRAY),
            ));
        }
        if self.display.device.listening != Some(ListenMode::Dictation) {
            spans.push(Span::styled(HELP, Style::default().fg(theme::DIM_GRAY)));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

/// Largest 16:9 frame that fits in `area`, centered. Terminal cells are
/// about twice as tall as they are wide.
fn prism_area(area: Rect) -> Rect {
    let max_width = area.width.saturating_sub(2);
    let width = max_width.min(area.height.saturating_mul(32) / 9);
    let height = (width * 9 / 32).clamp(5.min(area.height), area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Overlay frame inside a backdrop
fn inset(area: Rect) -> Rect {
    if area.width < 12 || area.height < 7 {
        return area;
    }
    Rect {
        x: area.x + 4,
        y: area.y + 2,
        width: area.width - 8,
        height: area.height - 3,
    }
}

/// Map a terminal cell to card coordinates. Presses outside the card are
/// ignored; releases are clamped onto it.
fn card_point(area: Rect, column: u16, row: u16, clamp: bool) -> Option<(f64, f64)> {
    if area.width == 0 || area.height == 0 {
        return None;
    }
    let inside = column >= area.x && column < area.right() && row >= area.y && row < area.bottom();
    if !inside && !clamp {
        return None;
    }
    let column = column.clamp(area.x, area.right() - 1);
    let row = row.clamp(area.y, area.bottom() - 1);

    let x = (f64::from(column - area.x) + 0.5) / f64::from(area.width) * CARD_WIDTH;
    let y = (f64::from(row - area.y) + 0.5) / f64::from(area.height) * CARD_HEIGHT;
    Some((x, y))
}
