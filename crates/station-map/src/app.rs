//! App — terminal front-end for the station map.
//!
//! Architecture:
//! - `App` renders the `TerminalEngine` snapshot plus the popup and status
//!   line it learned about from `MapBroadcast`s.
//! - Key and mouse input becomes either a direct camera call on the engine
//!   (pan, zoom) or a `MapEvent` for `MapCore` (click, dismiss, shutdown).
//! - Redraws are driven by input, broadcasts and the engine's revision watch.

use std::io;
use std::sync::Arc;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthChar;

use station_map::feed::FeedUrl;
use station_map::popup::PopupState;
use station_map::terminal_engine::{EngineSnapshot, TerminalEngine};
use station_map::{MapBroadcast, MapEvent, ScreenPoint};
use station_proto::{FeatureKind, MarkerKind};

use crate::theme;

const PAN_STEP_X: i32 = 4;
const PAN_STEP_Y: i32 = 2;
const POPUP_WIDTH: u16 = 40;

enum AppMessage {
    Input(Event),
    Map(MapBroadcast),
    Log(String),
}

pub struct App {
    engine: Arc<TerminalEngine>,
    event_tx: mpsc::Sender<MapEvent>,
    popup: PopupState,
    feed_url: Option<FeedUrl>,
    last_log: Option<String>,
    /// Inner map rectangle from the last frame; mouse clicks are relative to it.
    map_area: Rect,
    should_quit: bool,
}

impl App {
    pub fn new(engine: Arc<TerminalEngine>, event_tx: mpsc::Sender<MapEvent>) -> Self {
        Self {
            engine,
            event_tx,
            popup: PopupState::Closed,
            feed_url: None,
            last_log: None,
            map_area: Rect::default(),
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<MapBroadcast>,
        mut log_rx: broadcast::Receiver<String>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let input_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if input_tx.blocking_send(AppMessage::Input(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: MapCore broadcasts ───────────────────────────────
        let bc_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        if bc_tx.send(AppMessage::Map(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("map broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // ── Background task: WARN/ERROR lines for the status bar ──────────────
        let log_tx = tx;
        tokio::spawn(async move {
            loop {
                match log_rx.recv().await {
                    Ok(line) => {
                        if log_tx.send(AppMessage::Log(line)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut revision = self.engine.subscribe();

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
                needs_redraw = false;
            }

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                }
                changed = revision.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    needs_redraw = true;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        let _ = self.event_tx.send(MapEvent::Shutdown).await;
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        info!("station-map: terminal restored");

        Ok(())
    }

    /// Returns `true` when the screen needs a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Input(Event::Key(key)) => self.handle_key(key).await,
            AppMessage::Input(Event::Mouse(mouse)) => self.handle_mouse(mouse).await,
            AppMessage::Input(Event::Resize(_, _)) => true,
            AppMessage::Input(_) => false,
            AppMessage::Map(MapBroadcast::FeedCommitted(url)) => {
                self.feed_url = Some(url);
                true
            }
            AppMessage::Map(MapBroadcast::PopupChanged(state)) => {
                self.popup = state;
                true
            }
            // The engine's revision watch already covers camera moves.
            AppMessage::Map(MapBroadcast::CameraMoved(_)) => false,
            AppMessage::Log(line) => {
                self.last_log = Some(line);
                true
            }
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return true;
            }
            KeyCode::Esc => self.send(MapEvent::DismissPopup).await,
            KeyCode::Enter => {
                let point = self.engine.center_point();
                self.send(MapEvent::Click(point)).await;
            }
            KeyCode::Left | KeyCode::Char('h') => self.engine.pan(-PAN_STEP_X, 0),
            KeyCode::Right | KeyCode::Char('l') => self.engine.pan(PAN_STEP_X, 0),
            KeyCode::Up | KeyCode::Char('k') => self.engine.pan(0, -PAN_STEP_Y),
            KeyCode::Down | KeyCode::Char('j') => self.engine.pan(0, PAN_STEP_Y),
            KeyCode::Char('+') | KeyCode::Char('=') => self.engine.zoom_by(1.0),
            KeyCode::Char('-') => self.engine.zoom_by(-1.0),
            _ => return false,
        }
        false
    }

    async fn handle_mouse(&mut self, mouse: MouseEvent) -> bool {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return false;
        }
        if let Some(point) = map_point(self.map_area, mouse.column, mouse.row) {
            self.send(MapEvent::Click(point)).await;
        }
        false
    }

    async fn send(&self, evt: MapEvent) {
        if self.event_tx.send(evt).await.is_err() {
            warn!("MapCore is gone; input dropped");
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(f.area());

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::style_border())
            .title(Span::styled(" stations ", theme::style_secondary()));
        let inner = block.inner(chunks[0]);
        f.render_widget(block, chunks[0]);

        // Tell the engine how big the map is before taking the snapshot.
        self.map_area = inner;
        self.engine.resize(inner.width, inner.height);
        let snapshot = self.engine.snapshot();

        f.render_widget(MapView::new(&self.engine, &snapshot), inner);
        self.draw_popup(f, inner);
        self.draw_status(f, chunks[1], &snapshot);
    }

    fn draw_popup(&self, f: &mut Frame, map: Rect) {
        let Some(request) = self.popup.request() else {
            return;
        };
        let lines = self.popup.lines();
        let width = POPUP_WIDTH.min(map.width);
        let height = (lines.len() as u16 + 2).min(map.height);
        let area = Rect::new(map.right().saturating_sub(width), map.y, width, height);

        let body_style = match &self.popup {
            PopupState::Loading { .. } => Style::default().fg(theme::C_LOADING),
            PopupState::Failed { .. } => Style::default().fg(theme::C_ERROR),
            _ => theme::style_default(),
        };
        let body: Vec<Line> = lines
            .into_iter()
            .map(|l| Line::from(Span::styled(l, body_style)))
            .collect();

        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(body).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme::style_popup_border())
                    .title(Span::styled(
                        format!(" {} ", request.beacon_name),
                        theme::style_secondary(),
                    )),
            ),
            area,
        );
    }

    fn draw_status(&self, f: &mut Frame, area: Rect, snapshot: &EngineSnapshot) {
        let feed = self
            .feed_url
            .as_ref()
            .map_or_else(|| "no feed yet".to_string(), FeedUrl::to_string);
        let mut left = format!(
            " z{:.1}  {} features  {}",
            snapshot.viewport.zoom,
            snapshot.features.len(),
            feed
        );
        if let Some(err) = &snapshot.feed_error {
            left.push_str("  [stale: ");
            left.push_str(err);
            left.push(']');
        }
        let right = self.last_log.as_deref().unwrap_or("");

        let width = usize::from(area.width);
        let right = truncate_to_width(right, width / 2);
        let left = truncate_to_width(&left, width.saturating_sub(display_width(&right) + 1));
        let pad = width.saturating_sub(display_width(&left) + display_width(&right));

        let line = Line::from(vec![
            Span::styled(left, theme::style_secondary()),
            Span::raw(" ".repeat(pad)),
            Span::styled(right, Style::default().fg(theme::C_ERROR)),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }
}

/// Translate a terminal position into map-area cells.
fn map_point(map: Rect, column: u16, row: u16) -> Option<ScreenPoint> {
    let inside = column >= map.x && column < map.right() && row >= map.y && row < map.bottom();
    inside.then(|| ScreenPoint::new(column - map.x, row - map.y))
}

fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Cut `s` to at most `max` columns, marking the cut with an ellipsis.
fn truncate_to_width(s: &str, max: usize) -> String {
    if display_width(s) <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

// ── Map widget ────────────────────────────────────────────────────────────────

struct MapView<'a> {
    engine: &'a TerminalEngine,
    snapshot: &'a EngineSnapshot,
}

impl<'a> MapView<'a> {
    fn new(engine: &'a TerminalEngine, snapshot: &'a EngineSnapshot) -> Self {
        Self { engine, snapshot }
    }
}

fn marker_symbol(kind: &FeatureKind) -> String {
    match kind {
        FeatureKind::Cluster { point_count, .. } if *point_count < 10 => point_count.to_string(),
        FeatureKind::Cluster { .. } => "◉".to_string(),
        FeatureKind::Station { .. } => "●".to_string(),
    }
}

impl Widget for MapView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, Style::default().bg(theme::C_BG));

        // Stations first so clusters land on top.
        let mut features: Vec<_> = self.snapshot.features.iter().collect();
        features.sort_by_key(|f| f.marker() == MarkerKind::Cluster);

        for feature in features {
            let (x, y) = self.engine.project(feature.coordinates);
            if x < 0.0 || y < 0.0 || x >= f64::from(area.width) || y >= f64::from(area.height) {
                continue;
            }
            let (cx, cy) = (area.x + x as u16, area.y + y as u16);
            if let Some(cell) = buf.cell_mut((cx, cy)) {
                cell.set_symbol(&marker_symbol(&feature.kind))
                    .set_style(theme::style_marker(feature.marker()));
            }
        }

        // Highlight the crosshair when Enter would hit something.
        let mid = self.engine.center_point();
        let style = if self.engine.is_interactive(mid) {
            theme::style_crosshair_hover()
        } else {
            theme::style_crosshair()
        };
        if let Some(cell) = buf.cell_mut((area.x + mid.x, area.y + mid.y)) {
            if cell.symbol() == " " {
                cell.set_symbol("+");
            }
            cell.set_style(style);
        }

        if self.snapshot.features.is_empty() {
            let hint = "no stations in view";
            let x = area.x + area.width.saturating_sub(hint.len() as u16) / 2;
            let y = area.y + area.height.saturating_sub(1);
            buf.set_string(x, y, hint, theme::style_muted());
        }
    }
}
