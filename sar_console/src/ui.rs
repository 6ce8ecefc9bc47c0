use std::collections::{HashSet, VecDeque};

use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use sar_proto::{
    AgentMessage, AgentPhase, AgentState, CellPos, CommandAction, MessageBody, ServerFrame,
};

use crate::connection::StreamEvent;
use crate::dispatch::ControlEvent;
use crate::store::Dashboard;
use crate::view::{FlippedTiles, TileImagery, TrailSet, TrailTint, DRONE_COLORS};

const BASE_TILE: (u8, u8, u8) = (0x18, 0x18, 0x1b);
const VISITED_TINT: (u8, u8, u8) = (0x10, 0xb9, 0x81);
const TARGET_RED: (u8, u8, u8) = (0xef, 0x44, 0x44);

/// Everything the draw pass reads: the canonical dashboard plus the
/// view-local trail/flip/imagery state and the notice feed.
pub struct UiState {
    pub dash: Dashboard,
    pub trails: TrailSet,
    pub imagery: TileImagery,
    pub flipped: FlippedTiles,
    pub cursor: CellPos,
    pub notices: VecDeque<String>,
    pub max_notices: usize,
    pub config_field: ConfigField,
    pub draw_tick: u64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            dash: Dashboard::new(),
            trails: TrailSet::default(),
            imagery: TileImagery::default(),
            flipped: FlippedTiles::default(),
            cursor: CellPos::new(0, 0),
            notices: VecDeque::new(),
            max_notices: 8,
            config_field: ConfigField::Grid,
            draw_tick: 0,
        }
    }
}

impl UiState {
    /// Single entry point for stream events; this is the router seam, so
    /// frames apply here in arrival order and nowhere else.
    pub fn handle_stream(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::LinkUp => {
                self.dash.connected = true;
                self.push_notice("Connected to simulation stream");
            }
            StreamEvent::LinkDown => {
                self.dash.connected = false;
                self.push_notice("Stream lost; retrying");
            }
            StreamEvent::Frame(frame) => {
                let is_snapshot = matches!(
                    frame,
                    ServerFrame::InitialState(_) | ServerFrame::StateUpdate(_)
                );
                self.dash.apply_frame(frame);
                if is_snapshot {
                    self.refresh_view();
                }
            }
        }
    }

    /// Trails and imagery follow the canonical snapshot; a reassigned
    /// imagery key resets flip state, exactly once per grid/target change.
    pub fn refresh_view(&mut self) {
        self.trails.observe(&self.dash.agents);
        if self.imagery.refresh(&self.dash.grid) {
            self.flipped.clear();
        }
        let max_x = self.dash.grid.width.saturating_sub(1);
        let max_y = self.dash.grid.height.saturating_sub(1);
        self.cursor = CellPos::new(self.cursor.x.min(max_x), self.cursor.y.min(max_y));
    }

    /// Merge a control outcome. Each arm touches only the keys its action
    /// owns, so a snapshot that raced in between is never overwritten.
    pub fn apply_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Initialized { config, state } => {
                self.dash.config = config;
                self.dash.initialized = true;
                if let Some(snapshot) = state {
                    self.dash.apply_snapshot(*snapshot);
                    self.refresh_view();
                }
                self.push_notice("Simulation initialized");
            }
            ControlEvent::Commanded {
                action,
                summary,
                state,
            } => {
                match action {
                    CommandAction::Stop => {
                        if let Some(patch) = summary {
                            self.dash.metrics.merge(&patch);
                        }
                    }
                    CommandAction::Reset => {
                        self.dash.traffic.clear();
                        self.dash.elapsed_time = 0.0;
                        self.dash.is_running = false;
                        self.dash.is_paused = false;
                        if let Some(snapshot) = state {
                            self.dash.apply_snapshot(*snapshot);
                            self.refresh_view();
                        }
                    }
                    CommandAction::Start | CommandAction::Pause | CommandAction::Resume => {}
                }
                self.push_notice(format!("Simulation {}", past_tense(action)));
            }
            ControlEvent::Hydrated { state, backlog } => {
                self.dash.hydrate(*state, backlog);
                self.refresh_view();
                self.push_notice("Adopted live simulation state");
            }
            ControlEvent::NoActiveRun => {}
            ControlEvent::Metrics(patch) => self.dash.metrics.merge(&patch),
            ControlEvent::Failed { request, error } => {
                self.push_notice(format!("Command failed: {request} ({error})"));
            }
        }
    }

    pub fn push_notice<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.notices.push_front(text);
        while self.notices.len() > self.max_notices {
            self.notices.pop_back();
        }
    }

    pub fn move_cursor(&mut self, dx: i32, dy: i32) {
        let max_x = self.dash.grid.width.saturating_sub(1) as i32;
        let max_y = self.dash.grid.height.saturating_sub(1) as i32;
        let x = (self.cursor.x as i32 + dx).clamp(0, max_x);
        let y = (self.cursor.y as i32 + dy).clamp(0, max_y);
        self.cursor = CellPos::new(x as u32, y as u32);
    }

    pub fn flip_cursor(&mut self) {
        self.flipped.toggle(self.cursor);
    }

    pub fn select_field(&mut self, field: ConfigField) {
        self.config_field = field;
    }

    /// Nudge the selected config field by one slider step. Editing is only
    /// offered while no run is live; the engine still gets the final say at
    /// init time. Grid edits keep width and height equal, like the slider
    /// they replace.
    pub fn adjust_config(&mut self, direction: i64) {
        let config = &mut self.dash.config;
        match self.config_field {
            ConfigField::Grid => {
                config.grid_width = step_toward(
                    config.grid_width,
                    direction,
                    sar_proto::SimConfig::GRID_STEP,
                    sar_proto::SimConfig::GRID_RANGE,
                );
                config.grid_height = config.grid_width;
            }
            ConfigField::Agents => {
                let next = config.num_agents as i64 + direction;
                config.num_agents = clamp_u32(next, sar_proto::SimConfig::AGENT_RANGE);
            }
            ConfigField::Targets => {
                let next = config.num_targets as i64 + direction;
                config.num_targets = clamp_u32(next, sar_proto::SimConfig::TARGET_RANGE);
            }
            ConfigField::Duration => {
                config.duration_seconds = step_toward(
                    config.duration_seconds,
                    direction,
                    sar_proto::SimConfig::DURATION_STEP,
                    sar_proto::SimConfig::DURATION_RANGE,
                );
            }
            ConfigField::Seed => {
                config.seed += direction;
            }
        }
    }
}

fn clamp_u32(value: i64, (lo, hi): (u32, u32)) -> u32 {
    value.clamp(lo as i64, hi as i64) as u32
}

/// Move to the next step-lattice point in the pressed direction, so an
/// off-lattice default like 17 lands on 20 (or 15) on the first press.
fn step_toward(current: u32, direction: i64, step: u32, range: (u32, u32)) -> u32 {
    let current = current as i64;
    let step = step as i64;
    let next = if direction > 0 {
        (current / step + 1) * step
    } else {
        (current + step - 1) / step * step - step
    };
    clamp_u32(next, range)
}

fn past_tense(action: CommandAction) -> &'static str {
    match action {
        CommandAction::Start => "started",
        CommandAction::Stop => "stopped",
        CommandAction::Pause => "paused",
        CommandAction::Resume => "resumed",
        CommandAction::Reset => "reset",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Grid,
    Agents,
    Targets,
    Duration,
    Seed,
}

impl ConfigField {
    pub const ALL: [ConfigField; 5] = [
        ConfigField::Grid,
        ConfigField::Agents,
        ConfigField::Targets,
        ConfigField::Duration,
        ConfigField::Seed,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

pub fn draw_ui(frame: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(12),
            Constraint::Length(9),
            Constraint::Length(5),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], state);
    draw_metrics(frame, chunks[1], state);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(38)])
        .split(chunks[2]);
    draw_map(frame, middle[0], state);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(14), Constraint::Min(4)])
        .split(middle[1]);
    draw_controls(frame, side[0], state);
    draw_roster(frame, side[1], state);

    draw_traffic(frame, chunks[3], state);
    draw_notices(frame, chunks[4], state);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Drone SAR Command");
    let (link_text, link_color) = if state.dash.connected {
        ("Connected", Color::Green)
    } else {
        ("Disconnected", Color::Red)
    };
    let run_text = if state.dash.is_running {
        if state.dash.is_paused {
            Span::styled("PAUSED", Style::default().fg(Color::Yellow))
        } else {
            Span::styled("RUNNING", Style::default().fg(Color::Green))
        }
    } else if state.dash.initialized {
        Span::styled("STANDBY", Style::default().fg(Color::Cyan))
    } else {
        Span::styled("UNINITIALIZED", Style::default().fg(Color::DarkGray))
    };
    let line = Line::from(vec![
        Span::styled(link_text, Style::default().fg(link_color)),
        Span::raw(" | "),
        run_text,
        Span::raw(format!(
            " | {}s / {}s | tick {}",
            state.dash.elapsed_time as u64,
            state.dash.duration_seconds(),
            state.dash.tick
        )),
        Span::raw(" | q to exit"),
    ]);
    let text = Paragraph::new(line).wrap(Wrap { trim: true });
    frame.render_widget(block, area);
    frame.render_widget(
        text,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_metrics(frame: &mut Frame, area: Rect, state: &UiState) {
    let metrics = &state.dash.metrics;
    let total_targets = if metrics.total_targets > 0 {
        metrics.total_targets
    } else {
        state.dash.config.num_targets
    };
    let detection = match metrics.time_to_first_detection {
        Some(seconds) => (format!("{seconds:.1}s"), Color::Green),
        None => ("—".to_string(), Color::DarkGray),
    };
    let coverage_color = if metrics.coverage_percent > 50.0 {
        Color::Green
    } else {
        Color::Yellow
    };
    let battery_color = if metrics.avg_battery > 50.0 {
        Color::Green
    } else if metrics.avg_battery > 25.0 {
        Color::Yellow
    } else {
        Color::Red
    };
    let agents_color = if metrics.active_agents == metrics.total_agents {
        Color::Green
    } else {
        Color::Yellow
    };

    let cells: [(&str, String, Color); 7] = [
        ("FIRST DETECT", detection.0, detection.1),
        (
            "COVERAGE",
            format!("{:.1}%", metrics.coverage_percent),
            coverage_color,
        ),
        (
            "TARGETS",
            format!("{}/{}", metrics.targets_found, total_targets),
            if metrics.targets_found > 0 {
                Color::Red
            } else {
                Color::DarkGray
            },
        ),
        ("HANDOFFS", metrics.handoffs.to_string(), Color::Magenta),
        ("MESSAGES", metrics.total_messages.to_string(), Color::Blue),
        (
            "AVG BATTERY",
            format!("{:.1}%", metrics.avg_battery),
            battery_color,
        ),
        (
            "AGENTS",
            format!("{}/{}", metrics.active_agents, metrics.total_agents),
            agents_color,
        ),
    ];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 7); 7])
        .split(area);
    for (idx, (label, value, color)) in cells.into_iter().enumerate() {
        let block = Block::default().borders(Borders::ALL);
        let lines = vec![
            Line::from(Span::styled(label, Style::default().fg(Color::DarkGray))),
            Line::from(Span::styled(
                value,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
        ];
        frame.render_widget(block, columns[idx]);
        frame.render_widget(
            Paragraph::new(lines),
            columns[idx].inner(&Margin {
                vertical: 1,
                horizontal: 1,
            }),
        );
    }
}

fn draw_map(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Tactical Map");
    let grid = &state.dash.grid;

    let visited: HashSet<CellPos> = grid.visited_tiles.iter().copied().collect();
    let targets: HashSet<CellPos> = grid.target_positions.iter().copied().collect();
    let tints = state.trails.tint_map();
    let pulse_on = state.draw_tick / 5 % 2 == 0;

    let mut lines: Vec<Line> = Vec::with_capacity(grid.height as usize + 3);

    // top ruler, a column label every 5 cells
    let mut ruler = vec![Span::raw("    ")];
    for x in 0..grid.width {
        let label = if x % 5 == 0 {
            format!("{x:<2}")
        } else {
            "  ".to_string()
        };
        ruler.push(Span::styled(label, Style::default().fg(Color::DarkGray)));
    }
    lines.push(Line::from(ruler));

    for y in 0..grid.height {
        let mut spans = Vec::with_capacity(grid.width as usize + 1);
        let left = if y % 5 == 0 {
            format!("{y:>3} ")
        } else {
            "    ".to_string()
        };
        spans.push(Span::styled(left, Style::default().fg(Color::DarkGray)));
        for x in 0..grid.width {
            let cell = CellPos::new(x, y);
            spans.push(cell_span(state, cell, &visited, &targets, &tints, pulse_on));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    lines.push(legend_line(state));
    lines.push(cursor_line(state, &visited, &targets));

    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(lines),
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

/// Render one cell. Precedence: the agent marker sits above the visited
/// tint, which sits above the trail tint; a discovered target keeps pulsing
/// underneath whatever occupies the cell.
fn cell_span(
    state: &UiState,
    cell: CellPos,
    visited: &HashSet<CellPos>,
    targets: &HashSet<CellPos>,
    tints: &std::collections::HashMap<CellPos, TrailTint>,
    pulse_on: bool,
) -> Span<'static> {
    let is_cursor = cell == state.cursor;
    let mut style = Style::default();

    if state.flipped.contains(cell) {
        let span = match state.imagery.get(cell) {
            Some(image) if image.is_person => {
                style = style
                    .fg(Color::White)
                    .bg(Color::Blue)
                    .add_modifier(Modifier::BOLD);
                "P▌"
            }
            Some(_) => {
                style = style.fg(Color::DarkGray);
                "▒▒"
            }
            None => {
                style = style.fg(Color::DarkGray);
                "··"
            }
        };
        if is_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        return Span::styled(span, style);
    }

    let mut bg = BASE_TILE;
    if let Some(tint) = tints.get(&cell) {
        bg = blend(bg, DRONE_COLORS[tint.color_slot % DRONE_COLORS.len()], tint.intensity);
    }
    if visited.contains(&cell) {
        bg = blend(bg, VISITED_TINT, 0.25);
    }
    let has_target = targets.contains(&cell);
    if has_target && pulse_on {
        bg = blend(bg, TARGET_RED, 0.35);
    }
    style = style.bg(Color::Rgb(bg.0, bg.1, bg.2));

    let agent = state
        .dash
        .agents
        .iter()
        .find(|agent| agent.position == cell);
    let text = if let Some(agent) = agent {
        let slot = state
            .trails
            .get(&agent.agent_id)
            .map(|trail| trail.color_slot)
            .unwrap_or(0);
        let (r, g, b) = DRONE_COLORS[slot % DRONE_COLORS.len()];
        style = style.fg(Color::Rgb(r, g, b)).add_modifier(Modifier::BOLD);
        if !agent.state.is_active() {
            style = style.add_modifier(Modifier::DIM);
        }
        marker_glyph(agent)
    } else if has_target {
        style = style.fg(Color::Rgb(TARGET_RED.0, TARGET_RED.1, TARGET_RED.2));
        if pulse_on {
            style = style.add_modifier(Modifier::BOLD);
        }
        "◉ ".to_string()
    } else {
        "  ".to_string()
    };

    if is_cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(text, style)
}

/// Two-character marker from the drone id suffix: DRONE-3 → D3.
fn marker_glyph(agent: &AgentState) -> String {
    let suffix: String = agent
        .agent_id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    match suffix.len() {
        0 => "D?".to_string(),
        1 => format!("D{suffix}"),
        _ => suffix.chars().take(2).collect(),
    }
}

fn legend_line(state: &UiState) -> Line<'static> {
    let mut spans = Vec::new();
    for (idx, agent) in state.dash.agents.iter().take(4).enumerate() {
        let slot = state
            .trails
            .get(&agent.agent_id)
            .map(|trail| trail.color_slot)
            .unwrap_or(idx);
        let (r, g, b) = DRONE_COLORS[slot % DRONE_COLORS.len()];
        spans.push(Span::styled(
            format!("●{} ", marker_glyph(agent)),
            Style::default().fg(Color::Rgb(r, g, b)),
        ));
    }
    spans.push(Span::styled("◉ target  ", Style::default().fg(Color::Red)));
    spans.push(Span::styled("▒ scanned", Style::default().fg(Color::Green)));
    Line::from(spans)
}

fn cursor_line(
    state: &UiState,
    visited: &HashSet<CellPos>,
    targets: &HashSet<CellPos>,
) -> Line<'static> {
    let cell = state.cursor;
    let mut parts = vec![format!("({},{})", cell.x, cell.y)];
    if visited.contains(&cell) {
        parts.push("scanned".to_string());
    }
    if targets.contains(&cell) {
        parts.push("target".to_string());
    }
    if state.flipped.contains(cell) {
        if let Some(image) = state.imagery.get(cell) {
            parts.push(format!(
                "img:{}{}",
                image.name,
                if image.is_person { " [PERSON]" } else { "" }
            ));
        }
    }
    Line::from(Span::styled(
        parts.join("  "),
        Style::default().fg(Color::DarkGray),
    ))
}

fn draw_controls(frame: &mut Frame, area: Rect, state: &UiState) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let mut lines = vec![
        Line::from(vec![key("i"), Span::raw("      initialize / re-apply config")]),
        Line::from(vec![key("s"), Span::raw("      start")]),
        Line::from(vec![key("space"), Span::raw("  pause / resume")]),
        Line::from(vec![key("x"), Span::raw("      stop")]),
        Line::from(vec![key("r"), Span::raw("      reset")]),
        Line::from(vec![
            key("arrows"),
            Span::raw(" cursor   "),
            key("enter"),
            Span::raw(" flip tile"),
        ]),
        Line::from(vec![
            key("tab"),
            Span::raw("    next field   "),
            key("+/-"),
            Span::raw(" adjust"),
        ]),
        Line::from(""),
    ];

    let config = &state.dash.config;
    let fields: [(ConfigField, String); 5] = [
        (
            ConfigField::Grid,
            format!("grid      {}x{}", config.grid_width, config.grid_height),
        ),
        (ConfigField::Agents, format!("agents    {}", config.num_agents)),
        (ConfigField::Targets, format!("targets   {}", config.num_targets)),
        (
            ConfigField::Duration,
            format!("duration  {}s", config.duration_seconds),
        ),
        (ConfigField::Seed, format!("seed      {}", config.seed)),
    ];
    for (field, text) in fields {
        let selected = field == state.config_field;
        let marker = if selected { "▸ " } else { "  " };
        let style = if selected {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(Span::styled(format!("{marker}{text}"), style)));
    }
    if state.dash.is_running {
        lines.push(Line::from(Span::styled(
            "  config locked while running",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Simulation Controls");
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_roster(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Active Units");
    let lines: Vec<Line> = if state.dash.agents.is_empty() {
        vec![Line::from(Span::styled(
            "Initialize simulation to see agents",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        state
            .dash
            .agents
            .iter()
            .map(|agent| roster_line(state, agent))
            .collect()
    };
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn roster_line(state: &UiState, agent: &AgentState) -> Line<'static> {
    let slot = state
        .trails
        .get(&agent.agent_id)
        .map(|trail| trail.color_slot)
        .unwrap_or(0);
    let (r, g, b) = DRONE_COLORS[slot % DRONE_COLORS.len()];
    let filled = (agent.battery / 10.0).round().clamp(0.0, 10.0) as usize;
    let bar: String = "▮".repeat(filled) + &"·".repeat(10 - filled);
    let phase_color = match agent.state {
        AgentPhase::Searching => Color::Blue,
        AgentPhase::Idle => Color::Yellow,
        AgentPhase::Returning => Color::Cyan,
        AgentPhase::Dead => Color::Red,
    };
    Line::from(vec![
        Span::styled(
            format!("{:<3}", marker_glyph(agent)),
            Style::default()
                .fg(Color::Rgb(r, g, b))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(bar, Style::default().fg(Color::Rgb(r, g, b))),
        Span::raw(format!(" {:>5.1}% ", agent.battery)),
        Span::styled(
            format!("{:<9}", agent.state.label()),
            Style::default().fg(phase_color),
        ),
        Span::styled(
            format!(
                "({:>2},{:>2}) a:{} v:{} f:{}",
                agent.position.x,
                agent.position.y,
                agent.assigned_tiles,
                agent.visited_tiles,
                agent.targets_found
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn draw_traffic(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("A2A Traffic ({} messages)", state.dash.traffic.len()));
    let rows = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = if state.dash.traffic.is_empty() {
        vec![Line::from(Span::styled(
            "Awaiting transmissions...",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let mut recent: Vec<&AgentMessage> = state.dash.traffic.iter().rev().take(rows).collect();
        recent.reverse();
        recent.into_iter().map(traffic_line).collect()
    };
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(lines),
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn traffic_line(message: &AgentMessage) -> Line<'static> {
    let kind_label = message
        .body
        .kind()
        .map(|kind| kind.as_str())
        .unwrap_or("UNKNOWN");
    let kind_color = match message.body {
        MessageBody::OfferTile { .. } => Color::Cyan,
        MessageBody::AcceptOffer { .. } | MessageBody::AcceptHandoff { .. } => Color::Green,
        MessageBody::HandoffRequest { .. } => Color::Magenta,
        MessageBody::Heartbeat { .. } => Color::DarkGray,
        MessageBody::TargetFound { .. } => Color::Red,
        MessageBody::Unknown => Color::Gray,
    };
    Line::from(vec![
        Span::styled(
            format!("[{}] ", format_clock(message.timestamp)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{:<9}", message.agent_id),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!("{kind_label:<16}"),
            Style::default().fg(kind_color),
        ),
        Span::styled(payload_summary(&message.body), Style::default().fg(Color::Gray)),
    ])
}

/// Compact per-type payload rendering for the traffic pane.
pub fn payload_summary(body: &MessageBody) -> String {
    match body {
        MessageBody::Heartbeat { position, battery } => {
            format!("pos:({},{}) bat:{:.1}%", position.x, position.y, battery)
        }
        MessageBody::TargetFound { position } => {
            format!("TARGET @ ({},{})", position.x, position.y)
        }
        MessageBody::OfferTile { tiles } => format!("offering {} tiles", tiles.len()),
        MessageBody::AcceptOffer { accepted_tiles } => {
            format!("accepted {} tiles", accepted_tiles.len())
        }
        MessageBody::HandoffRequest { tiles, battery } => {
            format!(
                "requesting handoff of {} tiles (bat:{:.1}%)",
                tiles.len(),
                battery
            )
        }
        MessageBody::AcceptHandoff { from_agent } => {
            format!("accepted handoff from {from_agent}")
        }
        MessageBody::Unknown => String::new(),
    }
}

/// Wall-clock HH:MM:SS.t from fractional epoch seconds.
pub fn format_clock(timestamp: f64) -> String {
    let total = timestamp.max(0.0);
    let day_seconds = (total as u64) % 86_400;
    let hours = day_seconds / 3600;
    let minutes = day_seconds % 3600 / 60;
    let seconds = day_seconds % 60;
    let tenths = ((total.fract()) * 10.0) as u64 % 10;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{tenths}")
}

fn draw_notices(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Notices");
    let lines: Vec<Line> = state
        .notices
        .iter()
        .map(|entry| Line::from(Span::raw(entry.clone())))
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn blend(base: (u8, u8, u8), tint: (u8, u8, u8), alpha: f64) -> (u8, u8, u8) {
    let alpha = alpha.clamp(0.0, 1.0);
    let mix = |b: u8, t: u8| (b as f64 * (1.0 - alpha) + t as f64 * alpha).round() as u8;
    (mix(base.0, tint.0), mix(base.1, tint.1), mix(base.2, tint.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sar_proto::SimConfig;

    #[test]
    fn link_events_drive_the_connectivity_flag() {
        let mut state = UiState::default();
        state.handle_stream(StreamEvent::LinkUp);
        assert!(state.dash.connected);
        state.handle_stream(StreamEvent::LinkDown);
        assert!(!state.dash.connected);
        assert_eq!(state.notices.len(), 2);
    }

    #[test]
    fn notices_are_capped_newest_first() {
        let mut state = UiState::default();
        for seq in 0..12 {
            state.push_notice(format!("notice {seq}\n"));
        }
        assert_eq!(state.notices.len(), state.max_notices);
        assert_eq!(state.notices.front().map(String::as_str), Some("notice 11"));
    }

    #[test]
    fn config_adjust_respects_slider_ranges() {
        let mut state = UiState::default();
        state.select_field(ConfigField::Grid);
        for _ in 0..10 {
            state.adjust_config(1);
        }
        assert_eq!(state.dash.config.grid_width, SimConfig::GRID_RANGE.1);
        assert_eq!(state.dash.config.grid_height, SimConfig::GRID_RANGE.1);
        for _ in 0..10 {
            state.adjust_config(-1);
        }
        assert_eq!(state.dash.config.grid_width, SimConfig::GRID_RANGE.0);

        state.select_field(ConfigField::Agents);
        for _ in 0..10 {
            state.adjust_config(-1);
        }
        assert_eq!(state.dash.config.num_agents, SimConfig::AGENT_RANGE.0);
    }

    #[test]
    fn cursor_stays_inside_the_grid() {
        let mut state = UiState::default();
        state.move_cursor(-3, -3);
        assert_eq!(state.cursor, CellPos::new(0, 0));
        state.move_cursor(100, 100);
        assert_eq!(state.cursor, CellPos::new(16, 14));
    }

    #[test]
    fn marker_glyph_uses_id_suffix() {
        let agent = AgentState {
            agent_id: "DRONE-7".to_string(),
            position: CellPos::new(0, 0),
            battery: 50.0,
            state: AgentPhase::Searching,
            assigned_tiles: 0,
            visited_tiles: 0,
            targets_found: 0,
        };
        assert_eq!(marker_glyph(&agent), "D7");
        let double = AgentState {
            agent_id: "DRONE-12".to_string(),
            ..agent
        };
        assert_eq!(marker_glyph(&double), "12");
    }

    #[test]
    fn clock_formats_fractional_epoch_seconds() {
        // 01:02:03.5 into some day
        let timestamp = 86_400.0 * 19_000.0 + 3_723.5;
        assert_eq!(format_clock(timestamp), "01:02:03.5");
    }

    #[test]
    fn payload_summaries_match_the_terminal_format() {
        assert_eq!(
            payload_summary(&MessageBody::Heartbeat {
                position: CellPos::new(9, 4),
                battery: 83.25,
            }),
            "pos:(9,4) bat:83.2%"
        );
        assert_eq!(
            payload_summary(&MessageBody::AcceptHandoff {
                from_agent: "DRONE-2".to_string(),
            }),
            "accepted handoff from DRONE-2"
        );
        assert_eq!(
            payload_summary(&MessageBody::OfferTile { tiles: vec![] }),
            "offering 0 tiles"
        );
    }
}
