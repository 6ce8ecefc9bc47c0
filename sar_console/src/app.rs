use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use sar_proto::CommandAction;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::warn;

use crate::connection::StreamEvent;
use crate::dispatch::{ControlEvent, ControlRequest};
use crate::metrics::PollGate;
use crate::ui::{draw_ui, ConfigField, UiState};

pub struct ConsoleApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    stream_rx: UnboundedReceiver<StreamEvent>,
    control_rx: UnboundedReceiver<ControlEvent>,
    control_tx: UnboundedSender<ControlRequest>,
    shutdown_tx: watch::Sender<bool>,
    log_rx: Receiver<String>,
    poll_gate: PollGate,
}

impl ConsoleApp {
    pub fn new(
        stream_rx: UnboundedReceiver<StreamEvent>,
        control_rx: UnboundedReceiver<ControlEvent>,
        control_tx: UnboundedSender<ControlRequest>,
        shutdown_tx: watch::Sender<bool>,
        log_rx: Receiver<String>,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state: UiState::default(),
            stream_rx,
            control_rx,
            control_tx,
            shutdown_tx,
            log_rx,
            poll_gate: PollGate::default(),
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now();

        // adopt a run that is already live before the stream takes over
        let _ = self.control_tx.send(ControlRequest::FetchInitial);

        loop {
            while let Ok(event) = self.stream_rx.try_recv() {
                self.ui_state.handle_stream(event);
            }

            while let Ok(event) = self.control_rx.try_recv() {
                self.handle_control(event);
            }

            while let Ok(line) = self.log_rx.try_recv() {
                self.ui_state.push_notice(line);
            }

            if self.poll_gate.due(
                self.ui_state.dash.is_running,
                self.ui_state.dash.is_paused,
                Instant::now(),
            ) {
                self.send_request(ControlRequest::PollMetrics);
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                self.ui_state.draw_tick += 1;
                self.terminal.draw(|frame| draw_ui(frame, &self.ui_state))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if !self.handle_key(key.code) {
                        break;
                    }
                }
            }
        }

        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        let _ = self.shutdown_tx.send(true);
        Ok(())
    }

    /// Returns false when the operator asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('i') => self.request_initialize(),
            KeyCode::Char('s') => self.request_start(),
            KeyCode::Char(' ') => self.request_pause_resume(),
            KeyCode::Char('x') => self.request_stop(),
            KeyCode::Char('r') => self.request_reset(),
            KeyCode::Up => self.ui_state.move_cursor(0, -1),
            KeyCode::Down => self.ui_state.move_cursor(0, 1),
            KeyCode::Left => self.ui_state.move_cursor(-1, 0),
            KeyCode::Right => self.ui_state.move_cursor(1, 0),
            KeyCode::Enter => self.ui_state.flip_cursor(),
            KeyCode::Tab => {
                let next = self.ui_state.config_field.next();
                self.ui_state.select_field(next);
            }
            KeyCode::Char('1') => self.ui_state.select_field(ConfigField::Grid),
            KeyCode::Char('2') => self.ui_state.select_field(ConfigField::Agents),
            KeyCode::Char('3') => self.ui_state.select_field(ConfigField::Targets),
            KeyCode::Char('4') => self.ui_state.select_field(ConfigField::Duration),
            KeyCode::Char('5') => self.ui_state.select_field(ConfigField::Seed),
            KeyCode::Char('=') | KeyCode::Char('+') => self.adjust_config(1),
            KeyCode::Char('-') | KeyCode::Char('_') => self.adjust_config(-1),
            _ => {}
        }
        true
    }

    fn adjust_config(&mut self, direction: i64) {
        if self.ui_state.dash.is_running {
            self.ui_state
                .push_notice("Config is locked while the simulation runs");
            return;
        }
        self.ui_state.adjust_config(direction);
    }

    /// Init (or re-init with edited config) is allowed whenever no run is
    /// live; the engine's echoed config becomes canonical on success.
    fn request_initialize(&mut self) {
        if self.ui_state.dash.is_running {
            self.ui_state.push_notice("Stop the simulation before re-initializing");
            return;
        }
        let mut config = self.ui_state.dash.config.clone();
        config.sanitize();
        self.send_request(ControlRequest::Initialize(config));
    }

    fn request_start(&mut self) {
        if !self.ui_state.dash.initialized || self.ui_state.dash.is_running {
            return;
        }
        // optimistic: the next authoritative snapshot reconciles any drift
        self.ui_state.dash.is_running = true;
        self.ui_state.dash.is_paused = false;
        self.send_request(ControlRequest::Command(CommandAction::Start));
    }

    fn request_pause_resume(&mut self) {
        if !self.ui_state.dash.is_running {
            return;
        }
        let action = if self.ui_state.dash.is_paused {
            self.ui_state.dash.is_paused = false;
            CommandAction::Resume
        } else {
            self.ui_state.dash.is_paused = true;
            CommandAction::Pause
        };
        self.send_request(ControlRequest::Command(action));
    }

    fn request_stop(&mut self) {
        if !self.ui_state.dash.is_running {
            return;
        }
        self.ui_state.dash.is_running = false;
        self.send_request(ControlRequest::Command(CommandAction::Stop));
    }

    fn request_reset(&mut self) {
        if !self.ui_state.dash.initialized {
            return;
        }
        self.send_request(ControlRequest::Command(CommandAction::Reset));
    }

    fn send_request(&mut self, request: ControlRequest) {
        if self.control_tx.send(request).is_err() {
            warn!("Control pump is gone; request dropped");
            self.ui_state.push_notice("Control channel closed");
        }
    }

    fn handle_control(&mut self, event: ControlEvent) {
        self.ui_state.apply_control(event);
    }
}

pub fn stream_channel() -> (UnboundedSender<StreamEvent>, UnboundedReceiver<StreamEvent>) {
    unbounded_channel()
}
