use std::time::{Duration, Instant};

use sar_proto::{AgentState, MessageKind, MessageStats, MetricsPatch};

/// Cadence of the metrics endpoint poll while a run is live.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Merged metrics view: locally derived counters recomputed per snapshot,
/// overridden field-by-field by whatever the server pushes or the poll
/// returns for that tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsBoard {
    pub time_to_first_detection: Option<f64>,
    pub coverage_percent: f64,
    pub targets_found: u32,
    pub total_targets: u32,
    pub handoffs: u64,
    pub total_messages: u64,
    pub avg_battery: f64,
    pub active_agents: u32,
    pub total_agents: u32,
}

impl Default for MetricsBoard {
    fn default() -> Self {
        Self {
            time_to_first_detection: None,
            coverage_percent: 0.0,
            targets_found: 0,
            total_targets: 5,
            handoffs: 0,
            total_messages: 0,
            // optimistic default; zero would trip battery alarms pre-init
            avg_battery: 100.0,
            active_agents: 0,
            total_agents: 0,
        }
    }
}

impl MetricsBoard {
    /// Rebuild the locally derivable subset from a fresh snapshot. Coverage
    /// and targets-found come from the push itself; handoffs and the total
    /// message count stay server-authoritative via `stats`.
    pub fn recompute(
        &mut self,
        agents: &[AgentState],
        coverage_percent: f64,
        targets_found: u32,
        stats: &MessageStats,
    ) {
        self.total_messages = stats.total_sent;
        self.coverage_percent = coverage_percent;
        self.targets_found = targets_found;
        self.handoffs = stats.count(MessageKind::AcceptHandoff);
        self.total_agents = agents.len() as u32;
        self.active_agents = agents.iter().filter(|a| a.state.is_active()).count() as u32;
        self.avg_battery = if agents.is_empty() {
            100.0
        } else {
            agents.iter().map(|a| a.battery).sum::<f64>() / agents.len() as f64
        };
    }

    /// Shallow-merge a server patch; present fields win, absent fields keep
    /// the derived value. A missing first-detection time never clears one
    /// already observed.
    pub fn merge(&mut self, patch: &MetricsPatch) {
        if patch.time_to_first_detection.is_some() {
            self.time_to_first_detection = patch.time_to_first_detection;
        }
        if let Some(value) = patch.coverage_percent {
            self.coverage_percent = value;
        }
        if let Some(value) = patch.targets_found {
            self.targets_found = value;
        }
        if let Some(value) = patch.total_targets {
            self.total_targets = value;
        }
        if let Some(value) = patch.handoffs {
            self.handoffs = value;
        }
        if let Some(value) = patch.total_messages {
            self.total_messages = value;
        }
        if let Some(value) = patch.avg_battery {
            self.avg_battery = value;
        }
        if let Some(value) = patch.active_agents {
            self.active_agents = value;
        }
        if let Some(value) = patch.total_agents {
            self.total_agents = value;
        }
    }
}

/// Decides when the 2 s metrics poll fires. Armed only while the run is
/// live and unpaused; dropping either flag disarms instantly, and the next
/// arming starts a fresh interval rather than resuming a stale one.
#[derive(Debug)]
pub struct PollGate {
    interval: Duration,
    armed_at: Option<Instant>,
}

impl Default for PollGate {
    fn default() -> Self {
        Self::new(POLL_INTERVAL)
    }
}

impl PollGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            armed_at: None,
        }
    }

    /// Returns true when a fetch should fire at `now`.
    pub fn due(&mut self, running: bool, paused: bool, now: Instant) -> bool {
        if !running || paused {
            self.armed_at = None;
            return false;
        }
        match self.armed_at {
            None => {
                self.armed_at = Some(now);
                false
            }
            Some(armed) if now.duration_since(armed) >= self.interval => {
                self.armed_at = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}
