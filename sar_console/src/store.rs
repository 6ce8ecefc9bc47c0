use std::collections::VecDeque;

use sar_proto::{
    AgentMessage, AgentState, GridSnapshot, MessageStats, ServerFrame, SimConfig, SnapshotData,
};
use tracing::trace;

use crate::metrics::MetricsBoard;

/// Display cap for the A2A traffic ring.
pub const TRAFFIC_CAP: usize = 100;

/// Canonical client-side snapshot of the simulation. Only the stream router
/// and the control-reply handlers write here; everything else reads.
#[derive(Debug, Default)]
pub struct Dashboard {
    pub connected: bool,
    pub initialized: bool,
    pub config: SimConfig,
    pub agents: Vec<AgentState>,
    pub grid: GridSnapshot,
    pub tick: u64,
    pub elapsed_time: f64,
    pub is_running: bool,
    pub is_paused: bool,
    pub message_stats: MessageStats,
    pub traffic: TrafficLog,
    pub metrics: MetricsBoard,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one decoded frame. Snapshots replace the canonical fields
    /// wholesale; keepalives and unrecognized tags are dropped.
    pub fn apply_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::InitialState(snapshot) | ServerFrame::StateUpdate(snapshot) => {
                self.apply_snapshot(snapshot);
            }
            ServerFrame::A2aMessage(message) => self.traffic.append(message),
            ServerFrame::MetricsUpdate(patch) => self.metrics.merge(&patch),
            ServerFrame::Keepalive => trace!("stream.keepalive"),
            ServerFrame::Unknown => trace!("stream.frame_ignored"),
        }
    }

    /// Replace agents, grid, elapsed time, and run flags from a snapshot,
    /// then recompute the locally derived metrics. Snapshot `config` is
    /// intentionally not adopted here; only init/hydration owns it.
    pub fn apply_snapshot(&mut self, snapshot: SnapshotData) {
        self.agents = snapshot.agents;
        self.grid = snapshot.grid;
        self.tick = snapshot.state.tick;
        self.elapsed_time = snapshot.state.elapsed_time;
        self.is_running = snapshot.state.is_running;
        self.is_paused = snapshot.state.is_paused;
        self.message_stats = snapshot.message_stats;

        let targets_found = if snapshot.state.targets_found.is_empty() {
            self.grid.target_positions.len()
        } else {
            snapshot.state.targets_found.len()
        };
        self.metrics.recompute(
            &self.agents,
            snapshot.state.coverage_percent,
            targets_found as u32,
            &self.message_stats,
        );
    }

    /// Adopt a REST snapshot on startup: unlike stream snapshots this also
    /// takes the engine's canonical config and marks the run initialized.
    pub fn hydrate(&mut self, snapshot: SnapshotData, backlog: Vec<AgentMessage>) {
        if let Some(config) = snapshot.config.clone() {
            self.config = config;
        }
        self.initialized = true;
        self.apply_snapshot(snapshot);
        for message in backlog {
            self.traffic.append(message);
        }
    }

    pub fn duration_seconds(&self) -> u32 {
        self.config.duration_seconds
    }
}

/// Append-only ring of inter-agent messages, oldest first, truncated from
/// the front once the cap is exceeded.
#[derive(Debug)]
pub struct TrafficLog {
    entries: VecDeque<AgentMessage>,
    cap: usize,
}

impl Default for TrafficLog {
    fn default() -> Self {
        Self::with_cap(TRAFFIC_CAP)
    }
}

impl TrafficLog {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn append(&mut self, message: AgentMessage) {
        self.entries.push_back(message);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Chronological iteration, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AgentMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
