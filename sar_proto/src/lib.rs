use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One inbound frame from the simulation stream, discriminated by `type`
/// with the body under `data`. Tags the engine does not document yet fall
/// into `Unknown` and are dropped by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    InitialState(SnapshotData),
    StateUpdate(SnapshotData),
    #[serde(rename = "A2A_MESSAGE")]
    A2aMessage(AgentMessage),
    MetricsUpdate(MetricsPatch),
    Keepalive,
    #[serde(other)]
    Unknown,
}

/// Full simulation snapshot as pushed on INITIAL_STATE / STATE_UPDATE and
/// returned by the state endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub config: Option<SimConfig>,
    pub state: RunStatus,
    pub agents: Vec<AgentState>,
    pub grid: GridSnapshot,
    #[serde(default)]
    pub message_stats: MessageStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatus {
    #[serde(default)]
    pub tick: u64,
    #[serde(default)]
    pub elapsed_time: f64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub coverage_percent: f64,
    #[serde(default)]
    pub targets_found: Vec<CellPos>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    pub position: CellPos,
    pub battery: f64,
    pub state: AgentPhase,
    #[serde(default)]
    pub assigned_tiles: u32,
    #[serde(default)]
    pub visited_tiles: u32,
    #[serde(default)]
    pub targets_found: u32,
}

/// Drone lifecycle phase as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentPhase {
    Searching,
    Idle,
    Returning,
    Dead,
}

impl AgentPhase {
    pub fn is_active(self) -> bool {
        self != AgentPhase::Dead
    }

    pub fn label(self) -> &'static str {
        match self {
            AgentPhase::Searching => "searching",
            AgentPhase::Idle => "idle",
            AgentPhase::Returning => "returning",
            AgentPhase::Dead => "dead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: u32,
    pub y: u32,
}

impl CellPos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub visited_tiles: Vec<CellPos>,
    #[serde(default)]
    pub target_positions: Vec<CellPos>,
    /// Ground-truth target set, present only when the engine exposes it for
    /// imagery assignment. Discovered targets live in `target_positions`.
    #[serde(default)]
    pub all_targets: Option<Vec<CellPos>>,
}

impl Default for GridSnapshot {
    fn default() -> Self {
        Self {
            width: 17,
            height: 15,
            visited_tiles: Vec::new(),
            target_positions: Vec::new(),
            all_targets: None,
        }
    }
}

/// One inter-agent communication event. `message_id` may be absent; display
/// falls back to the log index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    pub timestamp: f64,
    pub agent_id: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// Payload variants keyed by the message `type` tag. Unrecognized types
/// land in `Unknown` so a new negotiation verb never breaks the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageBody {
    OfferTile {
        #[serde(default)]
        tiles: Vec<CellPos>,
    },
    AcceptOffer {
        #[serde(default)]
        accepted_tiles: Vec<CellPos>,
    },
    HandoffRequest {
        #[serde(default)]
        tiles: Vec<CellPos>,
        #[serde(default)]
        battery: f64,
    },
    AcceptHandoff {
        from_agent: String,
    },
    Heartbeat {
        position: CellPos,
        battery: f64,
    },
    TargetFound {
        position: CellPos,
    },
    #[serde(other)]
    Unknown,
}

impl MessageBody {
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            MessageBody::OfferTile { .. } => Some(MessageKind::OfferTile),
            MessageBody::AcceptOffer { .. } => Some(MessageKind::AcceptOffer),
            MessageBody::HandoffRequest { .. } => Some(MessageKind::HandoffRequest),
            MessageBody::AcceptHandoff { .. } => Some(MessageKind::AcceptHandoff),
            MessageBody::Heartbeat { .. } => Some(MessageKind::Heartbeat),
            MessageBody::TargetFound { .. } => Some(MessageKind::TargetFound),
            MessageBody::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageKind {
    OfferTile,
    AcceptOffer,
    HandoffRequest,
    AcceptHandoff,
    Heartbeat,
    TargetFound,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::OfferTile => "OFFER_TILE",
            MessageKind::AcceptOffer => "ACCEPT_OFFER",
            MessageKind::HandoffRequest => "HANDOFF_REQUEST",
            MessageKind::AcceptHandoff => "ACCEPT_HANDOFF",
            MessageKind::Heartbeat => "HEARTBEAT",
            MessageKind::TargetFound => "TARGET_FOUND",
        }
    }
}

/// Send counters as maintained by the engine's message bus. Keys stay raw
/// strings so an unrecognized message type never poisons a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageStats {
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub by_type: BTreeMap<String, u64>,
}

impl MessageStats {
    pub fn count(&self, kind: MessageKind) -> u64 {
        self.by_type.get(kind.as_str()).copied().unwrap_or(0)
    }
}

/// Partial metrics as pushed on METRICS_UPDATE, returned by the metrics
/// endpoint, and attached to a `stop` reply as the terminal summary.
/// Absent fields leave the receiving view untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsPatch {
    pub time_to_first_detection: Option<f64>,
    pub coverage_percent: Option<f64>,
    pub targets_found: Option<u32>,
    pub total_targets: Option<u32>,
    pub handoffs: Option<u64>,
    pub total_messages: Option<u64>,
    pub avg_battery: Option<f64>,
    pub active_agents: Option<u32>,
    pub total_agents: Option<u32>,
}

/// User-editable run parameters. The engine may clamp further; the copy it
/// returns from `init` is canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub num_agents: u32,
    pub num_targets: u32,
    pub duration_seconds: u32,
    pub seed: i64,
    pub tick_interval: f64,
    pub detection_probability: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_width: 17,
            grid_height: 15,
            num_agents: 4,
            num_targets: 5,
            duration_seconds: 180,
            seed: 42,
            tick_interval: 0.5,
            detection_probability: 0.7,
        }
    }
}

impl SimConfig {
    pub const GRID_RANGE: (u32, u32) = (10, 30);
    pub const GRID_STEP: u32 = 5;
    pub const AGENT_RANGE: (u32, u32) = (2, 8);
    pub const TARGET_RANGE: (u32, u32) = (1, 15);
    pub const DURATION_RANGE: (u32, u32) = (30, 300);
    pub const DURATION_STEP: u32 = 30;

    /// Clamp every field into its editable range. The step constants are
    /// editing increments only; the default 17x15 grid sits off the step
    /// lattice and must survive a round trip untouched.
    pub fn sanitize(&mut self) {
        self.grid_width = self.grid_width.clamp(Self::GRID_RANGE.0, Self::GRID_RANGE.1);
        self.grid_height = self
            .grid_height
            .clamp(Self::GRID_RANGE.0, Self::GRID_RANGE.1);
        self.num_agents = self.num_agents.clamp(Self::AGENT_RANGE.0, Self::AGENT_RANGE.1);
        self.num_targets = self
            .num_targets
            .clamp(Self::TARGET_RANGE.0, Self::TARGET_RANGE.1);
        self.duration_seconds = self
            .duration_seconds
            .clamp(Self::DURATION_RANGE.0, Self::DURATION_RANGE.1);
        self.tick_interval = self.tick_interval.clamp(0.1, 2.0);
        self.detection_probability = self.detection_probability.clamp(0.1, 1.0);
    }
}

/// Body for `POST command`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    pub action: CommandAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    Start,
    Stop,
    Pause,
    Resume,
    Reset,
}

impl CommandAction {
    pub fn label(self) -> &'static str {
        match self {
            CommandAction::Start => "start",
            CommandAction::Stop => "stop",
            CommandAction::Pause => "pause",
            CommandAction::Resume => "resume",
            CommandAction::Reset => "reset",
        }
    }
}

/// Reply to `POST init`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitReply {
    pub status: String,
    pub config: SimConfig,
    #[serde(default)]
    pub state: Option<SnapshotData>,
}

/// Reply to `POST command`. `summary` arrives on `stop`, `state` on `reset`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandReply {
    pub status: String,
    #[serde(default)]
    pub summary: Option<MetricsPatch>,
    #[serde(default)]
    pub state: Option<SnapshotData>,
}

/// Reply to `GET messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBacklog {
    #[serde(default)]
    pub messages: Vec<AgentMessage>,
}

/// Reply to `GET state`: either a live snapshot or the not-initialized
/// sentinel. Variant order matters: the sentinel carries a `status` key a
/// snapshot never has.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StateReply {
    NotInitialized { status: String },
    Ready(Box<SnapshotData>),
}

/// Reply to `GET metrics`, same sentinel convention as [`StateReply`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetricsReply {
    NotInitialized { status: String },
    Ready(MetricsPatch),
}

#[derive(Debug, Error)]
pub enum FrameDecodeError {
    #[error("frame decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn decode_frame(data: &str) -> Result<ServerFrame, FrameDecodeError> {
    Ok(serde_json::from_str(data)?)
}

pub fn encode_frame(frame: &ServerFrame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}
