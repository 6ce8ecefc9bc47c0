use std::path::PathBuf;

use sar_proto::{
    AgentMessage, AgentPhase, AgentState, CellPos, GridSnapshot, MessageBody, MessageStats,
    RunStatus, ServerFrame, SnapshotData,
};

/// Build a roster of healthy searching drones, ids DRONE-1.., spread along
/// the diagonal.
pub fn roster(count: usize) -> Vec<AgentState> {
    (1..=count)
        .map(|n| AgentState {
            agent_id: format!("DRONE-{n}"),
            position: CellPos::new(n as u32, n as u32),
            battery: 100.0,
            state: AgentPhase::Searching,
            assigned_tiles: 0,
            visited_tiles: 0,
            targets_found: 0,
        })
        .collect()
}

pub fn snapshot(agents: usize, grid: (u32, u32), targets: usize) -> SnapshotData {
    SnapshotData {
        config: None,
        state: RunStatus {
            tick: 1,
            elapsed_time: 1.0,
            is_running: true,
            is_paused: false,
            coverage_percent: 0.0,
            targets_found: Vec::new(),
        },
        agents: roster(agents),
        grid: GridSnapshot {
            width: grid.0,
            height: grid.1,
            visited_tiles: Vec::new(),
            target_positions: (0..targets as u32).map(|n| CellPos::new(n, 0)).collect(),
            all_targets: None,
        },
        message_stats: MessageStats::default(),
    }
}

pub fn heartbeat_frame(seq: usize) -> ServerFrame {
    ServerFrame::A2aMessage(AgentMessage {
        message_id: Some(format!("m-{seq}")),
        timestamp: seq as f64,
        agent_id: "DRONE-1".to_string(),
        body: MessageBody::Heartbeat {
            position: CellPos::new(0, 0),
            battery: 95.0,
        },
    })
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
