mod common;

use anyhow::Result;
use sar_console::connection::StreamEvent;
use sar_console::ui::UiState;
use sar_proto::{decode_frame, CellPos, ServerFrame};

/// Feed raw lines through the same decode-or-drop gate the stream pump
/// applies, in arrival order.
fn replay(state: &mut UiState, lines: impl IntoIterator<Item = String>) {
    for line in lines {
        match decode_frame(&line) {
            Ok(frame) => state.handle_stream(StreamEvent::Frame(frame)),
            Err(_) => {} // malformed frames drop without damaging the pipeline
        }
    }
}

#[test]
fn recorded_stream_replays_to_a_coherent_view() -> Result<()> {
    let raw = std::fs::read_to_string(common::fixture_path("stream_replay.jsonl"))?;
    let mut state = UiState::default();
    replay(&mut state, raw.lines().map(str::to_string));

    // final snapshot won
    assert_eq!(state.dash.tick, 24);
    assert!((state.dash.elapsed_time - 12.0).abs() < 1e-9);
    assert!(state.dash.is_running);

    // scenario: 4 agents, one dead, coverage and discoveries as given
    assert_eq!(state.dash.metrics.total_agents, 4);
    assert_eq!(state.dash.metrics.active_agents, 3);
    assert!((state.dash.metrics.coverage_percent - 18.4).abs() < 1e-9);
    assert_eq!(state.dash.metrics.targets_found, 1);

    // handoffs come from the pushed counters, not a recount of the log
    assert_eq!(state.dash.metrics.handoffs, 3);
    assert_eq!(state.dash.metrics.total_messages, 12);

    // the metrics push layered on top of the derived view
    assert_eq!(state.dash.metrics.time_to_first_detection, Some(7.5));

    // two well-formed A2A messages survived; the junk line and the unknown
    // frame type vanished without a trace
    assert_eq!(state.dash.traffic.len(), 2);
    let ids: Vec<_> = state
        .dash
        .traffic
        .iter()
        .map(|m| m.message_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["m-1".to_string(), "m-2".to_string()]);
    Ok(())
}

#[test]
fn initial_snapshot_yields_expected_counts() {
    let mut state = UiState::default();
    let mut snapshot = common::snapshot(4, (17, 15), 5);
    snapshot.state.coverage_percent = 7.25;
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(snapshot)));

    assert_eq!(state.dash.metrics.total_agents, 4);
    assert_eq!(state.dash.metrics.active_agents, 4);
    assert!((state.dash.metrics.coverage_percent - 7.25).abs() < 1e-9);
    assert_eq!(state.dash.metrics.targets_found, 5);
    assert!((state.dash.metrics.avg_battery - 100.0).abs() < 1e-9);
}

#[test]
fn later_snapshot_always_wins() {
    let mut state = UiState::default();
    let mut first = common::snapshot(4, (17, 15), 2);
    first.state.coverage_percent = 40.0;
    let mut second = common::snapshot(2, (17, 15), 2);
    second.state.coverage_percent = 10.0;
    second.state.is_running = false;

    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(first)));
    state.handle_stream(StreamEvent::Frame(ServerFrame::StateUpdate(second)));

    assert_eq!(state.dash.agents.len(), 2);
    assert!(!state.dash.is_running);
    assert!((state.dash.metrics.coverage_percent - 10.0).abs() < 1e-9);
}

#[test]
fn traffic_ring_caps_at_one_hundred() {
    let mut state = UiState::default();
    for seq in 1..=150 {
        state.handle_stream(StreamEvent::Frame(common::heartbeat_frame(seq)));
    }
    assert_eq!(state.dash.traffic.len(), 100);
    let first = state.dash.traffic.iter().next().unwrap();
    assert_eq!(first.message_id.as_deref(), Some("m-51"));
    let last = state.dash.traffic.iter().last().unwrap();
    assert_eq!(last.message_id.as_deref(), Some("m-150"));
}

#[test]
fn trails_follow_agents_across_snapshots() {
    let mut state = UiState::default();
    for step in 0..25u32 {
        let mut snapshot = common::snapshot(1, (30, 30), 1);
        snapshot.agents[0].position = CellPos::new(step, 0);
        state.handle_stream(StreamEvent::Frame(ServerFrame::StateUpdate(snapshot)));
    }
    let trail = state.trails.get("DRONE-1").unwrap();
    assert_eq!(trail.cells.len(), 20);
    assert_eq!(trail.cells.back(), Some(&CellPos::new(24, 0)));
    assert_eq!(trail.cells.front(), Some(&CellPos::new(5, 0)));
}

#[test]
fn imagery_resets_flips_only_on_grid_change() {
    let mut state = UiState::default();
    let snapshot = common::snapshot(1, (17, 15), 3);
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(
        snapshot.clone(),
    )));
    state.flipped.toggle(CellPos::new(2, 2));

    // same grid and targets: flips survive the next update
    state.handle_stream(StreamEvent::Frame(ServerFrame::StateUpdate(snapshot)));
    assert!(state.flipped.contains(CellPos::new(2, 2)));

    // a new target set reassigns imagery and clears flips
    let changed = common::snapshot(1, (17, 15), 4);
    state.handle_stream(StreamEvent::Frame(ServerFrame::StateUpdate(changed)));
    assert!(!state.flipped.contains(CellPos::new(2, 2)));
}

#[test]
fn link_events_only_touch_connectivity() {
    let mut state = UiState::default();
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(
        common::snapshot(3, (17, 15), 2),
    )));
    state.handle_stream(StreamEvent::LinkDown);
    assert!(!state.dash.connected);
    assert_eq!(state.dash.agents.len(), 3);
    state.handle_stream(StreamEvent::LinkUp);
    assert!(state.dash.connected);
}
