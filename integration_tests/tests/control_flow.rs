mod common;

use sar_console::connection::StreamEvent;
use sar_console::dispatch::ControlEvent;
use sar_console::ui::UiState;
use sar_proto::{CommandAction, MetricsPatch, ServerFrame, SimConfig};

#[test]
fn init_adopts_canonical_config_and_snapshot() {
    let mut state = UiState::default();
    let engine_config = SimConfig {
        grid_width: 20,
        grid_height: 20,
        num_agents: 6,
        ..SimConfig::default()
    };
    state.apply_control(ControlEvent::Initialized {
        config: engine_config.clone(),
        state: Some(Box::new(common::snapshot(6, (20, 20), 5))),
    });

    assert!(state.dash.initialized);
    assert_eq!(state.dash.config, engine_config);
    assert_eq!(state.dash.agents.len(), 6);
    assert_eq!(state.dash.grid.width, 20);
}

#[test]
fn stop_summary_overrides_metrics_without_a_follow_up() {
    let mut state = UiState::default();
    let mut snapshot = common::snapshot(4, (17, 15), 5);
    snapshot.state.coverage_percent = 42.0;
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(snapshot)));

    state.apply_control(ControlEvent::Commanded {
        action: CommandAction::Stop,
        summary: Some(MetricsPatch {
            coverage_percent: Some(87.5),
            ..MetricsPatch::default()
        }),
        state: None,
    });

    assert!((state.dash.metrics.coverage_percent - 87.5).abs() < 1e-9);
    // the stop response owns nothing else; the roster stays as pushed
    assert_eq!(state.dash.agents.len(), 4);
}

#[test]
fn reset_clears_log_and_flags_and_applies_fresh_state() {
    let mut state = UiState::default();
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(
        common::snapshot(4, (17, 15), 5),
    )));
    for seq in 1..=10 {
        state.handle_stream(StreamEvent::Frame(common::heartbeat_frame(seq)));
    }
    assert_eq!(state.dash.traffic.len(), 10);

    let mut fresh = common::snapshot(4, (17, 15), 5);
    fresh.state.is_running = false;
    fresh.state.elapsed_time = 0.0;
    state.apply_control(ControlEvent::Commanded {
        action: CommandAction::Reset,
        summary: None,
        state: Some(Box::new(fresh)),
    });

    assert!(state.dash.traffic.is_empty());
    assert!(!state.dash.is_running);
    assert!(!state.dash.is_paused);
    assert!((state.dash.elapsed_time - 0.0).abs() < 1e-9);
}

#[test]
fn hydration_adopts_config_and_backfills_traffic() {
    let mut state = UiState::default();
    let mut snapshot = common::snapshot(2, (17, 15), 3);
    snapshot.config = Some(SimConfig {
        num_targets: 3,
        ..SimConfig::default()
    });
    let backlog = vec![common::heartbeat_frame(1), common::heartbeat_frame(2)]
        .into_iter()
        .filter_map(|frame| match frame {
            ServerFrame::A2aMessage(message) => Some(message),
            _ => None,
        })
        .collect();

    state.apply_control(ControlEvent::Hydrated {
        state: Box::new(snapshot),
        backlog,
    });

    assert!(state.dash.initialized);
    assert_eq!(state.dash.config.num_targets, 3);
    assert_eq!(state.dash.traffic.len(), 2);
    assert_eq!(state.dash.agents.len(), 2);
}

#[test]
fn polled_metrics_merge_like_a_push() {
    let mut state = UiState::default();
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(
        common::snapshot(4, (17, 15), 5),
    )));
    state.apply_control(ControlEvent::Metrics(MetricsPatch {
        total_targets: Some(5),
        time_to_first_detection: Some(9.25),
        ..MetricsPatch::default()
    }));
    assert_eq!(state.dash.metrics.time_to_first_detection, Some(9.25));
    assert_eq!(state.dash.metrics.total_targets, 5);
    // untouched fields keep their derived values
    assert_eq!(state.dash.metrics.total_agents, 4);
}

#[test]
fn next_snapshot_overwrites_optimistic_flags_wholesale() {
    let mut state = UiState::default();
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(
        common::snapshot(4, (17, 15), 5),
    )));

    // optimistic stop, as the dispatcher would apply it before any reply
    state.dash.is_running = false;

    // the authoritative stream still says running; it wins
    state.handle_stream(StreamEvent::Frame(ServerFrame::StateUpdate(
        common::snapshot(4, (17, 15), 5),
    )));
    assert!(state.dash.is_running);
}

#[test]
fn command_failure_surfaces_a_notice_and_keeps_state() {
    let mut state = UiState::default();
    state.handle_stream(StreamEvent::Frame(ServerFrame::InitialState(
        common::snapshot(4, (17, 15), 5),
    )));
    state.apply_control(ControlEvent::Failed {
        request: "pause",
        error: "engine unreachable".to_string(),
    });
    assert!(state
        .notices
        .front()
        .is_some_and(|notice| notice.contains("pause")));
    assert!(state.dash.is_running);
}
