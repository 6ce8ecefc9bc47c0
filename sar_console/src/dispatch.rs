use sar_proto::{
    AgentMessage, CommandAction, CommandReply, CommandRequest, InitReply, MessageBacklog,
    MetricsPatch, MetricsReply, SimConfig, SnapshotData, StateReply,
};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

/// How much of the A2A backlog to request when adopting a live run.
const BACKLOG_LIMIT: u32 = 50;

/// Outbound control work, queued by the UI loop.
#[derive(Debug)]
pub enum ControlRequest {
    Initialize(SimConfig),
    Command(CommandAction),
    FetchInitial,
    PollMetrics,
}

/// Control outcomes routed back into the UI loop. Each carries only the
/// state its originating request owns, so an unrelated snapshot that lands
/// in between is never clobbered.
#[derive(Debug)]
pub enum ControlEvent {
    Initialized {
        config: SimConfig,
        state: Option<Box<SnapshotData>>,
    },
    Commanded {
        action: CommandAction,
        summary: Option<MetricsPatch>,
        state: Option<Box<SnapshotData>>,
    },
    Hydrated {
        state: Box<SnapshotData>,
        backlog: Vec<AgentMessage>,
    },
    NoActiveRun,
    Metrics(MetricsPatch),
    Failed {
        request: &'static str,
        error: String,
    },
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("engine rejected the request: status {0:?}")]
    Rejected(String),
}

/// Typed client for the engine's control API.
pub struct ControlClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControlClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn initialize(&self, config: &SimConfig) -> Result<InitReply, ControlError> {
        let reply: InitReply = self
            .http
            .post(self.url("simulation/init"))
            .json(config)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if reply.status != "initialized" {
            return Err(ControlError::Rejected(reply.status));
        }
        Ok(reply)
    }

    pub async fn command(&self, action: CommandAction) -> Result<CommandReply, ControlError> {
        Ok(self
            .http
            .post(self.url("simulation/command"))
            .json(&CommandRequest { action })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn state(&self) -> Result<StateReply, ControlError> {
        Ok(self
            .http
            .get(self.url("simulation/state"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn messages(&self, limit: u32) -> Result<MessageBacklog, ControlError> {
        Ok(self
            .http
            .get(self.url("simulation/messages"))
            .query(&[("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn metrics(&self) -> Result<MetricsReply, ControlError> {
        Ok(self
            .http
            .get(self.url("simulation/metrics"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

/// Drain control requests until the UI loop goes away. Every request is
/// fire-and-forget from the caller's point of view: failures become events,
/// never retries, and no optimistic state is rolled back here.
pub async fn run_control_pump(
    client: ControlClient,
    mut requests: UnboundedReceiver<ControlRequest>,
    events: UnboundedSender<ControlEvent>,
) {
    while let Some(request) = requests.recv().await {
        let outcome = handle_request(&client, request).await;
        if events.send(outcome).is_err() {
            break;
        }
    }
}

async fn handle_request(client: &ControlClient, request: ControlRequest) -> ControlEvent {
    match request {
        ControlRequest::Initialize(config) => match client.initialize(&config).await {
            Ok(reply) => {
                info!("command.sent=init");
                ControlEvent::Initialized {
                    config: reply.config,
                    state: reply.state.map(Box::new),
                }
            }
            Err(err) => failed("init", err),
        },
        ControlRequest::Command(action) => match client.command(action).await {
            Ok(CommandReply {
                summary, state, ..
            }) => {
                info!("command.sent={}", action.label());
                ControlEvent::Commanded {
                    action,
                    summary,
                    state: state.map(Box::new),
                }
            }
            Err(err) => failed(action.label(), err),
        },
        ControlRequest::FetchInitial => match fetch_initial(client).await {
            Ok(event) => event,
            Err(err) => failed("state fetch", err),
        },
        ControlRequest::PollMetrics => match client.metrics().await {
            Ok(MetricsReply::Ready(patch)) => ControlEvent::Metrics(patch),
            Ok(MetricsReply::NotInitialized { .. }) => ControlEvent::NoActiveRun,
            Err(err) => failed("metrics poll", err),
        },
    }
}

/// Startup hydration: adopt an already-live run and backfill its recent
/// traffic before the stream takes over.
async fn fetch_initial(client: &ControlClient) -> Result<ControlEvent, ControlError> {
    match client.state().await? {
        StateReply::NotInitialized { .. } => Ok(ControlEvent::NoActiveRun),
        StateReply::Ready(state) => {
            let backlog = match client.messages(BACKLOG_LIMIT).await {
                Ok(backlog) => backlog.messages,
                Err(err) => {
                    warn!("Message backlog fetch failed: {}", err);
                    Vec::new()
                }
            };
            Ok(ControlEvent::Hydrated { state, backlog })
        }
    }
}

fn failed(request: &'static str, err: ControlError) -> ControlEvent {
    warn!("Control request '{}' failed: {}", request, err);
    ControlEvent::Failed {
        request,
        error: err.to_string(),
    }
}
