use std::time::Duration;

use color_eyre::Result;
use futures_util::{Stream, StreamExt};
use sar_proto::{decode_frame, ServerFrame};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, trace, warn};

/// Delay before a reconnect attempt after any close or error.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Events the stream side feeds into the UI loop.
#[derive(Debug)]
pub enum StreamEvent {
    LinkUp,
    LinkDown,
    Frame(ServerFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection lifecycle as an explicit state machine with one owned retry
/// slot. The async driver below consults it before every dial and sleep,
/// which is what makes "one connection in flight", "one retry per close",
/// and "nothing after teardown" checkable without a socket.
#[derive(Debug)]
pub struct LinkSupervisor {
    state: LinkState,
    retry_delay: Duration,
    retry_pending: bool,
    torn_down: bool,
}

impl LinkSupervisor {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            state: LinkState::Disconnected,
            retry_delay,
            retry_pending: false,
            torn_down: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Request a dial. Returns true when one should actually begin; a call
    /// while connecting, connected, awaiting a retry, or after teardown is
    /// a no-op.
    pub fn begin_connect(&mut self) -> bool {
        if self.torn_down || self.retry_pending || self.state != LinkState::Disconnected {
            return false;
        }
        self.state = LinkState::Connecting;
        true
    }

    pub fn on_established(&mut self) {
        self.state = LinkState::Connected;
    }

    /// Close or dial failure. Returns the delay to wait before the next
    /// dial, or None when a retry is already owned or teardown happened.
    pub fn on_closed(&mut self) -> Option<Duration> {
        self.state = LinkState::Disconnected;
        if self.torn_down || self.retry_pending {
            return None;
        }
        self.retry_pending = true;
        Some(self.retry_delay)
    }

    /// The owned retry timer fired; the supervisor may dial again.
    pub fn retry_elapsed(&mut self) {
        self.retry_pending = false;
    }

    /// Consumer shutdown: drop the retry slot and refuse further dials.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.retry_pending = false;
        self.state = LinkState::Disconnected;
    }
}

/// Own the stream connection until shutdown: dial, pump frames into the UI
/// loop, and retry on a fixed delay after every close. Connection errors
/// are never fatal; the loop ends only on teardown, which also cancels a
/// pending reconnect sleep and drops the live socket.
pub async fn run_stream(
    endpoint: String,
    events: UnboundedSender<StreamEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut supervisor = LinkSupervisor::new(RECONNECT_DELAY);

    loop {
        if *shutdown.borrow() {
            supervisor.teardown();
        }
        if supervisor.is_torn_down() {
            info!("Stream supervisor torn down");
            break;
        }
        if !supervisor.begin_connect() {
            break;
        }

        match connect_async(endpoint.as_str()).await {
            Ok((socket, _)) => {
                supervisor.on_established();
                info!("Connected to simulation stream at {}", endpoint);
                if events.send(StreamEvent::LinkUp).is_err() {
                    supervisor.teardown();
                    break;
                }
                if pump_frames(socket, &events, &mut shutdown).await.is_err() {
                    // UI receiver is gone; nothing left to reconnect for
                    supervisor.teardown();
                    break;
                }
                let _ = events.send(StreamEvent::LinkDown);
                warn!("Stream closed; reconnecting in {:?}", RECONNECT_DELAY);
            }
            Err(err) => {
                warn!("Failed to connect to {}: {}", endpoint, err);
            }
        }

        if *shutdown.borrow() {
            supervisor.teardown();
            break;
        }
        let Some(delay) = supervisor.on_closed() else {
            break;
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => supervisor.retry_elapsed(),
            _ = shutdown.changed() => supervisor.teardown(),
        }
    }

    Ok(())
}

/// Read frames until the socket closes or teardown fires. Malformed frames
/// are logged and dropped; only a dead UI receiver is an error.
async fn pump_frames<S>(
    mut socket: S,
    events: &UnboundedSender<StreamEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), ()>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let incoming = tokio::select! {
            incoming = socket.next() => incoming,
            _ = shutdown.changed() => return Ok(()),
        };
        let Some(incoming) = incoming else {
            return Ok(());
        };
        let message = match incoming {
            Ok(message) => message,
            Err(err) => {
                warn!("Stream read error: {}", err);
                return Ok(());
            }
        };
        match message {
            Message::Text(text) => match decode_frame(&text) {
                Ok(frame) => {
                    trace!("stream.frame");
                    if events.send(StreamEvent::Frame(frame)).is_err() {
                        return Err(());
                    }
                }
                Err(err) => warn!("Dropping malformed frame: {}", err),
            },
            Message::Close(_) => return Ok(()),
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {}
        }
    }
}
