use std::sync::mpsc::{self, Sender};

use clap::Parser;
use color_eyre::Result;
use tracing::info;

use sar_console::app::{stream_channel, ConsoleApp};
use sar_console::connection;
use sar_console::dispatch::{run_control_pump, ControlClient};

/// Forwards tracing output into the notice pane so log lines never tear
/// the raw-mode terminal.
#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drone SAR tactical console", long_about = None)]
struct Cli {
    /// WebSocket endpoint of the simulation engine's state stream.
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws")]
    endpoint: String,
    /// Base URL of the engine's control API.
    #[arg(long, default_value = "http://127.0.0.1:8000/api")]
    api: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let log_writer_tx = log_tx.clone();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_writer_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    info!("Connecting to simulation at {}", cli.endpoint);

    let (stream_tx, stream_rx) = stream_channel();
    let (control_tx, control_req_rx) = tokio::sync::mpsc::unbounded_channel();
    let (control_event_tx, control_event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let client = ControlClient::new(cli.api.clone());
    tokio::spawn(run_control_pump(client, control_req_rx, control_event_tx));

    let _ui_handle = std::thread::spawn(move || -> color_eyre::Result<()> {
        let app = ConsoleApp::new(
            stream_rx,
            control_event_rx,
            control_tx,
            shutdown_tx,
            log_rx,
        )?;
        app.run()
    });

    connection::run_stream(cli.endpoint, stream_tx, shutdown_rx).await
}
