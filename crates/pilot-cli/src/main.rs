//! `pilot-bridge` – republishes the robot's Pilot buttons as topics.
//!
//! 1. Loads `~/.pilot/config.toml` plus `PILOT_*` overrides.
//! 2. Logs in to the Desk once; a failed login aborts startup.
//! 3. Starts the rosbridge WebSocket server for downstream consumers.
//! 4. Opens the Desk navigation event stream and publishes the five signals
//!    for every frame until Ctrl-C/SIGTERM or until the Desk drops the stream.

mod config;
mod logging;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use pilot_desk::{Credential, DeskClient, DeskEndpoint, EventStream, StreamExit, TlsTrust, WsEventSource};
use pilot_middleware::{ButtonPublisher, EventBus, RosbridgeServer};
use pilot_types::PilotError;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Events buffered per bus channel before slow subscribers start lagging.
const BUS_CAPACITY: usize = 64;

fn main() -> ExitCode {
    logging::init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pilot bridge terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), PilotError> {
    let cfg = config::load()?;
    cfg.validate()?;
    info!(config = ?cfg, "configuration loaded");

    // ── Session ───────────────────────────────────────────────────────────
    let endpoint = DeskEndpoint::new(&cfg.host, cfg.tls);
    if endpoint.tls() == TlsTrust::AcceptSelfSigned {
        warn!(host = endpoint.host(), "certificate verification disabled for the Desk");
    }
    let client = DeskClient::new(endpoint)?;
    let session = {
        let credential = Credential::new(&cfg.username, &cfg.password);
        client.login(&credential).await?
    };

    // ── Publishing surface ────────────────────────────────────────────────
    let bus = Arc::new(EventBus::new(BUS_CAPACITY, cfg.topic_prefix.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.rosbridge_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PilotError::Transport(format!("rosbridge bind error on {addr}: {e}")))?;
    info!(%addr, "rosbridge server listening");
    let rosbridge = tokio::spawn(RosbridgeServer::new(Arc::clone(&bus)).serve(listener));

    // ── Event stream ──────────────────────────────────────────────────────
    let source = WsEventSource::connect(client.endpoint(), &session).await?;
    let mut stream = EventStream::start(source, ButtonPublisher::new(Arc::clone(&bus)));

    let shutdown = Arc::new(Notify::new());
    let notify = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || notify.notify_one()) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the bridge can only be killed");
    }

    let exit = tokio::select! {
        _ = shutdown.notified() => None,
        exit = stream.finished() => Some(exit),
    };
    let exit = match exit {
        Some(exit) => exit,
        None => {
            info!("shutdown requested, stopping event stream");
            stream.stop().await
        }
    };
    rosbridge.abort();

    match exit {
        StreamExit::Stopped => {
            info!("event stream stopped");
            Ok(())
        }
        StreamExit::Closed => Err(PilotError::Transport(
            "event stream closed by the Desk".to_string(),
        )),
        StreamExit::Failed(e) => Err(e),
    }
}
