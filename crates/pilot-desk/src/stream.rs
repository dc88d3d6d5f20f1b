//! Desk navigation event stream.
//!
//! The Desk pushes Pilot button changes as JSON text frames on
//! `wss://{host}/desk/api/navigation/events`.  [`EventStream`] owns the
//! background worker that reads those frames and hands each decoded
//! [`ButtonEvent`] to the handler registered at start time.
//!
//! The worker reads through the [`EventSource`] trait so the transport can be
//! swapped out; [`WsEventSource`] is the real WebSocket implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use pilot_types::{ButtonEvent, ButtonHandler, PilotError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info, warn};

use crate::endpoint::DeskEndpoint;
use crate::session::Session;

/// Streaming endpoint for Pilot button events.
pub const EVENTS_PATH: &str = "/desk/api/navigation/events";

/// How long one receive waits before the worker re-checks its stop flag.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of a single receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame.
    Text(String),
    /// Nothing to hand on: the receive timed out or a control frame arrived.
    Idle,
    /// The peer closed the connection.
    Closed,
}

/// Source of raw Desk frames.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Wait at most `timeout` for the next frame.
    ///
    /// A timeout is not an error and must be reported as [`Frame::Idle`].
    async fn recv(&mut self, timeout: Duration) -> Result<Frame, PilotError>;
}

/// Build the upgrade request for the Desk event stream.
///
/// The session token travels as the `authorization` header, not as a cookie.
pub fn stream_request(endpoint: &DeskEndpoint, session: &Session) -> Result<Request, PilotError> {
    upgrade_request(&endpoint.wss_url(EVENTS_PATH), session)
}

fn upgrade_request(url: &str, session: &Session) -> Result<Request, PilotError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| PilotError::Transport(format!("invalid stream url {url}: {e}")))?;
    let token = HeaderValue::from_str(session.token())
        .map_err(|e| PilotError::Transport(format!("session token is not a valid header: {e}")))?;
    request.headers_mut().insert("authorization", token);
    Ok(request)
}

/// Live WebSocket connection to a Desk event stream.
pub struct WsEventSource<S = MaybeTlsStream<TcpStream>> {
    ws: WebSocketStream<S>,
}

impl WsEventSource {
    /// Open the event stream with [`stream_request`].
    ///
    /// # Errors
    ///
    /// [`PilotError::Transport`] when the handshake fails.
    pub async fn connect(endpoint: &DeskEndpoint, session: &Session) -> Result<Self, PilotError> {
        let request = stream_request(endpoint, session)?;
        let url = request.uri().clone();
        let connector = endpoint.ws_connector()?;
        let (ws, response) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| PilotError::Transport(format!("event stream connect to {url}: {e}")))?;
        debug!(status = %response.status(), %url, "event stream connected");
        Ok(Self::new(ws))
    }
}

impl<S> WsEventSource<S> {
    /// Read frames from an already upgraded connection.
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl<S> EventSource for WsEventSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn recv(&mut self, timeout: Duration) -> Result<Frame, PilotError> {
        let Ok(next) = tokio::time::timeout(timeout, self.ws.next()).await else {
            return Ok(Frame::Idle);
        };
        match next {
            Some(Ok(Message::Text(text))) => Ok(Frame::Text(text.as_str().to_string())),
            Some(Ok(Message::Close(_))) | None => Ok(Frame::Closed),
            Some(Ok(_)) => Ok(Frame::Idle),
            Some(Err(e)) => Err(PilotError::Transport(format!("event stream read: {e}"))),
        }
    }
}

/// Why the stream worker ended.
#[derive(Debug)]
pub enum StreamExit {
    /// [`EventStream::stop`] was called.
    Stopped,
    /// The Desk closed the connection.
    Closed,
    /// The connection failed, or the worker panicked.
    Failed(PilotError),
}

/// Lifecycle owner of the background receive loop.
///
/// The worker checks the stop flag once per receive, so stopping takes at
/// most one [`RECV_TIMEOUT`].  Dropping the stream requests a stop but does
/// not wait for it.
pub struct EventStream {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<StreamExit>>,
}

impl EventStream {
    /// Spawn the receive loop on `source`, delivering frames to `handler`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<S, H>(source: S, handler: H) -> Self
    where
        S: EventSource,
        H: ButtonHandler,
    {
        Self::start_with_timeout(source, handler, RECV_TIMEOUT)
    }

    /// Like [`start`][Self::start] with a custom receive timeout.
    pub fn start_with_timeout<S, H>(source: S, handler: H, timeout: Duration) -> Self
    where
        S: EventSource,
        H: ButtonHandler,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(receive_loop(source, handler, Arc::clone(&stop), timeout));
        info!("event stream listening");
        Self {
            stop,
            worker: Some(worker),
        }
    }

    /// `true` until a stop is requested or the worker ends on its own.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
            && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Request a stop and wait for the worker to exit.
    ///
    /// Once this returns the handler is never invoked again.  Calling it on
    /// an already finished stream returns [`StreamExit::Stopped`].
    pub async fn stop(&mut self) -> StreamExit {
        self.stop.store(true, Ordering::Release);
        self.finished().await
    }

    /// Wait for the worker to end without requesting a stop.
    ///
    /// Cancel safe: dropping the future leaves the stream untouched.
    pub async fn finished(&mut self) -> StreamExit {
        let Some(worker) = self.worker.as_mut() else {
            return StreamExit::Stopped;
        };
        let exit = match worker.await {
            Ok(exit) => exit,
            Err(e) => StreamExit::Failed(PilotError::Transport(format!("stream worker aborted: {e}"))),
        };
        self.worker = None;
        exit
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

async fn receive_loop<S, H>(
    mut source: S,
    mut handler: H,
    stop: Arc<AtomicBool>,
    timeout: Duration,
) -> StreamExit
where
    S: EventSource,
    H: ButtonHandler,
{
    while !stop.load(Ordering::Acquire) {
        match source.recv(timeout).await {
            Ok(Frame::Idle) => continue,
            Ok(Frame::Text(text)) => match serde_json::from_str::<ButtonEvent>(&text) {
                Ok(event) => handler.on_event(&event),
                Err(e) => warn!(error = %e, frame = %text, "skipping malformed event frame"),
            },
            Ok(Frame::Closed) => {
                info!("event stream closed by peer");
                return StreamExit::Closed;
            }
            Err(e) => {
                warn!(error = %e, "event stream failed");
                return StreamExit::Failed(e);
            }
        }
    }
    debug!("event stream stopped");
    StreamExit::Stopped
}
