//! Persistent WebSocket connection to a Cube.
//!
//! One background task owns the read half of the socket and runs the
//! connect / listen / retry cycle. The write half sits behind a mutex that
//! [`Connection::send`] and the idle ping share; the task swaps it on every
//! reconnect and clears it on every disconnect, so a send either reaches the
//! live socket or is dropped.
//!
//! Every write is bounded by the idle timeout. A write that fails or stalls
//! clears the sink and wakes the read loop, which tears the link down and
//! reconnects.

use crate::{ConnectionConfig, ConnectionError};
use cubelink_core::{Command, ConnectionState, RawFrame, decode_frame};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::futures::Notified;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Receives every successfully decoded inbound frame.
///
/// Runs on the read loop: while it runs, no further frames are read and the
/// idle clock is stalled. Hand slow work off to another task.
pub trait FrameHandler: Send + Sync + 'static {
    fn on_frame(&self, frame: RawFrame);
}

impl<F> FrameHandler for F
where
    F: Fn(RawFrame) + Send + Sync + 'static,
{
    fn on_frame(&self, frame: RawFrame) {
        self(frame)
    }
}

/// A self-healing connection to one Cube.
pub struct Connection {
    shared: Arc<Shared>,
    handler: Arc<dyn FrameHandler>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    config: ConnectionConfig,
    sink: tokio::sync::Mutex<Option<WsSink>>,
    /// Woken when a write fails and the sink is dropped.
    broken: Notify,
    shutdown: watch::Sender<bool>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU64,
}

impl Connection {
    /// Create an idle connection; nothing happens until [`start`](Self::start).
    pub fn new(config: ConnectionConfig, handler: impl FrameHandler) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            shared: Arc::new(Shared {
                config,
                sink: tokio::sync::Mutex::new(None),
                broken: Notify::new(),
                shutdown,
                state,
                attempts: AtomicU64::new(0),
            }),
            handler: Arc::new(handler),
            task: Mutex::new(None),
        }
    }

    /// Spawn the connect loop. Returns at once; a second call while the loop
    /// is running does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut task = self.task();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        self.shared.shutdown.send_replace(false);
        self.shared.state.send_replace(ConnectionState::Connecting);
        *task = Some(tokio::spawn(run(
            Arc::clone(&self.shared),
            Arc::clone(&self.handler),
        )));
    }

    /// Stop the loop, close the socket, and wait for the loop to exit.
    ///
    /// Once this returns the frame handler is not called again and no
    /// further connect attempts are made.
    pub async fn stop(&self) {
        let Some(task) = self.task().take() else {
            return;
        };
        self.shared.state.send_replace(ConnectionState::Draining);
        self.shared.shutdown.send_replace(true);

        // The loop closes the socket itself on its way out.
        if let Err(e) = task.await {
            if e.is_panic() {
                tracing::error!("connection task panicked");
            }
        }
        self.shared.state.send_replace(ConnectionState::Idle);
        tracing::info!(url = %self.shared.config.url, "connection stopped");
    }

    /// Send a command if the connection is live; otherwise drop it.
    ///
    /// The request id and api key are added here. Failures are logged, not
    /// returned: the Cube's own notifications are the only confirmation.
    /// A write that does not finish within the idle timeout is abandoned and
    /// the link is torn down.
    pub async fn send(&self, command: &Command) {
        let text = match command.to_envelope(&self.shared.config.api_key) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(method = command.method(), error = %e, "failed to encode command");
                return;
            }
        };

        match self.shared.write(Message::Text(text.into())).await {
            Ok(()) => {}
            Err(ConnectionError::NotConnected) => {
                tracing::debug!(method = command.method(), "not connected, command dropped");
            }
            Err(e) => {
                tracing::error!(method = command.method(), error = %e, "send failed, command dropped");
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the connection is live, up to `within`.
    pub async fn wait_connected(&self, within: Duration) -> bool {
        let mut state = self.watch_state();
        let connected = tokio::time::timeout(within, state.wait_for(|s| s.is_connected())).await;
        matches!(connected, Ok(Ok(_)))
    }

    /// Connect attempts made since creation.
    pub fn connect_attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::Relaxed)
    }

    /// Settings this connection was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // The loop cannot be joined here; tell it to exit on its own.
        self.shared.shutdown.send_replace(true);
    }
}

impl Shared {
    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn transition(&self, state: ConnectionState) {
        if !self.stopping() {
            self.state.send_replace(state);
        }
    }

    /// Write one message, bounded by the idle timeout. On failure the sink
    /// is dropped and the read loop is woken to reconnect.
    async fn write(&self, message: Message) -> Result<(), ConnectionError> {
        let limit = self.config.idle_timeout;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(ConnectionError::NotConnected)?;

        let error = match tokio::time::timeout(limit, sink.send(message)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => ConnectionError::Transport(e),
            Err(_) => ConnectionError::WriteTimeout(limit),
        };
        *guard = None;
        drop(guard);
        self.broken.notify_waiters();
        Err(error)
    }

    async fn ping(&self) -> Result<(), ConnectionError> {
        self.write(Message::Ping(Vec::<u8>::new().into())).await
    }

    async fn close_sink(&self) {
        let limit = self.config.idle_timeout;
        let Ok(mut guard) = tokio::time::timeout(limit, self.sink.lock()).await else {
            tracing::debug!("sink busy, socket dropped without close");
            return;
        };
        let Some(mut sink) = guard.take() else { return };
        drop(guard);
        match tokio::time::timeout(limit, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "error closing websocket"),
            Err(_) => tracing::debug!("timed out closing websocket"),
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // An error means the sender is gone, which also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn run(shared: Arc<Shared>, handler: Arc<dyn FrameHandler>) {
    let mut shutdown = shared.shutdown.subscribe();
    let config = &shared.config;

    loop {
        if shared.stopping() {
            break;
        }
        let attempt = shared.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        shared.transition(ConnectionState::Connecting);
        tracing::info!(url = %config.url, attempt, "connecting to cube");

        let connected = tokio::select! {
            biased;
            () = stopped(&mut shutdown) => break,
            result = connect(config) => result,
        };

        match connected {
            Ok(stream) => {
                let (sink, source) = stream.split();
                // Registered before the sink is shared so no failed write is missed.
                let broken = shared.broken.notified();
                tokio::pin!(broken);
                broken.as_mut().enable();

                *shared.sink.lock().await = Some(sink);
                shared.transition(ConnectionState::Connected);
                tracing::info!(url = %config.url, "websocket connected");

                let ended = listen(&shared, source, &mut shutdown, broken, handler.as_ref()).await;
                shared.close_sink().await;
                if let Err(e) = ended {
                    tracing::warn!(error = %e, "websocket disconnected");
                }
            }
            Err(e) => tracing::error!(url = %config.url, error = %e, "websocket connection error"),
        }

        if shared.stopping() {
            break;
        }
        shared.transition(ConnectionState::Connecting);
        tracing::warn!(
            retry_in = ?config.reconnect_interval,
            "websocket down, retrying"
        );
        tokio::select! {
            biased;
            () = stopped(&mut shutdown) => break,
            () = tokio::time::sleep(config.reconnect_interval) => {}
        }
    }

    tracing::debug!(url = %config.url, "connection loop exited");
}

async fn connect(config: &ConnectionConfig) -> Result<WsStream, ConnectionError> {
    match tokio::time::timeout(config.idle_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ConnectionError::HandshakeTimeout(config.idle_timeout)),
    }
}

/// Read until the socket fails or stop is requested. `Ok` means stop.
async fn listen(
    shared: &Shared,
    mut source: WsSource,
    shutdown: &mut watch::Receiver<bool>,
    mut broken: Pin<&mut Notified<'_>>,
    handler: &dyn FrameHandler,
) -> Result<(), ConnectionError> {
    let idle = shared.config.idle_timeout;

    loop {
        let next = tokio::select! {
            biased;
            () = stopped(shutdown) => return Ok(()),
            () = broken.as_mut() => return Err(ConnectionError::WriteFailed),
            next = tokio::time::timeout(idle, source.next()) => next,
        };

        let message = match next {
            Err(_) => {
                tracing::warn!(?idle, "websocket idle, sending ping");
                tokio::select! {
                    biased;
                    () = stopped(shutdown) => return Ok(()),
                    pinged = shared.ping() => pinged?,
                }
                continue;
            }
            Ok(None) => return Err(ConnectionError::Closed),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(Some(Ok(message))) => message,
        };

        let body: &[u8] = match &message {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data,
            Message::Close(frame) => {
                tracing::debug!(?frame, "peer sent close");
                return Err(ConnectionError::Closed);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        match decode_frame(body) {
            Ok(frame) => {
                if shared.stopping() {
                    return Ok(());
                }
                handler.on_frame(frame);
            }
            Err(e) => tracing::error!(
                error = %e,
                frame = %String::from_utf8_lossy(body),
                "bad websocket message, discarded"
            ),
        }
    }
}
