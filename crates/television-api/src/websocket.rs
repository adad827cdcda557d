//! Self-healing WebSocket connection.
//!
//! Owns the single transport connection for a session. A background task
//! connects, pumps outbound frames from an unbounded queue, decodes inbound
//! frames into [`Inbound`] values, and hands them to the consumer in arrival
//! order. Whenever the connection closes or errors, readiness drops and a
//! new attempt is made after a fixed delay, forever, until the
//! [`CancellationToken`] fires.
//!
//! # Example
//!
//! ```rust,ignore
//! use television_api::websocket::{Connection, ConnectionConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let config = ConnectionConfig::new("ws://127.0.0.1:8000/tv/".parse()?);
//! let Connection { handle, mut inbound, .. } = Connection::spawn(config, cancel.clone());
//!
//! while let Some(frame) = inbound.recv().await {
//!     println!("{frame:?}");
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::envelope::{DEFAULT_UPDATE_STREAM, Inbound};
use crate::error::Error;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the single transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// An attempt is in flight (or scheduled).
    Connecting,
    /// Upgrade completed; frames may be sent.
    Open,
    /// The last connection closed or failed; a reconnect is pending.
    Closed,
}

// ── ConnectionConfig ─────────────────────────────────────────────────

/// Tuning for the connection loop.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Fully-qualified `ws://` or `wss://` endpoint.
    pub url: Url,

    /// Fixed delay between a close and the next attempt. Default: 1s.
    pub reconnect_delay: Duration,

    /// Stream name whose payloads are re-addressed by model.
    pub update_stream: String,
}

impl ConnectionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect_delay: Duration::from_secs(1),
            update_stream: DEFAULT_UPDATE_STREAM.to_owned(),
        }
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// Everything produced by [`Connection::spawn`].
pub struct Connection {
    /// Cloneable control handle.
    pub handle: ConnectionHandle,
    /// Decoded inbound frames, strictly in arrival order.
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    /// The background connection loop.
    pub task: JoinHandle<()>,
}

impl Connection {
    /// Spawn the connection loop. Returns immediately; the first attempt
    /// happens in the background.
    pub fn spawn(config: ConnectionConfig, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state_tx);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let reinit = Arc::new(Notify::new());

        let handle = ConnectionHandle {
            state: Arc::clone(&state),
            outbound_tx,
            reinit: Arc::clone(&reinit),
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(ws_loop(LoopContext {
            config,
            state,
            outbound_rx,
            inbound_tx,
            reinit,
            cancel,
        }));

        Self {
            handle,
            inbound,
            task,
        }
    }
}

// ── ConnectionHandle ─────────────────────────────────────────────────

/// Control handle for the connection loop. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionHandle {
    state: Arc<watch::Sender<ConnectionState>>,
    outbound_tx: mpsc::UnboundedSender<String>,
    reinit: Arc<Notify>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// `true` only while the connection is open.
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Queue one text frame on the open connection.
    ///
    /// Fails with [`Error::NotReady`] unless the connection is open.
    pub fn send(&self, frame: String) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Shutdown);
        }
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        self.outbound_tx.send(frame).map_err(|_| Error::Shutdown)
    }

    /// Drop the current connection and open a fresh one.
    ///
    /// Readiness is cleared immediately and restored once the new
    /// connection is open. Does nothing after [`shutdown`](Self::shutdown).
    pub fn initialize(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.send_replace(ConnectionState::Connecting);
        self.reinit.notify_one();
    }

    /// Stop the connection loop for good.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

struct LoopContext {
    config: ConnectionConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    reinit: Arc<Notify>,
    cancel: CancellationToken,
}

/// Why a single connection lifecycle ended without an error.
enum Disconnect {
    Closed,
    Reinitialize,
    Cancelled,
}

/// Main loop: connect → pump frames → on close, wait → reconnect.
async fn ws_loop(mut ctx: LoopContext) {
    loop {
        ctx.state.send_replace(ConnectionState::Connecting);

        match connect_and_run(&mut ctx).await {
            Ok(Disconnect::Cancelled) => break,
            Ok(Disconnect::Reinitialize) => {
                tracing::info!("WebSocket re-initialized, reconnecting");
                continue;
            }
            Ok(Disconnect::Closed) => {
                tracing::warn!("WebSocket closed, reopening");
            }
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket error");
            }
        }

        ctx.state.send_replace(ConnectionState::Closed);

        let delay = ctx.config.reconnect_delay;
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            () = ctx.reinit.notified() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }

    ctx.state.send_replace(ConnectionState::Closed);
    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection and pump frames until it drops.
async fn connect_and_run(ctx: &mut LoopContext) -> Result<Disconnect, Error> {
    tracing::info!(url = %ctx.config.url, "Connecting to WebSocket");

    let connect = tokio_tungstenite::connect_async(ctx.config.url.as_str());
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Ok(Disconnect::Cancelled),
        () = ctx.reinit.notified() => return Ok(Disconnect::Reinitialize),
        result = connect => result.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
    };

    ctx.state.send_replace(ConnectionState::Open);
    tracing::info!("WebSocket connected");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(Disconnect::Cancelled);
            }
            () = ctx.reinit.notified() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(Disconnect::Reinitialize);
            }
            frame = ctx.outbound_rx.recv() => {
                // Every handle dropped: nothing can ever be sent again.
                let Some(text) = frame else { return Ok(Disconnect::Cancelled) };
                write
                    .send(Message::Text(text.into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        decode_and_forward(&text, &ctx.config.update_stream, &ctx.inbound_tx);
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong; it goes out with the next write
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(cf) => Err(Error::WebSocketClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.as_str().to_owned(),
                            }),
                            None => {
                                tracing::info!("WebSocket close frame received (no payload)");
                                Ok(Disconnect::Closed)
                            }
                        };
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(Disconnect::Closed);
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Decode a text frame and hand it to the consumer.
fn decode_and_forward(text: &str, update_stream: &str, inbound_tx: &mpsc::UnboundedSender<Inbound>) {
    match Inbound::decode(text, update_stream) {
        Ok(inbound) => {
            // Ignore send errors -- the consumer has gone away
            let _ = inbound_tx.send(inbound);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WebSocket frame");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
