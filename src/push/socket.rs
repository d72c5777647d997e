//! WebSocket transport with automatic reconnection
//!
//! Owns the physical connection: ping/pong liveness, exponential backoff
//! reconnects, and a channel pair the manager uses to exchange raw frames.

use super::types::SocketEvent;
use crate::feed::FeedError;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Transport configuration
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Attempt ceiling for the initial connect (0 = infinite); once a
    /// connection has succeeded, reconnects retry indefinitely
    pub max_connect_attempts: u32,
    /// Initial delay before the first reconnection attempt
    pub initial_reconnect_delay: Duration,
    /// Cap on the reconnection delay
    pub max_reconnect_delay: Duration,
    /// Interval between liveness probes
    pub ping_interval: Duration,
    /// Deadline for the liveness response
    pub pong_timeout: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connect_attempts: 10,
            initial_reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(30),
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

impl SocketConfig {
    /// Create a config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Exponential backoff schedule for reconnect delays
///
/// Yields the initial delay, then doubles on every failure up to the cap.
#[derive(Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    /// Create a schedule starting at `initial`, capped at `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// The delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    /// Restart the schedule after a successful connect
    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Reconnecting WebSocket transport
pub struct PushSocket {
    config: SocketConfig,
}

impl PushSocket {
    /// Create a transport with the given configuration
    pub fn new(config: SocketConfig) -> Self {
        Self { config }
    }

    /// Connect and return the event receiver plus an outbound frame sender
    ///
    /// Spawns a background task that owns the connection, reconnects with
    /// exponential backoff, and emits `Connected`/`Reconnecting`/
    /// `Disconnected` status events alongside inbound frames. The task
    /// exits when the receiver is dropped or reconnection gives up.
    pub fn connect(&self) -> (mpsc::Receiver<SocketEvent>, mpsc::Sender<String>) {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (send_tx, send_rx) = mpsc::channel(256);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = run_connection_loop(config, event_tx, send_rx).await {
                tracing::error!(error = %e, "push socket loop failed");
            }
        });

        (event_rx, send_tx)
    }
}

async fn run_connection_loop(
    config: SocketConfig,
    tx: mpsc::Sender<SocketEvent>,
    mut send_rx: mpsc::Receiver<String>,
) -> Result<(), FeedError> {
    let mut attempts = 0u32;
    let mut ever_connected = false;
    let mut backoff = Backoff::new(config.initial_reconnect_delay, config.max_reconnect_delay);

    loop {
        match connect_and_stream(&config, &tx, &mut send_rx, &mut ever_connected, &mut backoff)
            .await
        {
            Ok(()) => {
                tracing::info!("push socket closed cleanly");
                let _ = tx.send(SocketEvent::Disconnected).await;
                return Ok(());
            }
            Err(e) => {
                attempts += 1;
                tracing::warn!(error = %e, attempt = attempts, "push socket error, reconnecting");

                // The attempt ceiling only guards the initial connect;
                // an established feed retries indefinitely.
                if !ever_connected
                    && config.max_connect_attempts > 0
                    && attempts >= config.max_connect_attempts
                {
                    tracing::error!("initial connect attempts exhausted");
                    let _ = tx.send(SocketEvent::Disconnected).await;
                    return Err(e);
                }

                if tx.is_closed() {
                    tracing::debug!("event receiver dropped, stopping reconnection");
                    return Ok(());
                }

                let _ = tx.send(SocketEvent::Reconnecting { attempt: attempts }).await;
                sleep(backoff.next_delay()).await;
            }
        }
    }
}

async fn connect_and_stream(
    config: &SocketConfig,
    tx: &mpsc::Sender<SocketEvent>,
    send_rx: &mut mpsc::Receiver<String>,
    ever_connected: &mut bool,
    backoff: &mut Backoff,
) -> Result<(), FeedError> {
    tracing::info!(url = %config.url, "connecting push socket");

    let (ws_stream, _response) = connect_async(&config.url)
        .await
        .map_err(|e| FeedError::Transport(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    *ever_connected = true;
    backoff.reset();

    if tx.send(SocketEvent::Connected).await.is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(config.ping_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First tick fires immediately; skip it so the probe cadence starts
    // one interval after connect.
    ping_interval.tick().await;

    let mut pong_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if tx.send(SocketEvent::Text(text)).await.is_err() {
                            tracing::debug!("event receiver dropped, closing connection");
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await
                            .map_err(|e| FeedError::Transport(e.to_string()))?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("received close frame");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(FeedError::Transport(e.to_string()));
                    }
                    None => {
                        return Err(FeedError::Transport("stream ended unexpectedly".into()));
                    }
                    _ => {}
                }
            }

            out = send_rx.recv() => {
                match out {
                    Some(text) => {
                        write.send(Message::Text(text)).await
                            .map_err(|e| FeedError::Transport(e.to_string()))?;
                    }
                    None => {
                        // Sender dropped, shut the connection down.
                        return Ok(());
                    }
                }
            }

            _ = ping_interval.tick() => {
                write.send(Message::Ping(vec![])).await
                    .map_err(|e| FeedError::Transport(e.to_string()))?;
                if pong_deadline.is_none() {
                    pong_deadline = Some(Instant::now() + config.pong_timeout);
                }
            }

            _ = async {
                match pong_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                return Err(FeedError::Transport("liveness response timed out".into()));
            }
        }
    }
}
