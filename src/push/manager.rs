//! Push-feed connection manager
//!
//! Owns the single low-latency connection: keeps the subscription set at
//! the top-N instruments from the priority queue, converts inbound frames
//! into cache updates, and re-subscribes the previously active set after
//! every reconnect.

use super::socket::{PushSocket, SocketConfig};
use super::types::{parse_control_ack, parse_tick_frame, ConnState, ControlMessage, SocketEvent};
use crate::auth::TokenProvider;
use crate::cache::PriceCache;
use crate::feed::{FeedEvent, Source};
use crate::priority::PriorityQueue;
use crate::telemetry::metrics;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Push-feed manager configuration
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Transport settings
    pub socket: SocketConfig,
    /// Vendor-imposed ceiling on concurrent subscriptions
    pub capacity: usize,
    /// Transaction id of the tick stream
    pub quote_tr_id: String,
    /// Interval between subscription rebalances
    pub rebalance_interval: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            socket: SocketConfig::default(),
            capacity: 40,
            quote_tr_id: "QUOTE0".to_string(),
            rebalance_interval: Duration::from_secs(10),
        }
    }
}

struct ManagerState {
    conn: ConnState,
    /// Currently subscribed instrument codes; never exceeds capacity.
    active: HashSet<String>,
    /// Out-of-band subscriptions re-issued on every reconnect, e.g.
    /// execution notices: (transaction id, key).
    out_of_band: Vec<(String, String)>,
}

/// Compute the subscription diff for one rebalance pass
///
/// Returns (unsubscribe, subscribe). Removals are issued before additions
/// so the active set never exceeds capacity in between.
pub fn plan_rebalance(
    current: &HashSet<String>,
    desired: &[String],
) -> (Vec<String>, Vec<String>) {
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();
    let unsubscribe: Vec<String> = current
        .iter()
        .filter(|code| !desired_set.contains(code.as_str()))
        .cloned()
        .collect();
    let subscribe: Vec<String> = desired
        .iter()
        .filter(|code| !current.contains(*code))
        .cloned()
        .collect();
    (unsubscribe, subscribe)
}

/// Manages the persistent push-feed connection and its subscription set
pub struct PushFeedManager {
    config: PushConfig,
    cache: Arc<PriceCache>,
    queue: Arc<PriorityQueue>,
    tokens: Arc<dyn TokenProvider>,
    state: Mutex<ManagerState>,
    rebalance_hint: Notify,
    events: mpsc::Sender<FeedEvent>,
}

impl PushFeedManager {
    /// Create a manager; `run` must be called to start it
    pub fn new(
        config: PushConfig,
        cache: Arc<PriceCache>,
        queue: Arc<PriorityQueue>,
        tokens: Arc<dyn TokenProvider>,
        events: mpsc::Sender<FeedEvent>,
    ) -> Self {
        Self {
            config,
            cache,
            queue,
            tokens,
            state: Mutex::new(ManagerState {
                conn: ConnState::Disconnected,
                active: HashSet::new(),
                out_of_band: Vec::new(),
            }),
            rebalance_hint: Notify::new(),
            events,
        }
    }

    /// Snapshot of the currently subscribed instrument codes
    pub fn active_set(&self) -> HashSet<String> {
        self.state.lock().active.clone()
    }

    /// Current connection state
    pub fn conn_state(&self) -> ConnState {
        self.state.lock().conn
    }

    /// Register an out-of-band subscription re-issued on every reconnect
    pub fn add_out_of_band(&self, tr_id: impl Into<String>, key: impl Into<String>) {
        self.state
            .lock()
            .out_of_band
            .push((tr_id.into(), key.into()));
    }

    /// Ask for a rebalance ahead of the next scheduled interval
    pub fn poke(&self) {
        self.rebalance_hint.notify_one();
    }

    /// Connect and run until cancelled or the transport gives up
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        {
            let mut state = self.state.lock();
            // Tasks only start out of the connecting transition; a second
            // `run` on a live manager is a bug.
            if state.conn != ConnState::Disconnected {
                tracing::error!(state = ?state.conn, "push manager already running");
                return;
            }
            state.conn = ConnState::Connecting;
        }

        let socket = PushSocket::new(self.config.socket.clone());
        let (sock_rx, sock_tx) = socket.connect();
        self.run_with_transport(cancel, sock_rx, sock_tx).await;
    }

    /// Drive the manager over an already-established transport
    ///
    /// Split out from `run` so tests can inject a channel-backed transport.
    pub async fn run_with_transport(
        self: Arc<Self>,
        cancel: CancellationToken,
        mut sock_rx: mpsc::Receiver<SocketEvent>,
        sock_tx: mpsc::Sender<String>,
    ) {
        let conn_id = Uuid::new_v4();
        tracing::info!(%conn_id, "push manager started");

        let mut rebalance = tokio::time::interval(self.config.rebalance_interval);
        rebalance.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(%conn_id, "push manager stopping");
                    break;
                }

                event = sock_rx.recv() => {
                    match event {
                        Some(SocketEvent::Connected) => {
                            self.on_connected(&sock_tx).await;
                        }
                        Some(SocketEvent::Text(text)) => {
                            self.on_frame(&text).await;
                        }
                        Some(SocketEvent::Reconnecting { attempt }) => {
                            self.state.lock().conn = ConnState::Reconnecting;
                            let _ = self.events.send(FeedEvent::Reconnecting {
                                source: Source::Push,
                                attempt,
                            }).await;
                        }
                        Some(SocketEvent::Disconnected) | None => {
                            self.state.lock().conn = ConnState::Disconnected;
                            let _ = self.events.send(FeedEvent::Disconnected {
                                source: Source::Push,
                            }).await;
                            tracing::warn!(%conn_id, "push transport closed");
                            break;
                        }
                    }
                }

                _ = rebalance.tick() => {
                    self.rebalance(&sock_tx).await;
                }

                _ = self.rebalance_hint.notified() => {
                    self.rebalance(&sock_tx).await;
                }
            }
        }

        self.state.lock().conn = ConnState::Disconnected;
    }

    /// Re-subscribe the previously active set plus out-of-band entries
    async fn on_connected(&self, sock_tx: &mpsc::Sender<String>) {
        {
            let mut state = self.state.lock();
            state.conn = ConnState::Connected;
        }
        let _ = self
            .events
            .send(FeedEvent::Connected {
                source: Source::Push,
            })
            .await;

        let (actives, out_of_band) = {
            let state = self.state.lock();
            (
                state.active.iter().cloned().collect::<Vec<_>>(),
                state.out_of_band.clone(),
            )
        };
        tracing::info!(
            resubscribe = actives.len(),
            out_of_band = out_of_band.len(),
            "push connected, restoring subscriptions"
        );

        for code in actives {
            self.send_control(sock_tx, true, &self.config.quote_tr_id, &code)
                .await;
        }
        for (tr_id, key) in out_of_band {
            self.send_control(sock_tx, true, &tr_id, &key).await;
        }
    }

    /// Handle one inbound frame: control ack or tick envelope
    async fn on_frame(&self, text: &str) {
        if let Some(ack) = parse_control_ack(text) {
            match ack.msg_cd.as_deref() {
                Some("0") | None => {
                    tracing::debug!(tr_id = ?ack.tr_id, msg = ?ack.msg1, "control ack");
                }
                Some(code) => {
                    tracing::warn!(tr_id = ?ack.tr_id, code, msg = ?ack.msg1, "control rejected");
                }
            }
            return;
        }

        match parse_tick_frame(text) {
            Ok(ticks) => {
                for tick in ticks {
                    let code = tick.code.clone();
                    if self.cache.update(tick) {
                        metrics::tick_accepted(Source::Push);
                        let _ = self.events.try_send(FeedEvent::TickAccepted {
                            source: Source::Push,
                            code,
                        });
                    } else {
                        metrics::tick_rejected(Source::Push);
                        let _ = self.events.try_send(FeedEvent::TickRejected {
                            source: Source::Push,
                            code,
                        });
                    }
                }
            }
            Err(e) => {
                // Malformed frames are dropped without affecting others.
                tracing::warn!(
                    error = %e,
                    preview = %text.chars().take(80).collect::<String>(),
                    "dropping undecodable push frame"
                );
            }
        }
    }

    /// Diff the desired top-N set against the active set and apply it
    async fn rebalance(&self, sock_tx: &mpsc::Sender<String>) {
        if self.conn_state() != ConnState::Connected {
            return;
        }

        let desired: Vec<String> = self
            .queue
            .get_top(self.config.capacity)
            .into_iter()
            .map(|(code, _)| code)
            .collect();

        let (unsubscribe, subscribe) = {
            let state = self.state.lock();
            plan_rebalance(&state.active, &desired)
        };
        if unsubscribe.is_empty() && subscribe.is_empty() {
            return;
        }

        tracing::debug!(
            remove = unsubscribe.len(),
            add = subscribe.len(),
            "rebalancing push subscriptions"
        );

        // Trim before adding so the active set never exceeds capacity. The
        // set only changes once the control message actually went out; a
        // failed send leaves the diff in place for the next pass to retry.
        for code in &unsubscribe {
            if self
                .send_control(sock_tx, false, &self.config.quote_tr_id, code)
                .await
            {
                self.state.lock().active.remove(code);
            }
        }
        for code in &subscribe {
            if self
                .send_control(sock_tx, true, &self.config.quote_tr_id, code)
                .await
            {
                self.state.lock().active.insert(code.clone());
            }
        }

        metrics::push_subscriptions(self.state.lock().active.len());
    }

    /// Send one subscribe/unsubscribe control message
    ///
    /// Returns whether the message went out. Individual failures are logged
    /// and never abort the batch.
    async fn send_control(
        &self,
        sock_tx: &mpsc::Sender<String>,
        subscribe: bool,
        tr_id: &str,
        key: &str,
    ) -> bool {
        let approval_key = match self.tokens.credential().await {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(error = %e, "credential provider failed");
                let _ = self.events.try_send(FeedEvent::SubscribeFailed {
                    code: key.to_string(),
                    reason: e.to_string(),
                });
                return false;
            }
        };

        let message = if subscribe {
            ControlMessage::subscribe(&approval_key, tr_id, key)
        } else {
            ControlMessage::unsubscribe(&approval_key, tr_id, key)
        };

        match message.to_json() {
            Ok(json) => {
                if sock_tx.send(json).await.is_err() {
                    tracing::warn!(key, "transport closed while sending control message");
                    return false;
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, key, "failed to encode control message");
                let _ = self.events.try_send(FeedEvent::SubscribeFailed {
                    code: key.to_string(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }
}
