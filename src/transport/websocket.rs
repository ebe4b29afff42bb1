//! Transport adapter: a persistent bidirectional websocket connection with
//! exponential-backoff reconnection, an at-most-one snapshot buffer handed
//! off to the planning task, and drop-on-disconnect publish semantics.

use super::codec;
use crate::types::snapshot::WorldTickSnapshot;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const BACKOFF_MIN: Duration = Duration::from_millis(500);
const BACKOFF_MAX: Duration = Duration::from_secs(5);

struct Backoff {
    current: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self { current: BACKOFF_MIN }
    }

    fn reset(&mut self) {
        self.current = BACKOFF_MIN;
    }

    /// Returns the delay to wait before the next attempt and doubles it,
    /// capped at `BACKOFF_MAX`.
    fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(BACKOFF_MAX);
        delay
    }
}

/// Counters surfaced in the heartbeat: receive/send counts and the
/// accumulated drop count. `dropped_ticks` is shared between the snapshot
/// buffer (overwritten inbound snapshots) and the publisher (outbound
/// messages dropped while disconnected), so both report through the same
/// heartbeat field.
#[derive(Debug, Default)]
pub struct TransportStats {
    pub ws_rx: AtomicU64,
    pub ws_tx: AtomicU64,
    pub dropped_ticks: AtomicU64,
}

impl TransportStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.ws_rx.load(Ordering::Relaxed),
            self.ws_tx.load(Ordering::Relaxed),
            self.dropped_ticks.load(Ordering::Relaxed),
        )
    }
}

/// At-most-one buffer protected by one mutex and one condition variable:
/// incoming snapshots overwrite any still-pending snapshot, and the planning
/// task blocks on the condvar for the next one.
pub struct SnapshotBuffer {
    pending: Mutex<Option<WorldTickSnapshot>>,
    condvar: Condvar,
    shutdown: AtomicBool,
    stats: Arc<TransportStats>,
}

impl SnapshotBuffer {
    pub fn new(stats: Arc<TransportStats>) -> Self {
        Self {
            pending: Mutex::new(None),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            stats,
        }
    }

    /// Overwrites any unconsumed snapshot; the overwritten one counts as
    /// dropped.
    pub fn publish(&self, snapshot: WorldTickSnapshot) {
        let mut guard = self.pending.lock().expect("snapshot buffer mutex poisoned");
        if guard.is_some() {
            self.stats.dropped_ticks.fetch_add(1, Ordering::Relaxed);
        }
        *guard = Some(snapshot);
        self.condvar.notify_one();
    }

    /// Blocks until a snapshot is available or shutdown is signaled.
    pub fn take_blocking(&self) -> Option<WorldTickSnapshot> {
        let mut guard = self.pending.lock().expect("snapshot buffer mutex poisoned");
        loop {
            if let Some(snapshot) = guard.take() {
                return Some(snapshot);
            }
            if self.shutdown.load(Ordering::Relaxed) {
                return None;
            }
            guard = self.condvar.wait(guard).expect("snapshot buffer mutex poisoned");
        }
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _guard = self.pending.lock().expect("snapshot buffer mutex poisoned");
        self.condvar.notify_all();
    }
}

/// Drives the inbound receive / outbound send loop against a single
/// `(ws_url, room_id)` connection identity, reconnecting on drop.
pub struct WebSocketTransport {
    ws_url: String,
    room_id: String,
    pub buffer: Arc<SnapshotBuffer>,
    pub stats: Arc<TransportStats>,
    pub debug: Arc<std::sync::Mutex<super::debug::DebugFramePublisher>>,
    outbound_tx: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

impl WebSocketTransport {
    pub fn new(ws_url: impl Into<String>, room_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(TransportStats::default());
        let transport = Self {
            ws_url: ws_url.into(),
            room_id: room_id.into(),
            buffer: Arc::new(SnapshotBuffer::new(stats.clone())),
            stats,
            debug: Arc::new(std::sync::Mutex::new(super::debug::DebugFramePublisher::new())),
            outbound_tx,
            connected: Arc::new(AtomicBool::new(false)),
        };
        (transport, outbound_rx)
    }

    /// Publishes a pre-encoded text frame. Drops and counts it immediately
    /// if not currently connected, rather than queuing indefinitely.
    pub fn publish(&self, text: String) {
        if !self.connected.load(Ordering::Relaxed) {
            self.stats.dropped_ticks.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if self.outbound_tx.send(text).is_err() {
            self.stats.dropped_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Runs the reconnect loop until `shutdown` is observed. Intended to be
    /// spawned as the transport task.
    pub async fn run(self: Arc<Self>, mut outbound_rx: mpsc::UnboundedReceiver<String>, shutdown: Arc<AtomicBool>) {
        let mut backoff = Backoff::new();
        while !shutdown.load(Ordering::Relaxed) {
            match tokio_tungstenite::connect_async(&self.ws_url).await {
                Ok((stream, _response)) => {
                    log::info!("connected to {}", self.ws_url);
                    backoff.reset();
                    self.connected.store(true, Ordering::Relaxed);
                    let (mut write, mut read) = stream.split();

                    loop {
                        tokio::select! {
                            inbound = read.next() => {
                                match inbound {
                                    Some(Ok(Message::Text(text))) => {
                                        self.stats.ws_rx.fetch_add(1, Ordering::Relaxed);
                                        self.handle_inbound(&text);
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        log::warn!("websocket read error on {}: {e}", self.ws_url);
                                        break;
                                    }
                                    None => {
                                        log::warn!("websocket connection to {} closed by peer", self.ws_url);
                                        break;
                                    }
                                }
                            }
                            outbound = outbound_rx.recv() => {
                                match outbound {
                                    Some(text) => {
                                        if write.send(Message::Text(text)).await.is_ok() {
                                            self.stats.ws_tx.fetch_add(1, Ordering::Relaxed);
                                        } else {
                                            self.stats.dropped_ticks.fetch_add(1, Ordering::Relaxed);
                                            break;
                                        }
                                    }
                                    None => break,
                                }
                            }
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("failed to connect to {}: {e}", self.ws_url);
                }
            }

            self.connected.store(false, Ordering::Relaxed);
            // Anything queued right as the connection dropped never reaches
            // the wire; count it the same as a disconnected publish.
            while outbound_rx.try_recv().is_ok() {
                self.stats.dropped_ticks.fetch_add(1, Ordering::Relaxed);
            }

            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let delay = backoff.next();
            log::info!("reconnecting to {} in {delay:?}", self.ws_url);
            tokio::time::sleep(delay).await;
        }
        self.buffer.signal_shutdown();
    }

    fn handle_inbound(&self, text: &str) {
        match codec::decode_inbound(text, &self.room_id) {
            Ok(codec::InboundMessage::WorldTick(snapshot)) => {
                self.buffer.publish(snapshot);
            }
            Ok(codec::InboundMessage::DebugControl { enable }) => {
                if let Ok(mut d) = self.debug.lock() {
                    d.set_enabled(enable);
                }
                log::info!("perception/debug publishing set to {enable}");
            }
            Ok(codec::InboundMessage::Unrecognized) => {}
            Err(e) => {
                log::warn!("discarding malformed inbound frame: {e}");
            }
        }
    }
}
