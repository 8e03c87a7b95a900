//! Node runtime - single-owner event loop around a flood engine
//!
//! The engine is owned by one task. Everything else (the UDP receive loop,
//! the ticker, diagnostics) talks to it through `NodeEvent`s on a channel,
//! so engine state never has two writers.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vouch_core::{Peer, VouchError, VouchResult};
use vouch_time::{Clock, TickSchedule};
use vouch_transport::{Broadcast, PacketReceiver};

use crate::{EngineStats, FloodEngine};

/// Input to the node event loop
#[derive(Debug)]
pub enum NodeEvent {
    /// A datagram from a neighbor
    Inbound(Bytes, Peer),
    /// Time to originate a message
    Tick,
    DumpCache(oneshot::Sender<Vec<String>>),
    DumpStore(oneshot::Sender<Vec<String>>),
    Stats(oneshot::Sender<EngineStats>),
    /// Stop the loop and hand back the engine
    Shutdown,
}

/// Cloneable sender side of a node
#[derive(Clone, Debug)]
pub struct NodeHandle {
    events: mpsc::Sender<NodeEvent>,
}

impl NodeHandle {
    pub async fn send(&self, event: NodeEvent) -> VouchResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| VouchError::TransportError("node event loop has stopped".to_string()))
    }

    pub async fn inbound(&self, datagram: Bytes, sender: Peer) -> VouchResult<()> {
        self.send(NodeEvent::Inbound(datagram, sender)).await
    }

    pub async fn tick(&self) -> VouchResult<()> {
        self.send(NodeEvent::Tick).await
    }

    pub async fn dump_cache(&self) -> VouchResult<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        self.send(NodeEvent::DumpCache(tx)).await?;
        rx.await.map_err(|_| no_reply())
    }

    pub async fn dump_store(&self) -> VouchResult<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        self.send(NodeEvent::DumpStore(tx)).await?;
        rx.await.map_err(|_| no_reply())
    }

    pub async fn stats(&self) -> VouchResult<EngineStats> {
        let (tx, rx) = oneshot::channel();
        self.send(NodeEvent::Stats(tx)).await?;
        rx.await.map_err(|_| no_reply())
    }

    pub async fn shutdown(&self) -> VouchResult<()> {
        self.send(NodeEvent::Shutdown).await
    }
}

fn no_reply() -> VouchError {
    VouchError::TransportError("node event loop dropped the reply".to_string())
}

/// Event loop owning the engine and the broadcast primitive
pub struct NodeRuntime<K: Clock, B: Broadcast> {
    engine: FloodEngine<K>,
    broadcast: B,
    events: mpsc::Receiver<NodeEvent>,
}

impl<K: Clock, B: Broadcast> NodeRuntime<K, B> {
    /// Create the runtime and the handle used to feed it
    pub fn new(engine: FloodEngine<K>, broadcast: B, buffer: usize) -> (Self, NodeHandle) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            NodeRuntime {
                engine,
                broadcast,
                events: rx,
            },
            NodeHandle { events: tx },
        )
    }

    /// Process events until `Shutdown` or until every handle is dropped.
    /// Returns the engine for final diagnostics.
    pub async fn run(mut self) -> FloodEngine<K> {
        info!(node = %self.engine.node_id(), "node event loop started");

        while let Some(event) = self.events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        info!(node = %self.engine.node_id(), "node event loop stopped");
        self.engine
    }

    /// Handle one event. Returns false when the loop should stop.
    fn handle_event(&mut self, event: NodeEvent) -> bool {
        match event {
            NodeEvent::Inbound(datagram, sender) => {
                let outbound = self.engine.on_receive(datagram, sender);
                for datagram in &outbound {
                    self.send(datagram);
                }
            }
            NodeEvent::Tick => match self.engine.on_tick() {
                Ok(datagram) => {
                    if self.send(&datagram) == 0 {
                        self.engine.record_missed_tx();
                    }
                }
                Err(e) => warn!("tick skipped: {}", e),
            },
            NodeEvent::DumpCache(reply) => {
                let _ = reply.send(self.engine.dump_cache());
            }
            NodeEvent::DumpStore(reply) => {
                let _ = reply.send(self.engine.dump_store());
            }
            NodeEvent::Stats(reply) => {
                let _ = reply.send(self.engine.stats().clone());
            }
            NodeEvent::Shutdown => return false,
        }
        true
    }

    /// Broadcast a datagram. Returns how many neighbors it was handed to.
    fn send(&self, datagram: &Bytes) -> usize {
        match self.broadcast.broadcast(datagram) {
            Ok(sent) => sent,
            Err(e) => {
                warn!("broadcast failed: {}", e);
                0
            }
        }
    }
}

/// Forward received datagrams into the node event loop
pub fn spawn_receiver(mut packets: PacketReceiver, handle: NodeHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((datagram, from)) = packets.recv().await {
            if handle.inbound(datagram, Peer::Addr(from)).await.is_err() {
                break;
            }
        }
        debug!("receiver forwarding stopped");
    })
}

/// Send `Tick` events on a jittered schedule
pub fn spawn_ticker(schedule: TickSchedule, handle: NodeHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut delay = schedule.first_delay(&mut rng);
        loop {
            tokio::time::sleep(delay).await;
            if handle.tick().await.is_err() {
                break;
            }
            delay = schedule.next_delay(&mut rng);
        }
        debug!("ticker stopped");
    })
}
