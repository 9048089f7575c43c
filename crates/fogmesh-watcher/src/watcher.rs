//! Infrastructure watcher: keeps the eligible node snapshot current.
//!
//! Two background tasks share one snapshot:
//! - the event pump applies node add / modify / delete events as they arrive
//!   and re-subscribes whenever the stream ends;
//! - the reconciliation ticker periodically re-lists every node and replaces
//!   the snapshot wholesale, repairing anything the event stream missed.
//!
//! Any change to the snapshot is announced on a broadcast channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fogmesh_core::Node;
use fogmesh_core::config::WatcherConfig;
use fogmesh_platform::{NodeEvent, NodeSource, PlatformNode};

use crate::convert::{is_eligible, to_node};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// What changed in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyChange {
    /// A node was added or its converted value changed.
    NodeUpserted(String),
    /// A node was deleted or became ineligible.
    NodeRemoved(String),
    /// A full re-list produced a different snapshot.
    Resynced,
}

/// Snapshot of eligible nodes, kept sorted by id.
type Snapshot = Arc<RwLock<Vec<Node>>>;

pub struct InfrastructureWatcher {
    snapshot: Snapshot,
    changes: broadcast::Sender<TopologyChange>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl InfrastructureWatcher {
    /// Start watching `source` with the intervals from `config`.
    pub fn start(source: Arc<dyn NodeSource>, config: &WatcherConfig) -> Self {
        Self::start_with(source, config.resync_interval(), config.retry_delay())
    }

    pub fn start_with(source: Arc<dyn NodeSource>, resync_interval: Duration, retry_delay: Duration) -> Self {
        let snapshot: Snapshot = Arc::new(RwLock::new(Vec::new()));
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pump = tokio::spawn(run_event_pump(
            source.clone(),
            snapshot.clone(),
            changes.clone(),
            retry_delay,
            shutdown_rx.clone(),
        ));
        let ticker = tokio::spawn(run_reconcile_loop(
            source,
            snapshot.clone(),
            changes.clone(),
            resync_interval,
            shutdown_rx,
        ));

        info!(
            resync_secs = resync_interval.as_secs(),
            retry_secs = retry_delay.as_secs(),
            "infrastructure watcher started"
        );

        Self {
            snapshot,
            changes,
            shutdown_tx,
            tasks: Mutex::new(vec![pump, ticker]),
            stopped: AtomicBool::new(false),
        }
    }

    /// Copy of the current eligible nodes.
    pub async fn nodes(&self) -> Vec<Node> {
        self.snapshot.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TopologyChange> {
        self.changes.subscribe()
    }

    /// Signal both tasks and wait for them to finish. A concurrent call
    /// waits for the same shutdown; later calls return immediately.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(true);
        while let Some(handle) = tasks.pop() {
            if let Err(e) = handle.await {
                warn!(error = %e, "watcher task ended abnormally");
            }
        }
        self.stopped.store(true, Ordering::SeqCst);
        info!("infrastructure watcher stopped");
    }

    /// True once both tasks have finished.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

async fn run_event_pump(
    source: Arc<dyn NodeSource>,
    snapshot: Snapshot,
    changes: broadcast::Sender<TopologyChange>,
    retry_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("node event pump starting");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let subscribed = tokio::select! {
            result = source.watch() => result,
            _ = shutdown.changed() => break,
        };

        match subscribed {
            Ok(mut events) => {
                debug!("subscribed to node events");
                loop {
                    tokio::select! {
                        event = events.recv() => match event {
                            Some(Ok(event)) => apply_event(&snapshot, &changes, event).await,
                            Some(Err(e)) => {
                                warn!(error = %e, "node event stream failed");
                                break;
                            }
                            None => {
                                warn!("node event stream ended");
                                break;
                            }
                        },
                        _ = shutdown.changed() => {
                            debug!("node event pump shutting down");
                            return;
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to subscribe to node events"),
        }

        tokio::select! {
            _ = tokio::time::sleep(retry_delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    debug!("node event pump shutting down");
}

async fn run_reconcile_loop(
    source: Arc<dyn NodeSource>,
    snapshot: Snapshot,
    changes: broadcast::Sender<TopologyChange>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        tokio::select! {
            _ = reconcile(source.as_ref(), &snapshot, &changes) => {}
            _ = shutdown.changed() => break,
        }
    }

    debug!("reconciliation loop shutting down");
}

async fn reconcile(
    source: &dyn NodeSource,
    snapshot: &RwLock<Vec<Node>>,
    changes: &broadcast::Sender<TopologyChange>,
) {
    let listed = match source.list_nodes().await {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!(error = %e, "node reconciliation failed; retrying next tick");
            return;
        }
    };

    let total = listed.len();
    let mut fresh: Vec<Node> = listed.iter().filter(|n| is_eligible(n)).map(to_node).collect();
    fresh.sort_by(|a, b| a.id.cmp(&b.id));

    let mut nodes = snapshot.write().await;
    if *nodes != fresh {
        info!(eligible = fresh.len(), total, "node snapshot resynced");
        *nodes = fresh;
        let _ = changes.send(TopologyChange::Resynced);
    } else {
        debug!(eligible = nodes.len(), total, "node snapshot unchanged");
    }
}

async fn apply_event(
    snapshot: &RwLock<Vec<Node>>,
    changes: &broadcast::Sender<TopologyChange>,
    event: NodeEvent,
) {
    debug!(kind = event.kind(), node = %event.node().name(), "node event");

    let change = {
        let mut nodes = snapshot.write().await;
        match event {
            NodeEvent::Added(pn) | NodeEvent::Modified(pn) => upsert(&mut nodes, &pn),
            NodeEvent::Deleted(pn) => {
                let removed = remove(&mut nodes, pn.uid());
                if removed.is_none() {
                    warn!(node = %pn.name(), uid = %pn.uid(), "deleted node was not in the snapshot");
                }
                removed
            }
        }
    };

    if let Some(change) = change {
        let _ = changes.send(change);
    }
}

fn upsert(nodes: &mut Vec<Node>, pn: &PlatformNode) -> Option<TopologyChange> {
    if !is_eligible(pn) {
        debug!(node = %pn.name(), "node is not eligible");
        return remove(nodes, pn.uid());
    }

    let node = to_node(pn);
    match nodes.binary_search_by(|n| n.id.as_str().cmp(pn.uid())) {
        Ok(i) if nodes[i] == node => None,
        Ok(i) => {
            nodes[i] = node;
            info!(node = %pn.name(), uid = %pn.uid(), "node updated");
            Some(TopologyChange::NodeUpserted(pn.uid().to_string()))
        }
        Err(i) => {
            nodes.insert(i, node);
            info!(node = %pn.name(), uid = %pn.uid(), "node added");
            Some(TopologyChange::NodeUpserted(pn.uid().to_string()))
        }
    }
}

fn remove(nodes: &mut Vec<Node>, uid: &str) -> Option<TopologyChange> {
    let i = nodes.iter().position(|n| n.id == uid)?;
    let node = nodes.remove(i);
    info!(node = %node.name, %uid, "node removed");
    Some(TopologyChange::NodeRemoved(uid.to_string()))
}
