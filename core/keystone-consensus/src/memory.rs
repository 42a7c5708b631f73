//! In-process replicated cluster.
//!
//! A single sequencer task owns the authoritative [`ClusterState`] and
//! processes commands one at a time, which gives every accepted mutation a
//! total order. Each node sees the state through its own `watch` channel;
//! partitioned nodes stop receiving publications until healed.

use crate::boundary::{CommitAck, ConsensusBoundary, Mutation};
use crate::error::{ConsensusError, ConsensusResult};
use crate::metadata::ClusterState;
use async_trait::async_trait;
use keystone_types::{ClusterId, NodeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Capacity of the sequencer command queue.
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Configuration for the in-memory cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of member nodes. The first one starts as leader.
    pub node_count: usize,
    /// Time the sequencer spends replicating each mutation.
    pub commit_delay: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_count: 3,
            commit_delay: Duration::ZERO,
        }
    }
}

enum ClusterCommand {
    Propose {
        origin: NodeId,
        source: String,
        mutation: Mutation,
        reply: oneshot::Sender<ConsensusResult<CommitAck>>,
    },
    Partition {
        node: NodeId,
        reply: oneshot::Sender<ConsensusResult<()>>,
    },
    Heal {
        node: NodeId,
        reply: oneshot::Sender<ConsensusResult<()>>,
    },
    StepDown {
        reply: oneshot::Sender<()>,
    },
    Elect {
        node: NodeId,
        reply: oneshot::Sender<ConsensusResult<()>>,
    },
}

/// A running in-memory cluster.
///
/// Dropping the cluster and every [`NodeHandle`] stops the sequencer.
pub struct InMemoryCluster {
    cluster_id: ClusterId,
    nodes: Vec<NodeHandle>,
    commands: mpsc::Sender<ClusterCommand>,
    committed: watch::Receiver<Arc<ClusterState>>,
}

impl InMemoryCluster {
    /// Bootstraps a fresh cluster with no license installed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: ClusterConfig) -> Self {
        Self::restore(config, ClusterState::bootstrap(ClusterId::new()))
    }

    /// Starts a cluster whose nodes all begin from `state`.
    pub fn restore(config: ClusterConfig, state: ClusterState) -> Self {
        let node_count = config.node_count.max(1);
        let state = Arc::new(state);
        let cluster_id = state.cluster_id;
        let ids: Vec<NodeId> = (0..node_count).map(|_| NodeId::new()).collect();
        let leader = ids.first().copied();

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (leader_tx, leader_rx) = watch::channel(leader);
        let (committed_tx, committed_rx) = watch::channel(state.clone());

        let mut publishers = HashMap::new();
        let mut nodes = Vec::with_capacity(node_count);
        for id in &ids {
            let (snap_tx, snap_rx) = watch::channel(state.clone());
            publishers.insert(*id, snap_tx);
            nodes.push(NodeHandle {
                node_id: *id,
                commands: tx.clone(),
                snapshot: snap_rx,
                leader: leader_rx.clone(),
            });
        }

        let sequencer = Sequencer {
            state,
            members: ids,
            publishers,
            committed: committed_tx,
            partitioned: HashSet::new(),
            leader,
            leader_tx,
            commit_delay: config.commit_delay,
        };
        tokio::spawn(sequencer.run(rx));

        info!(
            "Cluster {} started with {} nodes (leader: {:?})",
            cluster_id, node_count, leader
        );

        Self {
            cluster_id,
            nodes,
            commands: tx,
            committed: committed_rx,
        }
    }

    /// Returns the cluster ID.
    #[must_use]
    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    /// Returns the handle for the node at `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<NodeHandle> {
        self.nodes.get(index).cloned()
    }

    /// Returns handles for every member node.
    #[must_use]
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Returns the current leader, if any.
    #[must_use]
    pub fn leader(&self) -> Option<NodeId> {
        self.nodes.first().and_then(|n| *n.leader.borrow())
    }

    /// Returns the latest committed state, regardless of partitions.
    #[must_use]
    pub fn committed_state(&self) -> Arc<ClusterState> {
        self.committed.borrow().clone()
    }

    /// Subscribes to every committed state change.
    #[must_use]
    pub fn subscribe_committed(&self) -> watch::Receiver<Arc<ClusterState>> {
        self.committed.clone()
    }

    /// Cuts `node` off from the cluster. A partitioned leader loses leadership.
    pub async fn partition(&self, node: NodeId) -> ConsensusResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ClusterCommand::Partition { node, reply }).await?;
        rx.await.map_err(|_| ConsensusError::ChannelClosed)?
    }

    /// Reconnects `node`; it immediately catches up to the committed state.
    pub async fn heal(&self, node: NodeId) -> ConsensusResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ClusterCommand::Heal { node, reply }).await?;
        rx.await.map_err(|_| ConsensusError::ChannelClosed)?
    }

    /// Removes the current leader without electing a new one.
    pub async fn step_down(&self) -> ConsensusResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ClusterCommand::StepDown { reply }).await?;
        rx.await.map_err(|_| ConsensusError::ChannelClosed)
    }

    /// Makes `node` the leader. It must be connected.
    pub async fn elect(&self, node: NodeId) -> ConsensusResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ClusterCommand::Elect { node, reply }).await?;
        rx.await.map_err(|_| ConsensusError::ChannelClosed)?
    }

    async fn send(&self, command: ClusterCommand) -> ConsensusResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ConsensusError::ChannelClosed)
    }
}

/// One node's view of the cluster.
#[derive(Clone)]
pub struct NodeHandle {
    node_id: NodeId,
    commands: mpsc::Sender<ClusterCommand>,
    snapshot: watch::Receiver<Arc<ClusterState>>,
    leader: watch::Receiver<Option<NodeId>>,
}

impl NodeHandle {
    /// Returns a receiver that fires whenever this node applies a new state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<ClusterState>> {
        self.snapshot.clone()
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("node_id", &self.node_id)
            .field("version", &self.snapshot.borrow().version)
            .finish()
    }
}

#[async_trait]
impl ConsensusBoundary for NodeHandle {
    fn local_node(&self) -> NodeId {
        self.node_id
    }

    fn read(&self) -> Arc<ClusterState> {
        self.snapshot.borrow().clone()
    }

    fn is_leader(&self) -> bool {
        *self.leader.borrow() == Some(self.node_id)
    }

    async fn propose(
        &self,
        source: &str,
        mutation: Mutation,
        timeout: Duration,
    ) -> ConsensusResult<CommitAck> {
        let (reply, rx) = oneshot::channel();
        let command = ClusterCommand::Propose {
            origin: self.node_id,
            source: source.to_string(),
            mutation,
            reply,
        };

        // Queueing behind a busy sequencer counts against the same deadline.
        let submit_and_wait = async {
            self.commands
                .send(command)
                .await
                .map_err(|_| ConsensusError::ChannelClosed)?;
            rx.await.map_err(|_| ConsensusError::ChannelClosed)?
        };

        match tokio::time::timeout(timeout, submit_and_wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!("[{}] timed out after {:?} waiting for ack", source, timeout);
                Err(ConsensusError::Timeout)
            }
        }
    }
}

struct Sequencer {
    state: Arc<ClusterState>,
    members: Vec<NodeId>,
    publishers: HashMap<NodeId, watch::Sender<Arc<ClusterState>>>,
    committed: watch::Sender<Arc<ClusterState>>,
    partitioned: HashSet<NodeId>,
    leader: Option<NodeId>,
    leader_tx: watch::Sender<Option<NodeId>>,
    commit_delay: Duration,
}

impl Sequencer {
    async fn run(mut self, mut commands: mpsc::Receiver<ClusterCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                ClusterCommand::Propose {
                    origin,
                    source,
                    mutation,
                    reply,
                } => {
                    let result = self.propose(origin, &source, mutation).await;
                    let _ = reply.send(result);
                }
                ClusterCommand::Partition { node, reply } => {
                    let _ = reply.send(self.partition(node));
                }
                ClusterCommand::Heal { node, reply } => {
                    let _ = reply.send(self.heal(node));
                }
                ClusterCommand::StepDown { reply } => {
                    self.set_leader(None);
                    let _ = reply.send(());
                }
                ClusterCommand::Elect { node, reply } => {
                    let _ = reply.send(self.elect(node));
                }
            }
        }
        debug!("Sequencer for cluster {} stopped", self.state.cluster_id);
    }

    async fn propose(
        &mut self,
        origin: NodeId,
        source: &str,
        mutation: Mutation,
    ) -> ConsensusResult<CommitAck> {
        if self.partitioned.contains(&origin) {
            return Err(ConsensusError::Partitioned(origin));
        }
        if self.leader.is_none() {
            return Err(ConsensusError::NoLeader);
        }
        let required = self.members.len() / 2 + 1;
        let available = self.members.len() - self.partitioned.len();
        if available < required {
            warn!("[{}] rejected: {} of {} nodes reachable", source, available, required);
            return Err(ConsensusError::QuorumLost {
                available,
                required,
            });
        }

        if !self.commit_delay.is_zero() {
            tokio::time::sleep(self.commit_delay).await;
        }

        let licenses = mutation(&self.state.licenses);
        if licenses == self.state.licenses {
            debug!("[{}] no change at version {}", source, self.state.version);
            return Ok(CommitAck {
                version: self.state.version,
                changed: false,
            });
        }

        self.state = Arc::new(self.state.next(licenses));
        self.publish();
        info!("[{}] committed version {}", source, self.state.version);

        Ok(CommitAck {
            version: self.state.version,
            changed: true,
        })
    }

    fn publish(&self) {
        for (node, tx) in &self.publishers {
            if !self.partitioned.contains(node) {
                tx.send_replace(self.state.clone());
            }
        }
        self.committed.send_replace(self.state.clone());
    }

    fn partition(&mut self, node: NodeId) -> ConsensusResult<()> {
        if !self.publishers.contains_key(&node) {
            return Err(ConsensusError::UnknownNode(node));
        }
        self.partitioned.insert(node);
        if self.leader == Some(node) {
            self.set_leader(None);
        }
        info!("Node {} partitioned", node);
        Ok(())
    }

    fn heal(&mut self, node: NodeId) -> ConsensusResult<()> {
        let Some(tx) = self.publishers.get(&node) else {
            return Err(ConsensusError::UnknownNode(node));
        };
        if self.partitioned.remove(&node) {
            tx.send_replace(self.state.clone());
            info!("Node {} rejoined at version {}", node, self.state.version);
        }
        Ok(())
    }

    fn elect(&mut self, node: NodeId) -> ConsensusResult<()> {
        if !self.publishers.contains_key(&node) {
            return Err(ConsensusError::UnknownNode(node));
        }
        if self.partitioned.contains(&node) {
            return Err(ConsensusError::Partitioned(node));
        }
        self.set_leader(Some(node));
        Ok(())
    }

    fn set_leader(&mut self, leader: Option<NodeId>) {
        if self.leader != leader {
            info!("Leader changed: {:?} -> {:?}", self.leader, leader);
        }
        self.leader = leader;
        self.leader_tx.send_replace(leader);
    }
}
