//! Records persisted by the standalone backends.
//!
//! Timestamps are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};

use arenagrid_core::{
    GameServerId, LaunchType, MessageId, NodeId, QueueMessage, TaskDefinitionRef, TaskId,
    WorkerNode,
};

use crate::error::{StateError, StateResult};

// ── Reuse queue ────────────────────────────────────────────────────

/// A message sitting in the reuse queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub seq: u64,
    pub message_id: MessageId,
    pub body: String,
    pub sent_at: u64,
    /// The message is invisible to receivers before this instant.
    pub visible_at: u64,
    pub receive_count: u32,
    /// Receipt handle of the latest delivery.
    pub receipt_handle: Option<String>,
}

impl StoredMessage {
    pub fn table_key(&self) -> String {
        message_key(self.seq)
    }

    pub fn is_visible(&self, now: u64) -> bool {
        self.visible_at <= now
    }

    pub(crate) fn delivery(&self) -> Option<QueueMessage> {
        Some(QueueMessage {
            message_id: self.message_id.clone(),
            receipt_handle: self.receipt_handle.clone()?,
            body: self.body.clone(),
            receive_count: self.receive_count,
        })
    }
}

pub(crate) fn message_key(seq: u64) -> String {
    format!("{seq:020}")
}

// ── Fleet ──────────────────────────────────────────────────────────

/// Whether a game server can take new players.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Utilization {
    #[default]
    Available,
    Utilized,
}

/// Health a game server reports about itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameServerHealth {
    #[default]
    Healthy,
    Unhealthy,
}

/// A game server process registered with the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServer {
    pub group: String,
    pub server_id: GameServerId,
    /// `"host:port"` as advertised by the server; stored unparsed.
    pub connection_info: String,
    #[serde(default)]
    pub utilization: Utilization,
    #[serde(default)]
    pub health: GameServerHealth,
    /// Set while a claim holds the server.
    #[serde(default)]
    pub claimed_at: Option<u64>,
    pub registered_at: u64,
    pub updated_at: u64,
}

impl GameServer {
    pub fn table_key(&self) -> String {
        game_server_key(&self.group, &self.server_id)
    }

    /// True when a claim is held and has not yet timed out.
    pub fn is_claimed(&self, now: u64, claim_timeout_ms: u64) -> bool {
        self.claimed_at
            .is_some_and(|at| now < at.saturating_add(claim_timeout_ms))
    }

    pub fn is_claimable(&self, now: u64, claim_timeout_ms: u64) -> bool {
        self.utilization == Utilization::Available
            && self.health == GameServerHealth::Healthy
            && !self.is_claimed(now, claim_timeout_ms)
    }
}

/// Check one component of a composite `{a}/{b}` key. Empty components and
/// components containing the `/` separator are rejected.
pub fn check_key_part(kind: &str, value: &str) -> StateResult<()> {
    if value.is_empty() {
        return Err(StateError::InvalidKey(format!("{kind} must not be empty")));
    }
    if value.contains('/') {
        return Err(StateError::InvalidKey(format!(
            "{kind} {value:?} must not contain '/'"
        )));
    }
    Ok(())
}

pub(crate) fn game_server_key(group: &str, server_id: &str) -> String {
    format!("{group}/{server_id}")
}

/// Heartbeat fields a game server may report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServerUpdate {
    #[serde(default)]
    pub utilization: Option<Utilization>,
    #[serde(default)]
    pub health: Option<GameServerHealth>,
    #[serde(default)]
    pub connection_info: Option<String>,
}

// ── Cluster ────────────────────────────────────────────────────────

/// A worker node with its registered and remaining capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub cluster: String,
    pub node_id: NodeId,
    pub registered_cpu: u64,
    pub registered_memory: u64,
    pub remaining_cpu: u64,
    pub remaining_memory: u64,
    pub registered_at: u64,
}

impl NodeRecord {
    /// A fresh node with all of its capacity unreserved.
    pub fn new(cluster: &str, node_id: &str, cpu: u64, memory: u64, now: u64) -> Self {
        Self {
            cluster: cluster.to_string(),
            node_id: node_id.to_string(),
            registered_cpu: cpu,
            registered_memory: memory,
            remaining_cpu: cpu,
            remaining_memory: memory,
            registered_at: now,
        }
    }

    pub fn table_key(&self) -> String {
        cluster_key(&self.cluster, &self.node_id)
    }

    pub fn fits(&self, cpu: u64, memory: u64) -> bool {
        self.remaining_cpu >= cpu && self.remaining_memory >= memory
    }
}

impl From<NodeRecord> for WorkerNode {
    fn from(n: NodeRecord) -> Self {
        WorkerNode {
            node_id: n.node_id,
            cluster: n.cluster,
            remaining_cpu: n.remaining_cpu,
            remaining_memory: n.remaining_memory,
        }
    }
}

/// Resources one task of a definition reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: TaskDefinitionRef,
    pub cpu: u64,
    pub memory: u64,
    pub registered_at: u64,
}

/// A task placed on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub cluster: String,
    pub node_id: NodeId,
    pub task_definition: TaskDefinitionRef,
    pub launch_type: LaunchType,
    pub cpu: u64,
    pub memory: u64,
    pub started_at: u64,
}

impl TaskRecord {
    pub fn table_key(&self) -> String {
        cluster_key(&self.cluster, &self.task_id)
    }
}

pub(crate) fn cluster_key(cluster: &str, id: &str) -> String {
    format!("{cluster}/{id}")
}

pub(crate) fn stack_output_key(stack: &str, key: &str) -> String {
    format!("{stack}/{key}")
}
