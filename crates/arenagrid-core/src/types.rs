//! Domain types exchanged with ArenaGrid's collaborators.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier for a queued message.
pub type MessageId = String;

/// Unique identifier for a game server within its group.
pub type GameServerId = String;

/// Unique identifier for a worker node.
pub type NodeId = String;

/// Unique identifier for a launched task.
pub type TaskId = String;

// ── Reuse queue ────────────────────────────────────────────────────

/// Parameters of a single bounded receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// How long a received message stays hidden from other receivers.
    pub visibility_timeout: Duration,
    /// How long to wait for a message before returning empty.
    pub wait_time: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(15),
            wait_time: Duration::from_secs(1),
        }
    }
}

/// A message handed out by [`ReuseQueue::receive`](crate::ReuseQueue::receive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: MessageId,
    /// Token for deleting this particular delivery. Changes on every receive.
    pub receipt_handle: String,
    /// Raw body. For reuse tickets this is `"host:port"`.
    pub body: String,
    /// Number of times this message has been received, this one included.
    pub receive_count: u32,
}

// ── Fleet ──────────────────────────────────────────────────────────

/// A game server exclusively claimed from the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedServer {
    pub group: String,
    pub server_id: GameServerId,
    /// Unparsed `"host:port"` as advertised by the game server.
    pub connection_info: String,
}

// ── Cluster ────────────────────────────────────────────────────────

/// Residual capacity reported for one worker node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerNode {
    pub node_id: NodeId,
    pub cluster: String,
    pub remaining_cpu: u64,
    pub remaining_memory: u64,
}

/// One page of [`ResourceMonitor::list_nodes`](crate::ResourceMonitor::list_nodes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePage {
    pub nodes: Vec<WorkerNode>,
    /// Present when more nodes follow.
    pub next_token: Option<String>,
}

/// Identifier of the task definition game servers are launched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskDefinitionRef(pub String);

impl TaskDefinitionRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskDefinitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where launched tasks run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchType {
    #[default]
    #[serde(rename = "EC2")]
    Ec2,
    #[serde(rename = "FARGATE")]
    Fargate,
}

impl fmt::Display for LaunchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchType::Ec2 => f.write_str("EC2"),
            LaunchType::Fargate => f.write_str("FARGATE"),
        }
    }
}

/// A batch launch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTasksRequest {
    pub cluster: String,
    pub task_definition: TaskDefinitionRef,
    pub launch_type: LaunchType,
    pub count: u32,
}

/// A task the launcher could not start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFailure {
    /// Short machine-readable reason, e.g. `RESOURCE:MEMORY`.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

/// Outcome of a batch launch. Launches are not atomic: some tasks may
/// start while others fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchReport {
    pub started: Vec<TaskId>,
    pub failures: Vec<LaunchFailure>,
}

impl LaunchReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
