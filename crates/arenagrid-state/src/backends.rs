//! Standalone implementations of the `arenagrid-core` collaborator
//! contracts on top of [`StateStore`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use arenagrid_core::{
    ClaimedServer, ContractError, ContractResult, FleetManager, LaunchReport, MessageId, NodePage,
    QueueMessage, ReceiveOptions, ResourceMonitor, ReuseQueue, RunTasksRequest,
    StackOutputResolver, TaskLauncher,
};

use crate::error::StateError;
use crate::store::{StateStore, epoch_millis};

/// Map a store error onto the contract taxonomy for `service`.
fn contract_err(service: &'static str) -> impl Fn(StateError) -> ContractError {
    move |e| match e {
        StateError::NotFound(what) => ContractError::Unavailable(what),
        other => ContractError::service(service, other),
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}

// ── Queue ──────────────────────────────────────────────────────────

/// Reuse queue backed by the `messages` table.
#[derive(Clone)]
pub struct LocalQueue {
    store: StateStore,
    poll_interval: Duration,
}

impl LocalQueue {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// How often an empty queue is re-checked while waiting.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl ReuseQueue for LocalQueue {
    async fn receive(&self, opts: ReceiveOptions) -> ContractResult<Option<QueueMessage>> {
        let deadline = Instant::now() + opts.wait_time;
        loop {
            let received = self
                .store
                .receive_message(epoch_millis(), millis(opts.visibility_timeout))
                .map_err(contract_err("queue"))?;
            if received.is_some() {
                return Ok(received);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> ContractResult<()> {
        let deleted = self
            .store
            .delete_message(receipt_handle)
            .map_err(contract_err("queue"))?;
        if !deleted {
            return Err(ContractError::Unavailable(format!(
                "delivery {receipt_handle}"
            )));
        }
        Ok(())
    }

    async fn send(&self, body: &str) -> ContractResult<MessageId> {
        self.store
            .enqueue_message(body, epoch_millis())
            .map(|m| m.message_id)
            .map_err(contract_err("queue"))
    }
}

// ── Fleet ──────────────────────────────────────────────────────────

/// Fleet manager backed by the `game_servers` table.
#[derive(Clone)]
pub struct LocalFleet {
    store: StateStore,
    claim_timeout: Duration,
}

impl LocalFleet {
    pub fn new(store: StateStore, claim_timeout: Duration) -> Self {
        Self {
            store,
            claim_timeout,
        }
    }
}

#[async_trait]
impl FleetManager for LocalFleet {
    async fn claim_server(&self, group: &str) -> ContractResult<Option<ClaimedServer>> {
        let claimed = self
            .store
            .claim_game_server(group, epoch_millis(), millis(self.claim_timeout))
            .map_err(contract_err("fleet"))?;
        Ok(claimed.map(|s| ClaimedServer {
            group: s.group,
            server_id: s.server_id,
            connection_info: s.connection_info,
        }))
    }
}

// ── Cluster ────────────────────────────────────────────────────────

/// Resource monitor and task launcher backed by the `nodes`, `tasks` and
/// `task_definitions` tables.
#[derive(Clone)]
pub struct LocalCluster {
    store: StateStore,
    page_size: usize,
}

impl LocalCluster {
    pub fn new(store: StateStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl ResourceMonitor for LocalCluster {
    async fn list_nodes(
        &self,
        cluster: &str,
        page_token: Option<&str>,
    ) -> ContractResult<NodePage> {
        let (nodes, next_token) = self
            .store
            .list_node_page(cluster, page_token, self.page_size)
            .map_err(contract_err("resource monitor"))?;
        Ok(NodePage {
            nodes: nodes.into_iter().map(Into::into).collect(),
            next_token,
        })
    }
}

#[async_trait]
impl TaskLauncher for LocalCluster {
    async fn run_tasks(&self, request: &RunTasksRequest) -> ContractResult<LaunchReport> {
        self.store
            .run_tasks(request, epoch_millis())
            .map_err(contract_err("task launcher"))
    }
}

// ── Stack outputs ──────────────────────────────────────────────────

/// Stack output resolver backed by the `stack_outputs` table.
#[derive(Clone)]
pub struct LocalStackOutputs {
    store: StateStore,
}

impl LocalStackOutputs {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StackOutputResolver for LocalStackOutputs {
    async fn get_output(&self, stack_name: &str, key: &str) -> ContractResult<String> {
        self.store
            .get_stack_output(stack_name, key)
            .map_err(contract_err("stack outputs"))?
            .ok_or_else(|| ContractError::Unavailable(format!("output {key} of stack {stack_name}")))
    }
}
