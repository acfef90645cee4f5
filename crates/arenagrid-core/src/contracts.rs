//! Contracts of the external services ArenaGrid drives.
//!
//! Every trait is object-safe so components hold `Arc<dyn …>` and tests
//! can substitute in-memory fakes.

use async_trait::async_trait;

use crate::error::ContractResult;
use crate::types::*;

/// Message queue carrying reuse tickets.
///
/// `receive` must be atomic: while a message is invisible no other
/// receiver may obtain it.
#[async_trait]
pub trait ReuseQueue: Send + Sync {
    /// Receive at most one message, waiting up to `opts.wait_time`.
    async fn receive(&self, opts: ReceiveOptions) -> ContractResult<Option<QueueMessage>>;

    /// Delete a received message. Deleting an already deleted or expired
    /// delivery leaves the queue untouched and reports
    /// [`ContractError::Unavailable`](crate::ContractError::Unavailable), so
    /// the caller knows the delivery is no longer its own.
    async fn delete(&self, receipt_handle: &str) -> ContractResult<()>;

    /// Enqueue a new message and return its id.
    async fn send(&self, body: &str) -> ContractResult<MessageId>;
}

/// Service that hands out exclusive use of running game servers.
#[async_trait]
pub trait FleetManager: Send + Sync {
    /// Atomically claim one server of `group`. `Ok(None)` when the group
    /// has no claimable server.
    async fn claim_server(&self, group: &str) -> ContractResult<Option<ClaimedServer>>;
}

/// Reports residual capacity of a cluster's worker nodes.
#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    /// Fetch one page of nodes. Pass the previous page's `next_token` to
    /// continue; `None` starts from the beginning.
    async fn list_nodes(&self, cluster: &str, page_token: Option<&str>)
    -> ContractResult<NodePage>;
}

/// Starts copies of a task definition on a cluster.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    async fn run_tasks(&self, request: &RunTasksRequest) -> ContractResult<LaunchReport>;
}

/// Looks up values published by a deployment stack.
#[async_trait]
pub trait StackOutputResolver: Send + Sync {
    async fn get_output(&self, stack_name: &str, key: &str) -> ContractResult<String>;
}
