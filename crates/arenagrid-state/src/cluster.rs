//! Worker cluster storage: nodes, task definitions, and running tasks.
//!
//! Node capacity is tracked as "remaining" resources. Placing a task
//! deducts the task definition's CPU and memory from the first node with
//! room for it; stopping the task gives them back.

use std::ops::Bound;

use redb::{ReadableDatabase, ReadableTable};
use tracing::{debug, info, warn};

use arenagrid_core::{LaunchFailure, LaunchReport, RunTasksRequest, TaskDefinitionRef};

use crate::error::{StateError, StateResult};
use crate::records::{NodeRecord, TaskDefinition, TaskRecord, check_key_part, cluster_key};
use crate::store::{StateStore, decode, encode, map_err};
use crate::tables::*;

/// Failure reasons reported for tasks that could not be placed.
pub const REASON_CPU: &str = "RESOURCE:CPU";
pub const REASON_MEMORY: &str = "RESOURCE:MEMORY";
pub const REASON_NO_NODES: &str = "NO_CONTAINER_INSTANCES";

impl StateStore {
    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a worker node.
    pub fn put_node(&self, node: &NodeRecord) -> StateResult<()> {
        check_key_part("cluster", &node.cluster)?;
        check_key_part("node id", &node.node_id)?;
        self.put_json(NODES, &node.table_key(), node)?;
        debug!(cluster = %node.cluster, node_id = %node.node_id, "node stored");
        Ok(())
    }

    pub fn get_node(&self, cluster: &str, node_id: &str) -> StateResult<Option<NodeRecord>> {
        self.get_json(NODES, &cluster_key(cluster, node_id))
    }

    pub fn list_nodes(&self, cluster: &str) -> StateResult<Vec<NodeRecord>> {
        self.list_json(NODES, &format!("{cluster}/"))
    }

    pub fn delete_node(&self, cluster: &str, node_id: &str) -> StateResult<bool> {
        self.delete_key(NODES, &cluster_key(cluster, node_id))
    }

    /// One page of a cluster's nodes.
    ///
    /// The continuation token is the table key of the last node returned;
    /// it is only handed out when at least one more node follows.
    pub fn list_node_page(
        &self,
        cluster: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StateResult<(Vec<NodeRecord>, Option<String>)> {
        let prefix = format!("{cluster}/");
        let start: Bound<&str> = match page_token {
            Some(token) if token.starts_with(&prefix) => Bound::Excluded(token),
            Some(token) => return Err(StateError::InvalidToken(token.to_string())),
            None => Bound::Included(prefix.as_str()),
        };

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;

        let mut nodes = Vec::with_capacity(page_size);
        let mut more = false;
        for entry in table
            .range::<&str>((start, Bound::Unbounded))
            .map_err(map_err!(Read))?
        {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            if nodes.len() == page_size {
                more = true;
                break;
            }
            nodes.push(decode::<NodeRecord>(value.value())?);
        }

        let next_token = match nodes.last() {
            Some(last) if more => Some(last.table_key()),
            _ => None,
        };
        Ok((nodes, next_token))
    }

    // ── Task definitions ───────────────────────────────────────────

    pub fn put_task_definition(&self, def: &TaskDefinition) -> StateResult<()> {
        self.put_json(TASK_DEFINITIONS, def.id.as_str(), def)?;
        info!(task_definition = %def.id, cpu = def.cpu, memory = def.memory, "task definition registered");
        Ok(())
    }

    pub fn get_task_definition(&self, id: &str) -> StateResult<Option<TaskDefinition>> {
        self.get_json(TASK_DEFINITIONS, id)
    }

    // ── Tasks ──────────────────────────────────────────────────────

    pub fn list_tasks(&self, cluster: &str) -> StateResult<Vec<TaskRecord>> {
        self.list_json(TASKS, &format!("{cluster}/"))
    }

    /// Place up to `request.count` tasks, deducting their resources from
    /// the cluster's nodes in one transaction.
    ///
    /// Tasks that fit nowhere are reported as failures; the others start.
    pub fn run_tasks(&self, request: &RunTasksRequest, now: u64) -> StateResult<LaunchReport> {
        let def = self
            .get_task_definition(request.task_definition.as_str())?
            .ok_or_else(|| StateError::NotFound(request.task_definition.to_string()))?;

        let prefix = format!("{}/", request.cluster);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut report = LaunchReport::default();
        {
            let mut nodes_table = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut nodes: Vec<NodeRecord> = Vec::new();
            for entry in nodes_table.range(prefix.as_str()..).map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                if !key.value().starts_with(&prefix) {
                    break;
                }
                nodes.push(decode(value.value())?);
            }

            let mut tasks_table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            for _ in 0..request.count {
                let Some(node) = nodes.iter_mut().find(|n| n.fits(def.cpu, def.memory)) else {
                    report.failures.push(placement_failure(&nodes, &def));
                    continue;
                };
                node.remaining_cpu -= def.cpu;
                node.remaining_memory -= def.memory;

                let task = TaskRecord {
                    task_id: uuid::Uuid::new_v4().to_string(),
                    cluster: request.cluster.clone(),
                    node_id: node.node_id.clone(),
                    task_definition: def.id.clone(),
                    launch_type: request.launch_type,
                    cpu: def.cpu,
                    memory: def.memory,
                    started_at: now,
                };
                let value = encode(&task)?;
                tasks_table
                    .insert(task.table_key().as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                report.started.push(task.task_id);
            }

            for node in &nodes {
                let value = encode(node)?;
                nodes_table
                    .insert(node.table_key().as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;

        if report.is_partial() {
            warn!(
                cluster = %request.cluster,
                requested = request.count,
                started = report.started.len(),
                "some tasks could not be placed"
            );
        }
        Ok(report)
    }

    /// Stop a task and return its resources to its node.
    pub fn stop_task(&self, cluster: &str, task_id: &str) -> StateResult<bool> {
        let key = cluster_key(cluster, task_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stopped;
        {
            let mut tasks_table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            let task: Option<TaskRecord> = match tasks_table.remove(key.as_str()).map_err(map_err!(Write))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            stopped = task.is_some();

            if let Some(task) = task {
                let mut nodes_table = txn.open_table(NODES).map_err(map_err!(Table))?;
                let node_key = cluster_key(cluster, &task.node_id);
                let node: Option<NodeRecord> = match nodes_table.get(node_key.as_str()).map_err(map_err!(Read))? {
                    Some(guard) => Some(decode(guard.value())?),
                    None => None,
                };
                if let Some(mut node) = node {
                    node.remaining_cpu = (node.remaining_cpu + task.cpu).min(node.registered_cpu);
                    node.remaining_memory =
                        (node.remaining_memory + task.memory).min(node.registered_memory);
                    let value = encode(&node)?;
                    nodes_table
                        .insert(node_key.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if stopped {
            info!(%cluster, %task_id, "task stopped");
        }
        Ok(stopped)
    }
}

fn placement_failure(nodes: &[NodeRecord], def: &TaskDefinition) -> LaunchFailure {
    let reason = if nodes.is_empty() {
        REASON_NO_NODES
    } else if nodes.iter().all(|n| n.remaining_cpu < def.cpu) {
        REASON_CPU
    } else {
        REASON_MEMORY
    };
    LaunchFailure {
        reason: reason.to_string(),
        node_id: None,
    }
}

impl TaskDefinition {
    pub fn new(id: &str, cpu: u64, memory: u64, now: u64) -> Self {
        Self {
            id: TaskDefinitionRef(id.to_string()),
            cpu,
            memory,
            registered_at: now,
        }
    }
}
