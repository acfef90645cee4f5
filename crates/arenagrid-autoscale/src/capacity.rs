//! Residual capacity arithmetic.

use std::collections::HashSet;

use arenagrid_core::WorkerNode;
use arenagrid_core::config::ScalerConfig;

/// Residual CPU and memory summed over a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub cpu: u64,
    pub memory: u64,
    /// Nodes that contributed.
    pub nodes: usize,
    /// Monitor round-trips it took.
    pub pages: usize,
    seen: HashSet<String>,
}

impl ResourceSnapshot {
    /// Add one page of nodes. A node already counted on an earlier page is
    /// ignored.
    pub fn add_page(&mut self, nodes: &[WorkerNode]) {
        self.pages += 1;
        for node in nodes {
            self.add_node(node);
        }
    }

    pub fn add_node(&mut self, node: &WorkerNode) {
        if !self.seen.insert(node.node_id.clone()) {
            return;
        }
        self.cpu = self.cpu.saturating_add(node.remaining_cpu);
        self.memory = self.memory.saturating_add(node.remaining_memory);
        self.nodes += 1;
    }
}

/// How many tasks to start in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingDecision {
    pub cpu_bound: u64,
    pub mem_bound: u64,
    pub count: u32,
}

impl ScalingDecision {
    pub fn compute(
        snapshot: &ResourceSnapshot,
        cpu_per_task: u64,
        memory_per_task: u64,
        batch_cap: u32,
    ) -> Self {
        let cpu_bound = snapshot.cpu.checked_div(cpu_per_task).unwrap_or(0);
        let mem_bound = snapshot.memory.checked_div(memory_per_task).unwrap_or(0);
        let count = cpu_bound.min(mem_bound).min(u64::from(batch_cap)) as u32;
        Self {
            cpu_bound,
            mem_bound,
            count,
        }
    }

    pub fn for_config(snapshot: &ResourceSnapshot, config: &ScalerConfig) -> Self {
        Self::compute(
            snapshot,
            config.cpu_per_task,
            config.memory_per_task,
            config.batch_cap,
        )
    }

    pub fn should_launch(&self) -> bool {
        self.count > 0
    }
}
