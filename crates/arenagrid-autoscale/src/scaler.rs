//! Capacity scaler, the periodic time-boxed launch loop.
//!
//! Each cycle resolves the task definition once, then alternates between
//! measuring residual capacity and launching a bounded batch of tasks
//! until the cycle's time budget runs out.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use arenagrid_core::config::ScalerConfig;
use arenagrid_core::{
    LaunchReport, ResourceMonitor, RunTasksRequest, StackOutputResolver, TaskDefinitionRef,
    TaskLauncher,
};

use crate::capacity::{ResourceSnapshot, ScalingDecision};
use crate::error::{ScalerError, ScalerResult};

/// What one iteration observed and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    pub snapshot: ResourceSnapshot,
    pub decision: ScalingDecision,
    /// `None` when the decision was to launch nothing.
    pub launch: Option<LaunchReport>,
}

/// Summary of one scaling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub task_definition: TaskDefinitionRef,
    pub iterations: u32,
    pub failed_iterations: u32,
    pub tasks_requested: u64,
    pub tasks_started: u64,
}

impl CycleReport {
    fn new(task_definition: TaskDefinitionRef) -> Self {
        Self {
            task_definition,
            iterations: 0,
            failed_iterations: 0,
            tasks_requested: 0,
            tasks_started: 0,
        }
    }
}

/// Sizes the game server cluster to its residual capacity.
#[derive(Clone)]
pub struct CapacityScaler {
    config: ScalerConfig,
    resolver: Arc<dyn StackOutputResolver>,
    monitor: Arc<dyn ResourceMonitor>,
    launcher: Arc<dyn TaskLauncher>,
}

impl CapacityScaler {
    pub fn new(
        config: ScalerConfig,
        resolver: Arc<dyn StackOutputResolver>,
        monitor: Arc<dyn ResourceMonitor>,
        launcher: Arc<dyn TaskLauncher>,
    ) -> Self {
        Self {
            config,
            resolver,
            monitor,
            launcher,
        }
    }

    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    /// Look up the task definition game servers are launched from.
    pub async fn resolve_task_definition(&self) -> ScalerResult<TaskDefinitionRef> {
        let value = self
            .resolver
            .get_output(&self.config.stack_name, &self.config.output_key)
            .await
            .map_err(ScalerError::SetupFailed)?;
        if value.trim().is_empty() {
            return Err(ScalerError::SetupFailed(
                arenagrid_core::ContractError::Unavailable(format!(
                    "task definition in stack {}",
                    self.config.stack_name
                )),
            ));
        }
        Ok(TaskDefinitionRef(value.trim().to_string()))
    }

    /// Sum residual capacity over every node of the cluster, following
    /// page tokens until the monitor reports no further page.
    ///
    /// A token handed out twice in one listing means the monitor is going
    /// round in circles; that fails with `PaginationStalled`.
    pub async fn collect_snapshot(&self) -> ScalerResult<ResourceSnapshot> {
        let mut snapshot = ResourceSnapshot::default();
        let mut token: Option<String> = None;
        let mut seen_tokens: HashSet<String> = HashSet::new();

        loop {
            let page = self
                .monitor
                .list_nodes(&self.config.cluster, token.as_deref())
                .await
                .map_err(ScalerError::ResourceQueryFailed)?;
            snapshot.add_page(&page.nodes);
            debug!(
                page = snapshot.pages,
                nodes = page.nodes.len(),
                subtotal_cpu = snapshot.cpu,
                subtotal_memory = snapshot.memory,
                "node page aggregated"
            );

            match page.next_token {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(ScalerError::PaginationStalled(next));
                }
                Some(next) => token = Some(next),
                None => return Ok(snapshot),
            }
        }
    }

    /// Measure, decide, and launch once.
    pub async fn iterate(&self, task_definition: &TaskDefinitionRef) -> ScalerResult<IterationOutcome> {
        let snapshot = self.collect_snapshot().await?;
        let decision = ScalingDecision::for_config(&snapshot, &self.config);
        debug!(
            cpu = snapshot.cpu,
            memory = snapshot.memory,
            nodes = snapshot.nodes,
            cpu_bound = decision.cpu_bound,
            mem_bound = decision.mem_bound,
            count = decision.count,
            "scaling decision"
        );

        if !decision.should_launch() {
            return Ok(IterationOutcome {
                snapshot,
                decision,
                launch: None,
            });
        }

        let request = RunTasksRequest {
            cluster: self.config.cluster.clone(),
            task_definition: task_definition.clone(),
            launch_type: self.config.launch_type,
            count: decision.count,
        };
        let report = self
            .launcher
            .run_tasks(&request)
            .await
            .map_err(ScalerError::LaunchFailed)?;

        if report.is_partial() {
            let reasons: Vec<&str> = report.failures.iter().map(|f| f.reason.as_str()).collect();
            warn!(
                requested = decision.count,
                started = report.started.len(),
                ?reasons,
                "task launch partially failed"
            );
        } else {
            info!(
                cluster = %self.config.cluster,
                task_definition = %task_definition,
                count = decision.count,
                "game server tasks launched"
            );
        }

        Ok(IterationOutcome {
            snapshot,
            decision,
            launch: Some(report),
        })
    }

    /// Run one scaling cycle: resolve the task definition, then iterate
    /// until the time budget (`period - grace`) is spent.
    ///
    /// Fails only if the task definition cannot be resolved. The budget is
    /// checked between iterations; a slow iteration is not interrupted.
    pub async fn run_cycle(&self) -> ScalerResult<CycleReport> {
        let task_definition = self.resolve_task_definition().await?;
        info!(%task_definition, cluster = %self.config.cluster, "scaling cycle started");

        let budget = self.config.budget();
        let started = Instant::now();
        let mut report = CycleReport::new(task_definition);

        while started.elapsed() < budget {
            report.iterations += 1;
            match self.iterate(&report.task_definition).await {
                Ok(outcome) => {
                    if let Some(launch) = outcome.launch {
                        report.tasks_requested += u64::from(outcome.decision.count);
                        report.tasks_started += launch.started.len() as u64;
                    }
                }
                Err(e) => {
                    report.failed_iterations += 1;
                    warn!(iteration = report.iterations, error = %e, "scaling iteration failed");
                }
            }

            let remaining = budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.config.iteration_interval.min(remaining)).await;
        }

        info!(
            iterations = report.iterations,
            failed = report.failed_iterations,
            requested = report.tasks_requested,
            started = report.tasks_started,
            "scaling cycle finished"
        );
        Ok(report)
    }

    /// Run one cycle per period until `shutdown` fires.
    ///
    /// Cycles run back to back on this task, so they never overlap. An
    /// in-flight cycle is dropped on shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if self.config.period.is_zero() {
            error!("scaler period is zero, capacity scaler not started");
            return;
        }
        info!(
            period_secs = self.config.period.as_secs(),
            cluster = %self.config.cluster,
            "capacity scaler started"
        );

        let mut ticker = tokio::time::interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        error!(error = %e, "scaling cycle aborted");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("capacity scaler shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use arenagrid_core::*;

    struct FakeResolver {
        value: Option<&'static str>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl StackOutputResolver for FakeResolver {
        async fn get_output(&self, stack_name: &str, key: &str) -> ContractResult<String> {
            *self.calls.lock().unwrap() += 1;
            self.value
                .map(str::to_string)
                .ok_or_else(|| ContractError::Unavailable(format!("{stack_name}/{key}")))
        }
    }

    /// Monitor serving fixed pages of nodes.
    struct FakeMonitor {
        pages: Vec<Vec<WorkerNode>>,
        fail: bool,
        calls: Mutex<u32>,
    }

    impl FakeMonitor {
        fn uniform(page_sizes: &[usize], cpu: u64, memory: u64) -> Self {
            let mut next = 0;
            let pages = page_sizes
                .iter()
                .map(|&size| {
                    (0..size)
                        .map(|_| {
                            next += 1;
                            WorkerNode {
                                node_id: format!("node-{next}"),
                                cluster: "game-cluster".to_string(),
                                remaining_cpu: cpu,
                                remaining_memory: memory,
                            }
                        })
                        .collect()
                })
                .collect();
            Self {
                pages,
                fail: false,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ResourceMonitor for FakeMonitor {
        async fn list_nodes(
            &self,
            _cluster: &str,
            page_token: Option<&str>,
        ) -> ContractResult<NodePage> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(ContractError::service("resource monitor", "throttled"));
            }
            let index: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            Ok(NodePage {
                nodes: self.pages.get(index).cloned().unwrap_or_default(),
                next_token: (index + 1 < self.pages.len()).then(|| (index + 1).to_string()),
            })
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        requests: Mutex<Vec<RunTasksRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl TaskLauncher for FakeLauncher {
        async fn run_tasks(&self, request: &RunTasksRequest) -> ContractResult<LaunchReport> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(ContractError::service("task launcher", "capacity error"));
            }
            Ok(LaunchReport {
                started: (0..request.count).map(|i| format!("task-{i}")).collect(),
                failures: Vec::new(),
            })
        }
    }

    struct Harness {
        resolver: Arc<FakeResolver>,
        monitor: Arc<FakeMonitor>,
        launcher: Arc<FakeLauncher>,
        scaler: CapacityScaler,
    }

    fn harness(resolved: Option<&'static str>, monitor: FakeMonitor, launcher: FakeLauncher) -> Harness {
        let resolver = Arc::new(FakeResolver {
            value: resolved,
            calls: Mutex::new(0),
        });
        let monitor = Arc::new(monitor);
        let launcher = Arc::new(launcher);
        let scaler = CapacityScaler::new(
            ScalerConfig::default(),
            resolver.clone(),
            monitor.clone(),
            launcher.clone(),
        );
        Harness {
            resolver,
            monitor,
            launcher,
            scaler,
        }
    }

    #[tokio::test]
    async fn pagination_counts_every_node_once() {
        let h = harness(
            Some("game-server:1"),
            FakeMonitor::uniform(&[100, 100, 50], 2, 3),
            FakeLauncher::default(),
        );

        let snapshot = h.scaler.collect_snapshot().await.unwrap();
        assert_eq!(snapshot.pages, 3);
        assert_eq!(snapshot.nodes, 250);
        assert_eq!(snapshot.cpu, 500);
        assert_eq!(snapshot.memory, 750);
        assert_eq!(*h.monitor.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn stalled_pagination_is_an_error() {
        struct Stuck;
        #[async_trait]
        impl ResourceMonitor for Stuck {
            async fn list_nodes(&self, _: &str, _: Option<&str>) -> ContractResult<NodePage> {
                Ok(NodePage {
                    nodes: Vec::new(),
                    next_token: Some("same".to_string()),
                })
            }
        }

        let scaler = CapacityScaler::new(
            ScalerConfig::default(),
            Arc::new(FakeResolver {
                value: Some("game-server:1"),
                calls: Mutex::new(0),
            }),
            Arc::new(Stuck),
            Arc::new(FakeLauncher::default()),
        );
        assert!(matches!(
            scaler.collect_snapshot().await,
            Err(ScalerError::PaginationStalled(_))
        ));
    }

    #[tokio::test]
    async fn cycling_page_tokens_are_an_error() {
        /// Alternates between two tokens forever.
        struct Cycling;
        #[async_trait]
        impl ResourceMonitor for Cycling {
            async fn list_nodes(&self, _: &str, token: Option<&str>) -> ContractResult<NodePage> {
                let next = if token == Some("A") { "B" } else { "A" };
                Ok(NodePage {
                    nodes: vec![WorkerNode {
                        node_id: "node-1".to_string(),
                        cluster: "game-cluster".to_string(),
                        remaining_cpu: 512,
                        remaining_memory: 953,
                    }],
                    next_token: Some(next.to_string()),
                })
            }
        }

        let scaler = CapacityScaler::new(
            ScalerConfig::default(),
            Arc::new(FakeResolver {
                value: Some("game-server:1"),
                calls: Mutex::new(0),
            }),
            Arc::new(Cycling),
            Arc::new(FakeLauncher::default()),
        );
        match scaler.collect_snapshot().await {
            Err(ScalerError::PaginationStalled(token)) => assert_eq!(token, "A"),
            other => panic!("expected PaginationStalled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn iterate_launches_capped_batch() {
        let h = harness(
            Some("game-server:1"),
            FakeMonitor::uniform(&[10], 512, 953),
            FakeLauncher::default(),
        );
        let def = TaskDefinitionRef("game-server:1".to_string());

        let outcome = h.scaler.iterate(&def).await.unwrap();
        assert_eq!(outcome.snapshot.cpu, 5120);
        assert_eq!(outcome.snapshot.memory, 9530);
        assert_eq!(outcome.decision.count, 10);

        let requests = h.launcher.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].count, 10);
        assert_eq!(requests[0].task_definition, def);
        assert_eq!(requests[0].cluster, "game-cluster");
        assert_eq!(requests[0].launch_type, LaunchType::Ec2);
    }

    #[tokio::test]
    async fn insufficient_cpu_issues_no_launch() {
        let h = harness(
            Some("game-server:1"),
            FakeMonitor::uniform(&[1], 256, 100_000),
            FakeLauncher::default(),
        );
        let def = TaskDefinitionRef("game-server:1".to_string());

        let outcome = h.scaler.iterate(&def).await.unwrap();
        assert_eq!(outcome.decision.cpu_bound, 0);
        assert_eq!(outcome.decision.count, 0);
        assert!(outcome.launch.is_none());
        assert!(h.launcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_spends_budget_and_resolves_once() {
        let h = harness(
            Some("game-server:1"),
            FakeMonitor::uniform(&[1], 512, 953),
            FakeLauncher::default(),
        );

        let started = Instant::now();
        let report = h.scaler.run_cycle().await.unwrap();

        // 60s period, 1s grace, 1s between iterations.
        assert_eq!(report.iterations, 59);
        assert_eq!(report.failed_iterations, 0);
        assert_eq!(report.tasks_requested, 59);
        assert_eq!(report.tasks_started, 59);
        assert_eq!(started.elapsed(), Duration::from_secs(59));
        assert_eq!(*h.resolver.calls.lock().unwrap(), 1);
        assert!(
            h.launcher
                .requests
                .lock()
                .unwrap()
                .iter()
                .all(|r| r.task_definition.as_str() == "game-server:1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn setup_failure_aborts_cycle() {
        let h = harness(None, FakeMonitor::uniform(&[1], 512, 953), FakeLauncher::default());

        let err = h.scaler.run_cycle().await.unwrap_err();
        assert!(matches!(err, ScalerError::SetupFailed(_)));
        assert_eq!(*h.monitor.calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_task_definition_is_setup_failure() {
        let h = harness(Some("  "), FakeMonitor::uniform(&[1], 512, 953), FakeLauncher::default());
        assert!(matches!(
            h.scaler.run_cycle().await,
            Err(ScalerError::SetupFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failures_do_not_stop_the_loop() {
        let h = harness(
            Some("game-server:1"),
            FakeMonitor::uniform(&[1], 512, 953),
            FakeLauncher {
                fail: true,
                ..Default::default()
            },
        );

        let report = h.scaler.run_cycle().await.unwrap();
        assert_eq!(report.iterations, 59);
        assert_eq!(report.failed_iterations, 59);
        assert_eq!(report.tasks_started, 0);
        assert_eq!(h.launcher.requests.lock().unwrap().len(), 59);
    }

    #[tokio::test(start_paused = true)]
    async fn query_failures_do_not_stop_the_loop() {
        let mut monitor = FakeMonitor::uniform(&[1], 512, 953);
        monitor.fail = true;
        let h = harness(Some("game-server:1"), monitor, FakeLauncher::default());

        let report = h.scaler.run_cycle().await.unwrap();
        assert_eq!(report.iterations, 59);
        assert_eq!(report.failed_iterations, 59);
        assert!(h.launcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let h = harness(
            Some("game-server:1"),
            FakeMonitor::uniform(&[1], 0, 0),
            FakeLauncher::default(),
        );
        let (tx, rx) = watch::channel(false);

        let scaler = h.scaler.clone();
        let handle = tokio::spawn(async move { scaler.run(rx).await });

        // Let the first cycle get going, then stop mid-cycle.
        tokio::time::sleep(Duration::from_secs(90)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // First cycle at t=0, second at t=60.
        assert_eq!(*h.resolver.calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_with_zero_period_returns_without_cycling() {
        let resolver = Arc::new(FakeResolver {
            value: Some("game-server:1"),
            calls: Mutex::new(0),
        });
        let scaler = CapacityScaler::new(
            ScalerConfig {
                period: Duration::ZERO,
                grace: Duration::ZERO,
                ..Default::default()
            },
            resolver.clone(),
            Arc::new(FakeMonitor::uniform(&[1], 0, 0)),
            Arc::new(FakeLauncher::default()),
        );
        let (_tx, rx) = watch::channel(false);

        scaler.run(rx).await;

        assert_eq!(*resolver.calls.lock().unwrap(), 0);
    }
}
