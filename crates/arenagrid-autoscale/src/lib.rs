//! arenagrid-autoscale — keeps enough game server tasks running.
//!
//! Wakes up once per period, resolves the current task definition, then
//! spends the period (minus a grace interval) repeatedly measuring the
//! cluster's residual capacity and launching as many game server tasks as
//! fit, a bounded batch at a time.
//!
//! # Scaling Algorithm
//!
//! ```text
//! task_def = stack_output(stack_name, output_key)   // once per cycle
//!
//! while elapsed < period - grace:
//!     snapshot  = Σ remaining cpu/memory over every node (all pages)
//!     cpu_bound = snapshot.cpu    / cpu_per_task
//!     mem_bound = snapshot.memory / memory_per_task
//!     count     = min(cpu_bound, mem_bound, batch_cap)
//!     if count > 0: run_tasks(task_def, count)
//!     sleep(iteration_interval)
//! ```
//!
//! Capacity is re-measured every iteration rather than tracked: launched
//! tasks take time to show up in the monitor and other actors change the
//! cluster too. Query and launch failures are logged and the loop goes on;
//! only a failure to resolve the task definition ends the cycle early.

pub mod capacity;
pub mod error;
pub mod scaler;

pub use capacity::{ResourceSnapshot, ScalingDecision};
pub use error::{ScalerError, ScalerResult};
pub use scaler::{CapacityScaler, CycleReport, IterationOutcome};
