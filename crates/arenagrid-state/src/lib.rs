//! arenagrid-state — embedded state store for standalone ArenaGrid.
//!
//! Backed by [redb](https://docs.rs/redb), holds everything the external
//! collaborators would hold in production: queued reuse tickets, game
//! servers registered with the fleet, worker nodes and running tasks of
//! the cluster, task definitions, and stack outputs.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns under
//! `&str` keys. Composite keys (`{group}/{server_id}`, `{cluster}/{node_id}`)
//! enable prefix scans.
//!
//! Operations that must be atomic for the control plane to be correct
//! (receiving a message, claiming a server, placing tasks) each run inside
//! a single write transaction. redb serializes write transactions, so two
//! concurrent receivers can never obtain the same message and two
//! concurrent claimers can never obtain the same server.
//!
//! The `backends` module wraps the store in implementations of the
//! `arenagrid-core` contracts.

pub mod backends;
pub mod cluster;
pub mod error;
pub mod fleet;
pub mod queue;
pub mod records;
pub mod stacks;
pub mod store;
pub mod tables;

pub use backends::{LocalCluster, LocalFleet, LocalQueue, LocalStackOutputs};
pub use error::{StateError, StateResult};
pub use records::*;
pub use store::{StateStore, epoch_millis};
