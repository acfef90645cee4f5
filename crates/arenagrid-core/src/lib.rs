//! arenagrid-core — shared vocabulary for the ArenaGrid control plane.
//!
//! Holds the domain types exchanged between the session broker, the
//! capacity scaler and their collaborators, the collaborator contracts
//! themselves, the error taxonomy, and the `arenagrid.toml` parser.
//!
//! # Collaborators
//!
//! ```text
//! SessionBroker  ──► ReuseQueue        (receive / delete / send)
//!                └─► FleetManager      (claim_server)
//!
//! CapacityScaler ──► StackOutputResolver (get_output, once per cycle)
//!                ├─► ResourceMonitor     (list_nodes, paginated)
//!                └─► TaskLauncher        (run_tasks)
//! ```
//!
//! Production deployments plug real services in behind these traits;
//! `arenagrid-state` ships standalone implementations.

pub mod config;
pub mod contracts;
pub mod endpoint;
pub mod error;
pub mod types;

pub use config::ArenaConfig;
pub use contracts::*;
pub use endpoint::ConnectionEndpoint;
pub use error::{ContractError, ContractResult, EndpointParseError};
pub use types::*;
