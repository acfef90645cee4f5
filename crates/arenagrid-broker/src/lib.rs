//! arenagrid-broker — matches session requests to game server endpoints.
//!
//! Every game server hosts a two-player match. The first request for a
//! server claims it from the fleet and publishes a reuse ticket carrying
//! its endpoint; the second request consumes that ticket instead of
//! claiming anything.
//!
//! # Protocol
//!
//! ```text
//! request_session()
//!   receive ≤1 ticket (bounded wait, visibility timeout)
//!     parsed ok   → delete ticket → return endpoint          (seat 2)
//!     none / bad  → claim server from fleet
//!                     none / error / bad endpoint → Unavailable
//!                     ok → send ticket(endpoint) → return     (seat 1)
//! ```
//!
//! The broker keeps no state of its own. Two concurrent brokers never
//! consume the same ticket or claim the same server because the queue's
//! receive and the fleet's claim are atomic.

pub mod broker;
pub mod error;

pub use broker::{SessionBroker, SessionGrant, SessionSource};
pub use error::{BrokerError, BrokerResult};
