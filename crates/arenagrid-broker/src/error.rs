//! Broker error types.

use thiserror::Error;

use arenagrid_core::{ContractError, EndpointParseError};

/// Why no session could be handed out. Every variant is reported to the
/// client as the same "unavailable" failure.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("no game server available in group {0}")]
    NoServerAvailable(String),

    #[error("fleet claim failed: {0}")]
    ClaimFailed(#[from] ContractError),

    #[error("claimed server {server_id} advertises a malformed endpoint")]
    MalformedClaim {
        server_id: String,
        #[source]
        source: EndpointParseError,
    },
}

pub type BrokerResult<T> = Result<T, BrokerError>;
