//! Session broker: queue first, fleet second.

use std::sync::Arc;

use tracing::{debug, info, warn};

use arenagrid_core::config::BrokerConfig;
use arenagrid_core::{ConnectionEndpoint, FleetManager, ReceiveOptions, ReuseQueue};

use crate::error::{BrokerError, BrokerResult};

/// How a session was served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    /// Consumed a reuse ticket left by an earlier claim.
    Reused,
    /// Claimed a fresh server; `ticket_published` tells whether the reuse
    /// ticket for the second seat made it onto the queue.
    Claimed {
        server_id: String,
        ticket_published: bool,
    },
}

/// A session handed to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub endpoint: ConnectionEndpoint,
    pub source: SessionSource,
}

/// Hands out game server endpoints, two seats per claimed server.
#[derive(Clone)]
pub struct SessionBroker {
    queue: Arc<dyn ReuseQueue>,
    fleet: Arc<dyn FleetManager>,
    config: BrokerConfig,
}

impl SessionBroker {
    pub fn new(
        queue: Arc<dyn ReuseQueue>,
        fleet: Arc<dyn FleetManager>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            queue,
            fleet,
            config,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Serve one session request.
    ///
    /// Fails only when no reuse ticket was usable and the fleet could not
    /// provide a server with a well-formed endpoint.
    pub async fn request_session(&self) -> BrokerResult<SessionGrant> {
        if let Some(endpoint) = self.try_reuse().await {
            info!(%endpoint, "session served from reuse ticket");
            return Ok(SessionGrant {
                endpoint,
                source: SessionSource::Reused,
            });
        }
        self.claim_new().await
    }

    /// Receive and consume at most one reuse ticket.
    async fn try_reuse(&self) -> Option<ConnectionEndpoint> {
        let opts = ReceiveOptions {
            visibility_timeout: self.config.visibility_timeout,
            wait_time: self.config.wait_time,
        };

        let message = match self.queue.receive(opts).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("reuse queue empty");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "reuse queue receive failed, falling back to claim");
                return None;
            }
        };

        let endpoint = match ConnectionEndpoint::parse(&message.body) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                // Left in place; it reappears after the visibility timeout.
                warn!(
                    message_id = %message.message_id,
                    receive_count = message.receive_count,
                    error = %e,
                    "ignoring malformed reuse ticket"
                );
                return None;
            }
        };

        // An unacknowledged ticket comes back after the visibility timeout,
        // so its seat is not ours to hand out.
        if let Err(e) = self.queue.delete(&message.receipt_handle).await {
            warn!(
                message_id = %message.message_id,
                %endpoint,
                error = %e,
                "reuse ticket not acknowledged, falling back to claim"
            );
            return None;
        }
        Some(endpoint)
    }

    /// Claim a fresh server and publish the ticket for its second seat.
    async fn claim_new(&self) -> BrokerResult<SessionGrant> {
        let group = &self.config.game_server_group;

        let claimed = match self.fleet.claim_server(group).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                warn!(%group, "no game server available to claim");
                return Err(BrokerError::NoServerAvailable(group.clone()));
            }
            Err(e) => {
                warn!(%group, error = %e, "game server claim failed");
                return Err(BrokerError::ClaimFailed(e));
            }
        };

        let endpoint = ConnectionEndpoint::parse(&claimed.connection_info).map_err(|source| {
            warn!(
                server_id = %claimed.server_id,
                connection_info = %claimed.connection_info,
                error = %source,
                "claimed game server has a malformed endpoint"
            );
            BrokerError::MalformedClaim {
                server_id: claimed.server_id.clone(),
                source,
            }
        })?;

        let ticket_published = match self.queue.send(&endpoint.to_wire()).await {
            Ok(message_id) => {
                debug!(%message_id, %endpoint, "reuse ticket published");
                true
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "failed to publish reuse ticket");
                false
            }
        };

        info!(server_id = %claimed.server_id, %endpoint, "session served from fresh claim");
        Ok(SessionGrant {
            endpoint,
            source: SessionSource::Claimed {
                server_id: claimed.server_id,
                ticket_published,
            },
        })
    }
}
