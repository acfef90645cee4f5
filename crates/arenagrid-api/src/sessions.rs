//! Client-facing session endpoint.
//!
//! Unlike the admin endpoints this one does not use the `success/data`
//! envelope: game clients expect the bare `{publicIP, port}` object, or
//! `{failed}` with a 500 when no server could be found.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

use arenagrid_core::ConnectionEndpoint;

use crate::ApiState;

/// Message returned to clients when no seat could be found.
pub const NO_FREE_SERVER: &str = "couldnt find a free server spot";

/// Successful session response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(rename = "publicIP")]
    pub public_ip: String,
    pub port: String,
}

impl From<ConnectionEndpoint> for SessionResponse {
    fn from(endpoint: ConnectionEndpoint) -> Self {
        Self {
            public_ip: endpoint.host,
            port: endpoint.port,
        }
    }
}

/// Failed session response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    pub failed: String,
}

/// GET|POST /api/v1/sessions
pub async fn request_session(State(state): State<ApiState>) -> Response {
    match state.broker.request_session().await {
        Ok(grant) => (StatusCode::OK, Json(SessionResponse::from(grant.endpoint))).into_response(),
        Err(e) => {
            warn!(error = %e, "session request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SessionFailure {
                    failed: NO_FREE_SERVER.to_string(),
                }),
            )
                .into_response()
        }
    }
}
