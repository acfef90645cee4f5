//! Capacity scaler error types.

use thiserror::Error;

use arenagrid_core::ContractError;

#[derive(Debug, Error)]
pub enum ScalerError {
    /// The task definition could not be resolved; the cycle is abandoned.
    #[error("setup failed: {0}")]
    SetupFailed(ContractError),

    #[error("resource query failed: {0}")]
    ResourceQueryFailed(ContractError),

    #[error("resource monitor repeated page token {0:?}")]
    PaginationStalled(String),

    #[error("task launch failed: {0}")]
    LaunchFailed(ContractError),
}

pub type ScalerResult<T> = Result<T, ScalerError>;
