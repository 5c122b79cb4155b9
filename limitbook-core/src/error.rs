//! Engine error taxonomy.
//!
//! Every variant except `ExternalSwapFailure` and `Host` is raised before any
//! state is touched. The engine never retries; resubmission is the caller's call.

use crate::domain::{Amount, AssetId, OrderId, PoolId};
use crate::host::HostError;
use thiserror::Error;

/// Input rejected before mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("amount {amount} exceeds the per-order maximum {max}")]
    AmountTooLarge { amount: Amount, max: Amount },

    #[error("invalid pool key: {0}")]
    InvalidPoolKey(String),

    #[error("pool {0} is not initialized")]
    UnknownPool(PoolId),

    #[error("pool {0} is already initialized")]
    PoolAlreadyInitialized(PoolId),

    #[error("order {0} not found")]
    UnknownOrder(OrderId),

    #[error("trigger tick {0} is outside the representable price range")]
    TriggerOutOfRange(i32),

    #[error("caller holds no receipts for order {0}")]
    NoReceipts(OrderId),

    #[error("insufficient {asset}: requested {requested}, available {available}")]
    InsufficientFunds {
        asset: AssetId,
        requested: Amount,
        available: Amount,
    },

    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

/// Errors from engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("insufficient receipt balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("nothing to claim for order {0}")]
    NothingToClaim(OrderId),

    #[error("fill of order {order_id} at level {level} failed: {source}")]
    ExternalSwapFailure {
        order_id: OrderId,
        level: i32,
        #[source]
        source: HostError,
    },

    #[error("host call failed: {0}")]
    Host(#[from] HostError),
}
