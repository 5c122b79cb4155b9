//! Domain types for the limit order engine

pub mod ids;
pub mod order;
pub mod pool;

pub use ids::{AccountId, AssetId, OrderId, PoolId};
pub use order::{FillRecord, OrderKey, OrderRecord};
pub use pool::{Direction, PoolKey, FEE_DENOMINATOR};

/// Token quantity. Receipts are denominated 1:1 with deposited input.
pub type Amount = u128;

/// Discretized price: a multiple of the pool's tick spacing.
pub type PriceLevel = i32;
