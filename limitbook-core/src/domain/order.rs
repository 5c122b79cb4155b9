//! Order keys, immutable order records, and fill records.

use super::ids::{OrderId, PoolId};
use super::pool::{Direction, PoolKey};
use super::{Amount, PriceLevel};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Composite key of a resting order: (pool, level, direction).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub pool_id: PoolId,
    pub level: PriceLevel,
    pub direction: Direction,
}

impl OrderKey {
    pub fn new(pool_id: PoolId, level: PriceLevel, direction: Direction) -> Self {
        Self { pool_id, level, direction }
    }

    /// Deterministic order id, independent of insertion order.
    pub fn order_id(&self) -> OrderId {
        let canonical = json!({
            "pool_id": &self.pool_id.0,
            "level": self.level,
            "direction": self.direction.as_str(),
        });
        OrderId::from_bytes(canonical.to_string().as_bytes())
    }
}

/// Written on the first deposit into a key; never modified or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub pool_key: PoolKey,
    pub level: PriceLevel,
    pub direction: Direction,
}

impl OrderRecord {
    pub fn key(&self) -> OrderKey {
        OrderKey::new(self.pool_key.id(), self.level, self.direction)
    }
}

/// One executed fill: the entire pending amount at a level, swapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRecord {
    /// Sequence number of the `after_swap` invocation that produced it.
    pub sweep: u64,
    pub order_id: OrderId,
    pub pool_id: PoolId,
    pub level: PriceLevel,
    pub direction: Direction,
    pub amount_in: Amount,
    pub amount_out: Amount,
}
