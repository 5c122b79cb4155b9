//! Price discretization and per-pool last-observed level.

use crate::domain::{PoolId, PriceLevel};
use std::collections::HashMap;

/// Lowest tick a pool price can reach.
pub const MIN_TICK: i32 = -887_272;
/// Highest tick a pool price can reach.
pub const MAX_TICK: i32 = 887_272;

/// Floor `raw` to the start of its granularity bucket.
///
/// Rounds toward negative infinity, so every value in `[k*g, (k+1)*g)` maps
/// to `k*g` for negative `k` as well: `discretize(-130, 60) == -180`.
/// A non-positive granularity is treated as 1. Results that would fall below
/// `i32::MIN` saturate.
pub fn discretize(raw: i32, granularity: i32) -> PriceLevel {
    let g = i64::from(granularity.max(1));
    let floored = i64::from(raw).div_euclid(g) * g;
    floored.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as PriceLevel
}

/// Candidate levels between two observations, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRange {
    /// Price rose: `(last, current]`, scanned upward.
    Rising { last: PriceLevel, current: PriceLevel },
    /// Price fell: `[current, last)`, scanned downward.
    Falling { last: PriceLevel, current: PriceLevel },
}

impl LevelRange {
    /// `None` when the level did not change.
    pub fn between(last: PriceLevel, current: PriceLevel) -> Option<Self> {
        match current.cmp(&last) {
            std::cmp::Ordering::Greater => Some(Self::Rising { last, current }),
            std::cmp::Ordering::Less => Some(Self::Falling { last, current }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn contains(&self, level: PriceLevel) -> bool {
        match *self {
            Self::Rising { last, current } => level > last && level <= current,
            Self::Falling { last, current } => level >= current && level < last,
        }
    }
}

/// Last discretized level observed per pool.
#[derive(Debug, Clone, Default)]
pub struct LevelTracker {
    last: HashMap<PoolId, PriceLevel>,
}

impl LevelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the pool's starting price. Returns false if already seeded.
    pub fn seed(&mut self, pool_id: &PoolId, level: PriceLevel) -> bool {
        if self.last.contains_key(pool_id) {
            return false;
        }
        self.last.insert(pool_id.clone(), level);
        true
    }

    pub fn last(&self, pool_id: &PoolId) -> Option<PriceLevel> {
        self.last.get(pool_id).copied()
    }

    pub fn record(&mut self, pool_id: &PoolId, level: PriceLevel) {
        self.last.insert(pool_id.clone(), level);
    }
}
