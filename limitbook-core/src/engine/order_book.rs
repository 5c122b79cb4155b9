//! Order book — pending input per (pool, level, direction).
//!
//! The book is the ledger of resting, unfilled input. It manages:
//! - Deposits into a key (`place`) and withdrawals from it (`cancel`)
//! - Whole-key removal for a fill (`take`) and its undo (`restore`)
//! - Ordered lookup of the first resting level inside a crossed range
//!
//! The book does NOT know about receipts, claims, or the venue. Only non-zero
//! entries are stored, so the first entry of a range is the first level with
//! pending input.

use super::levels::LevelRange;
use crate::domain::{Amount, Direction, OrderId, OrderKey, PoolId, PriceLevel};
use crate::error::{EngineError, ValidationError};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// Pending input per level, one ladder per (pool, direction).
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    ladders: HashMap<(PoolId, Direction), BTreeMap<PriceLevel, Amount>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Public API ─────────────────────────────────────────────────────

    /// Add `amount` to the key's pending input. Returns the key's order id.
    pub fn place(&mut self, key: &OrderKey, amount: Amount) -> Result<OrderId, EngineError> {
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let ladder = self
            .ladders
            .entry((key.pool_id.clone(), key.direction))
            .or_default();
        let pending = ladder.entry(key.level).or_default();
        *pending = pending
            .checked_add(amount)
            .ok_or(ValidationError::ArithmeticOverflow)?;
        Ok(key.order_id())
    }

    /// Remove `amount` from the key's pending input.
    ///
    /// Fails with `InsufficientBalance` when `amount` exceeds what is pending.
    pub fn cancel(&mut self, key: &OrderKey, amount: Amount) -> Result<(), EngineError> {
        let pending = self.peek(&key.pool_id, key.level, key.direction);
        if amount > pending {
            return Err(EngineError::InsufficientBalance {
                requested: amount,
                available: pending,
            });
        }
        self.set(key, pending - amount);
        Ok(())
    }

    /// Pending input at a key (zero when nothing rests there).
    pub fn peek(&self, pool_id: &PoolId, level: PriceLevel, direction: Direction) -> Amount {
        self.ladders
            .get(&(pool_id.clone(), direction))
            .and_then(|ladder| ladder.get(&level))
            .copied()
            .unwrap_or_default()
    }

    /// Remove and return the key's entire pending input.
    pub fn take(&mut self, key: &OrderKey) -> Amount {
        let taken = self.peek(&key.pool_id, key.level, key.direction);
        self.set(key, 0);
        taken
    }

    /// Put back input removed by `take` when the fill did not go through.
    pub fn restore(&mut self, key: &OrderKey, amount: Amount) {
        let pending = self.peek(&key.pool_id, key.level, key.direction);
        self.set(key, pending.saturating_add(amount));
    }

    /// First level with pending input inside `range`, in scan order
    /// (upward for a rising price, downward for a falling one).
    pub fn first_in_range(
        &self,
        pool_id: &PoolId,
        direction: Direction,
        range: LevelRange,
    ) -> Option<(PriceLevel, Amount)> {
        let ladder = self.ladders.get(&(pool_id.clone(), direction))?;
        let hit = match range {
            // BTreeMap::range panics on inverted bounds.
            LevelRange::Rising { last, current } | LevelRange::Falling { last, current }
                if last == current =>
            {
                None
            }
            LevelRange::Rising { last, current } if last > current => None,
            LevelRange::Falling { last, current } if last < current => None,
            LevelRange::Rising { last, current } => ladder
                .range((Bound::Excluded(last), Bound::Included(current)))
                .next(),
            LevelRange::Falling { last, current } => ladder
                .range((Bound::Included(current), Bound::Excluded(last)))
                .next_back(),
        };
        hit.map(|(level, amount)| (*level, *amount))
    }

    /// All resting levels for a pool and direction, ascending.
    pub fn levels(&self, pool_id: &PoolId, direction: Direction) -> Vec<(PriceLevel, Amount)> {
        self.ladders
            .get(&(pool_id.clone(), direction))
            .map(|ladder| ladder.iter().map(|(l, a)| (*l, *a)).collect())
            .unwrap_or_default()
    }

    /// Total pending input across every level of a pool and direction.
    pub fn total_pending(&self, pool_id: &PoolId, direction: Direction) -> Amount {
        self.ladders
            .get(&(pool_id.clone(), direction))
            .map(|ladder| ladder.values().fold(0, |acc: Amount, a| acc.saturating_add(*a)))
            .unwrap_or_default()
    }

    // ── Internal helpers ───────────────────────────────────────────────

    fn set(&mut self, key: &OrderKey, amount: Amount) {
        let ladder_key = (key.pool_id.clone(), key.direction);
        if amount == 0 {
            if let Some(ladder) = self.ladders.get_mut(&ladder_key) {
                ladder.remove(&key.level);
                if ladder.is_empty() {
                    self.ladders.remove(&ladder_key);
                }
            }
        } else {
            self.ladders
                .entry(ladder_key)
                .or_default()
                .insert(key.level, amount);
        }
    }
}
