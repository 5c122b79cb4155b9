//! Fill engine — pool lifecycle callbacks and the crossing sweep.
//!
//! After every external swap the engine scans the opposite side of the book
//! for levels the price crossed since the last observation. Each fill is a
//! swap of its own and moves the price again, so the current level is
//! re-read after every fill and the scan restarts from the same anchor.
//! The sweep ends when a scan finds nothing; only then is the last observed
//! level updated.

use super::api::LimitOrderEngine;
use super::levels::{discretize, LevelRange};
use super::swap_executor::SwapExecutor;
use crate::domain::{Amount, Direction, FillRecord, OrderKey, PoolId, PoolKey, PriceLevel};
use crate::error::{EngineError, ValidationError};
use crate::host::Host;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of one `after_swap` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Sequence number, shared with the `FillRecord`s it produced.
    pub sweep: u64,
    pub pool_id: PoolId,
    /// Side of the book that was scanned.
    pub candidate: Direction,
    /// Last observed level when the sweep began (the scan anchor).
    pub start_level: PriceLevel,
    /// Level recorded when the sweep ended.
    pub end_level: PriceLevel,
    pub fills: Vec<FillRecord>,
}

impl SweepReport {
    pub fn filled_input(&self) -> Amount {
        self.fills.iter().map(|f| f.amount_in).sum()
    }
}

impl LimitOrderEngine {
    // ── Pool lifecycle ─────────────────────────────────────────────────

    /// Register a freshly initialized pool and seed its last level from the
    /// venue's starting price.
    pub fn after_initialize(
        &mut self,
        host: &dyn Host,
        pool_key: &PoolKey,
    ) -> Result<PriceLevel, EngineError> {
        pool_key.validate()?;
        let pool_id = pool_key.id();
        if self.pools.contains_key(&pool_id) {
            return Err(ValidationError::PoolAlreadyInitialized(pool_id).into());
        }
        let tick = host.current_tick(pool_key)?;
        let level = discretize(tick, pool_key.tick_spacing);
        self.levels.seed(&pool_id, level);
        info!(pool = %pool_id.short(), tick, level, "pool initialized");
        self.pools.insert(pool_id, pool_key.clone());
        Ok(level)
    }

    /// Fill every resting order the price crossed during a swap in `trigger`
    /// direction.
    ///
    /// On a failed fill the error is returned immediately: fills already
    /// executed in this sweep stand, the failed key keeps its pending input,
    /// and the last level is left where it was so the next sweep retries.
    pub fn after_swap(
        &mut self,
        host: &mut dyn Host,
        pool_key: &PoolKey,
        trigger: Direction,
    ) -> Result<SweepReport, EngineError> {
        let pool_id = pool_key.id();
        let anchor = self
            .levels
            .last(&pool_id)
            .ok_or_else(|| ValidationError::UnknownPool(pool_id.clone()))?;
        self.sweep_count += 1;
        let mut report = SweepReport {
            sweep: self.sweep_count,
            pool_id: pool_id.clone(),
            candidate: trigger.opposite(),
            start_level: anchor,
            end_level: anchor,
            fills: Vec::new(),
        };

        loop {
            let current = discretize(host.current_tick(pool_key)?, pool_key.tick_spacing);
            report.end_level = current;
            let Some((level, _)) = self.scan(&pool_id, report.candidate, anchor, current) else {
                break;
            };
            let fill = self.fill(host, pool_key, level, report.candidate, report.sweep)?;
            report.fills.push(fill);
        }

        self.levels.record(&pool_id, report.end_level);
        if report.fills.is_empty() {
            debug!(
                pool = %pool_id.short(),
                from = report.start_level,
                to = report.end_level,
                "sweep: nothing crossed"
            );
        } else {
            info!(
                pool = %pool_id.short(),
                sweep = report.sweep,
                from = report.start_level,
                to = report.end_level,
                fills = report.fills.len(),
                filled_input = %report.filled_input(),
                "sweep complete"
            );
        }
        Ok(report)
    }

    // ── Internal helpers ───────────────────────────────────────────────

    fn scan(
        &self,
        pool_id: &PoolId,
        candidate: Direction,
        anchor: PriceLevel,
        current: PriceLevel,
    ) -> Option<(PriceLevel, Amount)> {
        let range = LevelRange::between(anchor, current)?;
        self.book.first_in_range(pool_id, candidate, range)
    }

    /// Swap the entire pending input at one key. The book entry is cleared
    /// before the venue is called and put back if the swap fails.
    fn fill(
        &mut self,
        host: &mut dyn Host,
        pool_key: &PoolKey,
        level: PriceLevel,
        direction: Direction,
        sweep: u64,
    ) -> Result<FillRecord, EngineError> {
        let key = OrderKey::new(pool_key.id(), level, direction);
        let order_id = key.order_id();
        let amount = self.book.take(&key);

        let executor = SwapExecutor::new(&self.config.account);
        match executor.execute(host, pool_key, direction, amount) {
            Ok(delta) => {
                self.claims.on_fill(&order_id, delta.amount_out);
                let record = FillRecord {
                    sweep,
                    order_id,
                    pool_id: key.pool_id,
                    level,
                    direction,
                    amount_in: delta.amount_in,
                    amount_out: delta.amount_out,
                };
                info!(
                    order = %record.order_id.short(),
                    level,
                    direction = %direction,
                    amount_in = %record.amount_in,
                    amount_out = %record.amount_out,
                    "order filled"
                );
                self.push_fill(record.clone());
                Ok(record)
            }
            Err(source) => {
                self.book.restore(&key, amount);
                warn!(
                    order = %order_id.short(),
                    level,
                    amount = %amount,
                    error = %source,
                    "fill failed, pending input restored"
                );
                Err(EngineError::ExternalSwapFailure { order_id, level, source })
            }
        }
    }

    fn push_fill(&mut self, record: FillRecord) {
        let limit = self.config.fill_history_limit;
        if limit > 0 && self.fill_history.len() >= limit {
            self.fill_history.pop_front();
        }
        self.fill_history.push_back(record);
    }
}
