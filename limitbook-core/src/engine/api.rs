//! Limit order engine — the depositor-facing operations and read-only queries.
//!
//! Every operation follows the same order:
//! 1. Validate against engine state and host balances (nothing mutated yet)
//! 2. Apply internal effects (book, claims, records)
//! 3. Call out to the host (receipts, transfers)
//!
//! Receipt and transfer calls have no rollback, so if step 3 fails the
//! internal effects from step 2 are reversed before the error is returned.
//! A compensating step that itself fails is logged; the caller still sees
//! the original error.

use super::claims::ClaimLedger;
use super::levels::{discretize, LevelTracker, MAX_TICK, MIN_TICK};
use super::order_book::OrderBook;
use crate::config::EngineConfig;
use crate::domain::{
    AccountId, Amount, AssetId, Direction, FillRecord, OrderId, OrderKey, OrderRecord, PoolId,
    PoolKey, PriceLevel,
};
use crate::error::{EngineError, ValidationError};
use crate::host::{Host, HostError};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, warn};

/// One engine instance: owns all per-pool and per-order state.
pub struct LimitOrderEngine {
    pub(crate) config: EngineConfig,
    pub(crate) pools: HashMap<PoolId, PoolKey>,
    pub(crate) levels: LevelTracker,
    pub(crate) book: OrderBook,
    pub(crate) claims: ClaimLedger,
    pub(crate) records: HashMap<OrderId, OrderRecord>,
    pub(crate) fill_history: VecDeque<FillRecord>,
    pub(crate) sweep_count: u64,
}

impl LimitOrderEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            pools: HashMap::new(),
            levels: LevelTracker::new(),
            book: OrderBook::new(),
            claims: ClaimLedger::new(),
            records: HashMap::new(),
            fill_history: VecDeque::new(),
            sweep_count: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Custody account holding deposits and fill proceeds.
    pub fn account(&self) -> &AccountId {
        &self.config.account
    }

    // ── Depositor operations ───────────────────────────────────────────

    /// Rest `amount` of the direction's input asset at the level containing
    /// `trigger_tick`. Issues receipts 1:1 and pulls the input from `caller`.
    ///
    /// Returns the discretized level the order rests at.
    pub fn place_order(
        &mut self,
        host: &mut dyn Host,
        caller: &AccountId,
        pool_key: &PoolKey,
        trigger_tick: i32,
        amount: Amount,
        direction: Direction,
    ) -> Result<PriceLevel, EngineError> {
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        if amount > self.config.max_order() {
            return Err(ValidationError::AmountTooLarge {
                amount,
                max: self.config.max_order(),
            }
            .into());
        }
        let pool_id = pool_key.id();
        if !self.pools.contains_key(&pool_id) {
            return Err(ValidationError::UnknownPool(pool_id).into());
        }
        if !(MIN_TICK..=MAX_TICK).contains(&trigger_tick) {
            return Err(ValidationError::TriggerOutOfRange(trigger_tick).into());
        }
        let input = direction.input_asset(pool_key).clone();
        let available = host.balance_of(caller, &input);
        if available < amount {
            return Err(ValidationError::InsufficientFunds {
                asset: input,
                requested: amount,
                available,
            }
            .into());
        }

        let level = discretize(trigger_tick, pool_key.tick_spacing);
        let key = OrderKey::new(pool_id, level, direction);
        let order_id = key.order_id();

        // Effects.
        self.claims.issue(&order_id, amount)?;
        if let Err(err) = self.book.place(&key, amount) {
            undo_failed(&order_id, "retire claims", self.claims.retire(&order_id, amount));
            return Err(err);
        }
        let created = !self.records.contains_key(&order_id);
        if created {
            self.records.insert(
                order_id.clone(),
                OrderRecord { pool_key: pool_key.clone(), level, direction },
            );
        }

        // Interactions.
        if let Err(err) = collect_deposit(host, caller, &order_id, &input, &self.config.account, amount)
        {
            undo_failed(&order_id, "cancel book entry", self.book.cancel(&key, amount));
            undo_failed(&order_id, "retire claims", self.claims.retire(&order_id, amount));
            if created {
                self.records.remove(&order_id);
            }
            warn!(order = %order_id.short(), error = %err, "deposit failed, placement reverted");
            return Err(err.into());
        }

        debug!(
            order = %order_id.short(),
            pool = %key.pool_id.short(),
            level,
            direction = %direction,
            amount = %amount,
            caller = %caller,
            "order placed"
        );
        Ok(level)
    }

    /// Burn the caller's entire receipt balance for an order and refund the
    /// equivalent input. Returns the amount refunded.
    pub fn cancel_order(
        &mut self,
        host: &mut dyn Host,
        caller: &AccountId,
        pool_key: &PoolKey,
        level: PriceLevel,
        direction: Direction,
    ) -> Result<Amount, EngineError> {
        let pool_id = pool_key.id();
        if !self.pools.contains_key(&pool_id) {
            return Err(ValidationError::UnknownPool(pool_id).into());
        }
        let order_id = OrderKey::new(pool_id, level, direction).order_id();
        let record = self
            .records
            .get(&order_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownOrder(order_id.clone()))?;
        let held = host.receipt_balance(caller, &order_id);
        if held == 0 {
            return Err(ValidationError::NoReceipts(order_id).into());
        }
        self.refund(host, caller, &order_id, &record, held)
    }

    /// Burn `receipts` of the caller's receipts for an unfilled order and
    /// refund the equivalent input. Returns the amount refunded.
    pub fn cancel_receipts(
        &mut self,
        host: &mut dyn Host,
        caller: &AccountId,
        order_id: &OrderId,
        receipts: Amount,
    ) -> Result<Amount, EngineError> {
        if receipts == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let record = self
            .records
            .get(order_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownOrder(order_id.clone()))?;
        let held = host.receipt_balance(caller, order_id);
        if receipts > held {
            return Err(EngineError::InsufficientBalance {
                requested: receipts,
                available: held,
            });
        }
        self.refund(host, caller, order_id, &record, receipts)
    }

    /// Burn `receipts` and pay `destination` the proportional share of the
    /// order's collected proceeds. Returns the amount paid.
    pub fn redeem(
        &mut self,
        host: &mut dyn Host,
        caller: &AccountId,
        order_id: &OrderId,
        receipts: Amount,
        destination: &AccountId,
    ) -> Result<Amount, EngineError> {
        let record = self
            .records
            .get(order_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownOrder(order_id.clone()))?;
        let held = host.receipt_balance(caller, order_id);

        // Effects.
        let redemption = self.claims.redeem(order_id, receipts, held)?;

        // Interactions.
        let output = record.direction.output_asset(&record.pool_key);
        let payout = Payout {
            asset: output,
            from: &self.config.account,
            to: destination,
            amount: redemption.amount_paid,
        };
        if let Err(err) = burn_and_pay(host, caller, order_id, receipts, payout) {
            self.claims.unwind(order_id, redemption);
            warn!(order = %order_id.short(), error = %err, "payout failed, redemption reverted");
            return Err(err.into());
        }

        debug!(
            order = %order_id.short(),
            receipts = %receipts,
            paid = %redemption.amount_paid,
            remaining = %self.claims.claimable(order_id),
            "receipts redeemed"
        );
        Ok(redemption.amount_paid)
    }

    fn refund(
        &mut self,
        host: &mut dyn Host,
        caller: &AccountId,
        order_id: &OrderId,
        record: &OrderRecord,
        receipts: Amount,
    ) -> Result<Amount, EngineError> {
        let key = record.key();

        // Effects.
        self.book.cancel(&key, receipts)?;
        if let Err(err) = self.claims.retire(order_id, receipts) {
            self.book.restore(&key, receipts);
            return Err(err);
        }

        // Interactions.
        let payout = Payout {
            asset: record.direction.input_asset(&record.pool_key),
            from: &self.config.account,
            to: caller,
            amount: receipts,
        };
        if let Err(err) = burn_and_pay(host, caller, order_id, receipts, payout) {
            self.book.restore(&key, receipts);
            undo_failed(order_id, "reissue claims", self.claims.issue(order_id, receipts));
            warn!(order = %order_id.short(), error = %err, "refund failed, cancel reverted");
            return Err(err.into());
        }

        debug!(
            order = %order_id.short(),
            receipts = %receipts,
            remaining = %self.book.peek(&key.pool_id, key.level, key.direction),
            "order cancelled"
        );
        Ok(receipts)
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// Order id for a (pool, level, direction) key.
    pub fn order_id(pool_key: &PoolKey, level: PriceLevel, direction: Direction) -> OrderId {
        OrderKey::new(pool_key.id(), level, direction).order_id()
    }

    pub fn pending_amount(
        &self,
        pool_id: &PoolId,
        level: PriceLevel,
        direction: Direction,
    ) -> Amount {
        self.book.peek(pool_id, level, direction)
    }

    pub fn claimable_amount(&self, order_id: &OrderId) -> Amount {
        self.claims.claimable(order_id)
    }

    pub fn total_outstanding(&self, order_id: &OrderId) -> Amount {
        self.claims.outstanding(order_id)
    }

    pub fn order_record(&self, order_id: &OrderId) -> Option<&OrderRecord> {
        self.records.get(order_id)
    }

    /// Every order ever placed, keyed by id.
    pub fn order_records(&self) -> impl Iterator<Item = (&OrderId, &OrderRecord)> {
        self.records.iter()
    }

    pub fn last_level(&self, pool_id: &PoolId) -> Option<PriceLevel> {
        self.levels.last(pool_id)
    }

    pub fn pool_key(&self, pool_id: &PoolId) -> Option<&PoolKey> {
        self.pools.get(pool_id)
    }

    /// Resting levels for one side of a pool, ascending.
    pub fn resting_levels(
        &self,
        pool_id: &PoolId,
        direction: Direction,
    ) -> Vec<(PriceLevel, Amount)> {
        self.book.levels(pool_id, direction)
    }

    /// Fill history, oldest first.
    pub fn fill_history(&self) -> impl Iterator<Item = &FillRecord> {
        self.fill_history.iter()
    }

    /// Number of `after_swap` invocations so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    /// What the custody account owes, per asset: pending input plus
    /// unredeemed proceeds.
    pub fn liabilities(&self) -> BTreeMap<AssetId, Amount> {
        let mut owed: BTreeMap<AssetId, Amount> = BTreeMap::new();
        for (order_id, record) in &self.records {
            let key = record.key();
            let pending = self.book.peek(&key.pool_id, key.level, key.direction);
            let input = owed
                .entry(record.direction.input_asset(&record.pool_key).clone())
                .or_default();
            *input = input.saturating_add(pending);
            let output = owed
                .entry(record.direction.output_asset(&record.pool_key).clone())
                .or_default();
            *output = output.saturating_add(self.claims.claimable(order_id));
        }
        owed.retain(|_, amount| *amount > 0);
        owed
    }

    /// True when the host's receipt supply matches the engine's outstanding
    /// count for the order.
    pub fn verify_receipt_supply(&self, host: &dyn Host, order_id: &OrderId) -> bool {
        host.receipt_supply(order_id) == self.claims.outstanding(order_id)
    }
}

/// Outbound transfer from custody.
struct Payout<'a> {
    asset: &'a AssetId,
    from: &'a AccountId,
    to: &'a AccountId,
    amount: Amount,
}

/// Log a compensating step that could not be applied.
fn undo_failed<E: std::fmt::Display>(
    order_id: &OrderId,
    step: &'static str,
    result: Result<(), E>,
) {
    if let Err(err) = result {
        warn!(order = %order_id.short(), step, error = %err, "compensation failed");
    }
}

/// Mint receipts, then pull the deposit. Burns the receipts again if the
/// pull fails, returning the pull's error either way.
fn collect_deposit(
    host: &mut dyn Host,
    caller: &AccountId,
    order_id: &OrderId,
    asset: &AssetId,
    custody: &AccountId,
    amount: Amount,
) -> Result<(), HostError> {
    host.mint_receipts(caller, order_id, amount)?;
    if let Err(err) = host.transfer(asset, caller, custody, amount) {
        undo_failed(order_id, "burn receipts", host.burn_receipts(caller, order_id, amount));
        return Err(err);
    }
    Ok(())
}

/// Burn receipts, then pay out. Re-mints the receipts if the payout fails.
fn burn_and_pay(
    host: &mut dyn Host,
    holder: &AccountId,
    order_id: &OrderId,
    receipts: Amount,
    payout: Payout<'_>,
) -> Result<(), HostError> {
    host.burn_receipts(holder, order_id, receipts)?;
    if payout.amount == 0 {
        return Ok(());
    }
    if let Err(err) = host.transfer(payout.asset, payout.from, payout.to, payout.amount) {
        undo_failed(order_id, "re-mint receipts", host.mint_receipts(holder, order_id, receipts));
        return Err(err);
    }
    Ok(())
}
