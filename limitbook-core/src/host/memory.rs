//! In-memory reference host for tests and simulations.
//!
//! Constant-product pools (`x * y = k`), account balances, receipt balances,
//! and per-asset open swap deltas. Deliberately minimal: no concentrated
//! liquidity, no LP positions, no protocol fees.

use super::{
    AssetLedger, Checkpoint, HostError, ReceiptLedger, SwapDelta, SwapParams, SwapVenue,
};
use crate::domain::{
    AccountId, Amount, AssetId, Direction, OrderId, PoolId, PoolKey, FEE_DENOMINATOR,
};
use crate::engine::levels::{MAX_TICK, MIN_TICK};
use std::collections::{BTreeMap, HashMap};

/// Price ratio between adjacent ticks.
const TICK_BASE: f64 = 1.0001;

/// Tick of a constant-product pool: `floor(log_1.0001(reserve1 / reserve0))`.
pub fn tick_from_reserves(reserve0: Amount, reserve1: Amount) -> i32 {
    if reserve0 == 0 {
        return MAX_TICK;
    }
    if reserve1 == 0 {
        return MIN_TICK;
    }
    let price = reserve1 as f64 / reserve0 as f64;
    let tick = (price.ln() / TICK_BASE.ln()).floor();
    tick.clamp(f64::from(MIN_TICK), f64::from(MAX_TICK)) as i32
}

#[derive(Debug, Clone)]
struct PoolState {
    key: PoolKey,
    reserve0: Amount,
    reserve1: Amount,
    halted: bool,
}

impl PoolState {
    fn tick(&self) -> i32 {
        tick_from_reserves(self.reserve0, self.reserve1)
    }

    fn price(&self) -> f64 {
        self.reserve1 as f64 / self.reserve0 as f64
    }

    fn fee_factor(&self) -> f64 {
        1.0 - f64::from(self.key.fee_pips) / f64::from(FEE_DENOMINATOR)
    }

    /// Largest input that keeps the price on the near side of `price_limit`.
    /// `None` when the bound is out of reach.
    fn input_to_limit(&self, params: &SwapParams) -> Option<Amount> {
        let limit_price = TICK_BASE.powi(params.price_limit);
        let k = self.reserve0 as f64 * self.reserve1 as f64;
        let needed = match params.direction {
            Direction::ZeroForOne => {
                if self.price() <= limit_price {
                    return Some(0);
                }
                ((k / limit_price).sqrt() - self.reserve0 as f64) / self.fee_factor()
            }
            Direction::OneForZero => {
                if self.price() >= limit_price {
                    return Some(0);
                }
                ((k * limit_price).sqrt() - self.reserve1 as f64) / self.fee_factor()
            }
        };
        if !needed.is_finite() || needed >= u128::MAX as f64 {
            return None;
        }
        Some(needed.max(0.0).floor() as Amount)
    }

    fn swap(&mut self, pool_id: &PoolId, params: &SwapParams) -> Result<SwapDelta, HostError> {
        if self.halted {
            return Err(HostError::PoolHalted(pool_id.clone()));
        }

        let mut amount_in = params.exact_input;
        if let Some(cap) = self.input_to_limit(params) {
            amount_in = amount_in.min(cap);
        }
        if amount_in == 0 {
            return Ok(SwapDelta::default());
        }

        let (reserve_in, reserve_out) = match params.direction {
            Direction::ZeroForOne => (self.reserve0, self.reserve1),
            Direction::OneForZero => (self.reserve1, self.reserve0),
        };

        let fee_complement = Amount::from(FEE_DENOMINATOR - self.key.fee_pips);
        let effective = amount_in
            .checked_mul(fee_complement)
            .ok_or(HostError::Overflow)?
            / Amount::from(FEE_DENOMINATOR);
        let numerator = reserve_out.checked_mul(effective).ok_or(HostError::Overflow)?;
        let denominator = reserve_in.checked_add(effective).ok_or(HostError::Overflow)?;
        let amount_out = numerator / denominator;
        if amount_out >= reserve_out {
            return Err(HostError::InsufficientLiquidity(pool_id.clone()));
        }

        let new_in = reserve_in.checked_add(amount_in).ok_or(HostError::Overflow)?;
        let new_out = reserve_out - amount_out;
        match params.direction {
            Direction::ZeroForOne => {
                self.reserve0 = new_in;
                self.reserve1 = new_out;
            }
            Direction::OneForZero => {
                self.reserve1 = new_in;
                self.reserve0 = new_out;
            }
        }

        Ok(SwapDelta { amount_in, amount_out })
    }
}

/// Venue-side state captured by a checkpoint.
#[derive(Debug, Clone)]
struct Snapshot {
    pools: HashMap<PoolId, PoolState>,
    balances: BTreeMap<(AccountId, AssetId), Amount>,
    owed_to_venue: BTreeMap<AssetId, Amount>,
    owed_by_venue: BTreeMap<AssetId, Amount>,
}

/// In-memory venue + receipt ledger + asset ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    pools: HashMap<PoolId, PoolState>,
    balances: BTreeMap<(AccountId, AssetId), Amount>,
    receipts: BTreeMap<(AccountId, OrderId), Amount>,
    receipt_supply: BTreeMap<OrderId, Amount>,
    /// Swap input not yet supplied, per asset.
    owed_to_venue: BTreeMap<AssetId, Amount>,
    /// Swap output not yet withdrawn, per asset.
    owed_by_venue: BTreeMap<AssetId, Amount>,
    /// Open savepoints, innermost last.
    savepoints: Vec<Snapshot>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool with the given reserves. Returns its starting tick.
    pub fn create_pool(
        &mut self,
        key: PoolKey,
        reserve0: Amount,
        reserve1: Amount,
    ) -> Result<i32, HostError> {
        let pool_id = key.id();
        if self.pools.contains_key(&pool_id) {
            return Err(HostError::PoolExists(pool_id));
        }
        if reserve0 == 0 || reserve1 == 0 {
            return Err(HostError::InsufficientLiquidity(pool_id));
        }
        let state = PoolState { key, reserve0, reserve1, halted: false };
        let tick = state.tick();
        self.pools.insert(pool_id, state);
        Ok(tick)
    }

    /// Make every subsequent swap on the pool fail (or succeed again).
    pub fn halt_pool(&mut self, pool_id: &PoolId, halted: bool) -> Result<(), HostError> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| HostError::UnknownPool(pool_id.clone()))?;
        pool.halted = halted;
        Ok(())
    }

    pub fn reserves(&self, pool_id: &PoolId) -> Option<(Amount, Amount)> {
        self.pools.get(pool_id).map(|p| (p.reserve0, p.reserve1))
    }

    /// Credit an account out of thin air (scenario setup).
    pub fn mint(&mut self, owner: &AccountId, asset: &AssetId, amount: Amount) {
        let entry = self.balances.entry((owner.clone(), asset.clone())).or_default();
        *entry = entry.saturating_add(amount);
    }

    /// Swap on behalf of `trader` and settle both legs immediately.
    pub fn swap_and_settle(
        &mut self,
        trader: &AccountId,
        pool: &PoolKey,
        params: &SwapParams,
    ) -> Result<SwapDelta, HostError> {
        let available = self.balance_of(trader, params.direction.input_asset(pool));
        if available < params.exact_input {
            return Err(HostError::InsufficientFunds {
                account: trader.clone(),
                asset: params.direction.input_asset(pool).clone(),
                requested: params.exact_input,
                available,
            });
        }
        let delta = self.swap(pool, params)?;
        self.supply(params.direction.input_asset(pool), trader, delta.amount_in)?;
        self.withdraw(params.direction.output_asset(pool), trader, delta.amount_out)?;
        Ok(delta)
    }

    /// True when every swap flow has been supplied and withdrawn.
    pub fn is_settled(&self) -> bool {
        self.owed_to_venue.values().all(|v| *v == 0)
            && self.owed_by_venue.values().all(|v| *v == 0)
    }

    /// All non-zero account balances, ordered by (account, asset).
    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, &AssetId, Amount)> {
        self.balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|((owner, asset), amount)| (owner, asset, *amount))
    }

    fn debit(
        &mut self,
        owner: &AccountId,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), HostError> {
        let available = self.balance_of(owner, asset);
        if available < amount {
            return Err(HostError::InsufficientFunds {
                account: owner.clone(),
                asset: asset.clone(),
                requested: amount,
                available,
            });
        }
        self.balances.insert((owner.clone(), asset.clone()), available - amount);
        Ok(())
    }

    fn credit(
        &mut self,
        owner: &AccountId,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), HostError> {
        let entry = self.balances.entry((owner.clone(), asset.clone())).or_default();
        *entry = entry.checked_add(amount).ok_or(HostError::Overflow)?;
        Ok(())
    }

    fn pool(&self, key: &PoolKey) -> Result<&PoolState, HostError> {
        let pool_id = key.id();
        self.pools.get(&pool_id).ok_or(HostError::UnknownPool(pool_id))
    }
}

impl SwapVenue for MemoryHost {
    fn current_tick(&self, pool: &PoolKey) -> Result<i32, HostError> {
        Ok(self.pool(pool)?.tick())
    }

    fn swap(&mut self, pool: &PoolKey, params: &SwapParams) -> Result<SwapDelta, HostError> {
        let pool_id = pool.id();
        let state = self
            .pools
            .get_mut(&pool_id)
            .ok_or_else(|| HostError::UnknownPool(pool_id.clone()))?;
        let delta = state.swap(&pool_id, params)?;

        let owed_in = self
            .owed_to_venue
            .entry(params.direction.input_asset(pool).clone())
            .or_default();
        *owed_in = owed_in.checked_add(delta.amount_in).ok_or(HostError::Overflow)?;
        let owed_out = self
            .owed_by_venue
            .entry(params.direction.output_asset(pool).clone())
            .or_default();
        *owed_out = owed_out.checked_add(delta.amount_out).ok_or(HostError::Overflow)?;
        Ok(delta)
    }

    fn supply(
        &mut self,
        asset: &AssetId,
        payer: &AccountId,
        amount: Amount,
    ) -> Result<(), HostError> {
        let owed = self.owed_to_venue.get(asset).copied().unwrap_or_default();
        if amount > owed {
            return Err(HostError::SettlementMismatch {
                asset: asset.clone(),
                detail: format!("supplied {amount}, owed {owed}"),
            });
        }
        self.debit(payer, asset, amount)?;
        self.owed_to_venue.insert(asset.clone(), owed - amount);
        Ok(())
    }

    fn withdraw(
        &mut self,
        asset: &AssetId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), HostError> {
        let owed = self.owed_by_venue.get(asset).copied().unwrap_or_default();
        if amount > owed {
            return Err(HostError::SettlementMismatch {
                asset: asset.clone(),
                detail: format!("withdrew {amount}, owed {owed}"),
            });
        }
        self.credit(recipient, asset, amount)?;
        self.owed_by_venue.insert(asset.clone(), owed - amount);
        Ok(())
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.savepoints.push(Snapshot {
            pools: self.pools.clone(),
            balances: self.balances.clone(),
            owed_to_venue: self.owed_to_venue.clone(),
            owed_by_venue: self.owed_by_venue.clone(),
        });
        Checkpoint(self.savepoints.len() - 1)
    }

    fn revert(&mut self, checkpoint: Checkpoint) -> Result<(), HostError> {
        if checkpoint.0 >= self.savepoints.len() {
            return Err(HostError::UnknownCheckpoint(checkpoint.0));
        }
        self.savepoints.truncate(checkpoint.0 + 1);
        let snapshot = self
            .savepoints
            .pop()
            .ok_or(HostError::UnknownCheckpoint(checkpoint.0))?;
        self.pools = snapshot.pools;
        self.balances = snapshot.balances;
        self.owed_to_venue = snapshot.owed_to_venue;
        self.owed_by_venue = snapshot.owed_by_venue;
        Ok(())
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.savepoints.truncate(checkpoint.0);
    }
}

impl ReceiptLedger for MemoryHost {
    fn receipt_balance(&self, holder: &AccountId, order: &OrderId) -> Amount {
        self.receipts
            .get(&(holder.clone(), order.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn receipt_supply(&self, order: &OrderId) -> Amount {
        self.receipt_supply.get(order).copied().unwrap_or_default()
    }

    fn mint_receipts(
        &mut self,
        holder: &AccountId,
        order: &OrderId,
        amount: Amount,
    ) -> Result<(), HostError> {
        let supply = self.receipt_supply(order).checked_add(amount).ok_or(HostError::Overflow)?;
        let balance = self
            .receipt_balance(holder, order)
            .checked_add(amount)
            .ok_or(HostError::Overflow)?;
        self.receipt_supply.insert(order.clone(), supply);
        self.receipts.insert((holder.clone(), order.clone()), balance);
        Ok(())
    }

    fn burn_receipts(
        &mut self,
        holder: &AccountId,
        order: &OrderId,
        amount: Amount,
    ) -> Result<(), HostError> {
        let balance = self.receipt_balance(holder, order);
        if balance < amount {
            return Err(HostError::InsufficientFunds {
                account: holder.clone(),
                asset: AssetId::new(format!("receipt:{}", order.short())),
                requested: amount,
                available: balance,
            });
        }
        let supply = self.receipt_supply(order).saturating_sub(amount);
        self.receipt_supply.insert(order.clone(), supply);
        self.receipts.insert((holder.clone(), order.clone()), balance - amount);
        Ok(())
    }
}

impl AssetLedger for MemoryHost {
    fn balance_of(&self, owner: &AccountId, asset: &AssetId) -> Amount {
        self.balances
            .get(&(owner.clone(), asset.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), HostError> {
        self.debit(from, asset, amount)?;
        self.credit(to, asset, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fee_pips: u32) -> PoolKey {
        PoolKey::new(
            AssetId::new("ETH"),
            AssetId::new("USDC"),
            fee_pips,
            60,
            AccountId::new("hook"),
        )
    }

    #[test]
    fn balanced_pool_starts_at_tick_zero() {
        let mut host = MemoryHost::new();
        let tick = host.create_pool(key(0), 1_000_000, 1_000_000).unwrap();
        assert_eq!(tick, 0);
    }

    #[test]
    fn tick_follows_reserve_ratio() {
        assert!(tick_from_reserves(1_000_000, 1_010_000) > 0);
        assert!(tick_from_reserves(1_010_000, 1_000_000) < 0);
        // 1.0201 ≈ 1.0001^199
        assert_eq!(tick_from_reserves(1_000_000, 1_020_100), 199);
    }

    #[test]
    fn buying_asset0_raises_tick() {
        let mut host = MemoryHost::new();
        let k = key(0);
        host.create_pool(k.clone(), 1_000_000, 1_000_000).unwrap();
        let trader = AccountId::new("trader");
        host.mint(&trader, &AssetId::new("USDC"), 10_000);

        let delta = host
            .swap_and_settle(&trader, &k, &SwapParams::permissive(Direction::OneForZero, 10_000))
            .unwrap();
        assert_eq!(delta.amount_in, 10_000);
        assert_eq!(delta.amount_out, 9_900); // 1e6 * 1e4 / 1.01e6
        assert!(host.current_tick(&k).unwrap() > 0);
        assert_eq!(host.balance_of(&trader, &AssetId::new("ETH")), 9_900);
        assert!(host.is_settled());
    }

    #[test]
    fn fee_reduces_output() {
        let mut host = MemoryHost::new();
        let k = key(3000);
        host.create_pool(k.clone(), 1_000_000, 1_000_000).unwrap();
        let delta = host.swap(&k, &SwapParams::permissive(Direction::ZeroForOne, 10_000)).unwrap();
        assert!(delta.amount_out < 9_900);
        assert!(!host.is_settled());
    }

    #[test]
    fn price_limit_caps_input() {
        let mut host = MemoryHost::new();
        let k = key(0);
        host.create_pool(k.clone(), 1_000_000, 1_000_000).unwrap();
        let params = SwapParams {
            direction: Direction::OneForZero,
            exact_input: 100_000,
            price_limit: 100,
        };
        let delta = host.swap(&k, &params).unwrap();
        assert!(delta.amount_in < 100_000);
        assert!(host.current_tick(&k).unwrap() <= 100);
    }

    #[test]
    fn halted_pool_rejects_swaps() {
        let mut host = MemoryHost::new();
        let k = key(0);
        host.create_pool(k.clone(), 1_000_000, 1_000_000).unwrap();
        host.halt_pool(&k.id(), true).unwrap();
        let err = host.swap(&k, &SwapParams::permissive(Direction::ZeroForOne, 10)).unwrap_err();
        assert!(matches!(err, HostError::PoolHalted(_)));
    }

    #[test]
    fn settlement_must_match_delta() {
        let mut host = MemoryHost::new();
        let k = key(0);
        host.create_pool(k.clone(), 1_000_000, 1_000_000).unwrap();
        let payer = AccountId::new("payer");
        host.mint(&payer, &AssetId::new("ETH"), 1_000);
        let delta = host.swap(&k, &SwapParams::permissive(Direction::ZeroForOne, 100)).unwrap();
        let err = host
            .supply(&AssetId::new("ETH"), &payer, delta.amount_in + 1)
            .unwrap_err();
        assert!(matches!(err, HostError::SettlementMismatch { .. }));
        host.supply(&AssetId::new("ETH"), &payer, delta.amount_in).unwrap();
        host.withdraw(&AssetId::new("USDC"), &payer, delta.amount_out).unwrap();
        assert!(host.is_settled());
    }

    #[test]
    fn receipts_mint_and_burn() {
        let mut host = MemoryHost::new();
        let holder = AccountId::new("alice");
        let order = OrderId::from_bytes(b"order");
        host.mint_receipts(&holder, &order, 10).unwrap();
        assert_eq!(host.receipt_balance(&holder, &order), 10);
        assert_eq!(host.receipt_supply(&order), 10);
        assert!(host.burn_receipts(&holder, &order, 11).is_err());
        host.burn_receipts(&holder, &order, 4).unwrap();
        assert_eq!(host.receipt_balance(&holder, &order), 6);
        assert_eq!(host.receipt_supply(&order), 6);
    }

    #[test]
    fn revert_restores_pool_balances_and_deltas() {
        let mut host = MemoryHost::new();
        let k = key(0);
        host.create_pool(k.clone(), 1_000_000, 1_000_000).unwrap();
        let payer = AccountId::new("payer");
        host.mint(&payer, &AssetId::new("ETH"), 1_000);

        let checkpoint = host.checkpoint();
        let delta = host.swap(&k, &SwapParams::permissive(Direction::ZeroForOne, 1_000)).unwrap();
        host.supply(&AssetId::new("ETH"), &payer, delta.amount_in).unwrap();
        assert!(!host.is_settled());

        host.revert(checkpoint).unwrap();
        assert_eq!(host.reserves(&k.id()), Some((1_000_000, 1_000_000)));
        assert_eq!(host.balance_of(&payer, &AssetId::new("ETH")), 1_000);
        assert!(host.is_settled());
        assert_eq!(host.revert(checkpoint), Err(HostError::UnknownCheckpoint(0)));
    }

    #[test]
    fn commit_keeps_changes_and_closes_inner_savepoints() {
        let mut host = MemoryHost::new();
        let k = key(0);
        host.create_pool(k.clone(), 1_000_000, 1_000_000).unwrap();
        let outer = host.checkpoint();
        let inner = host.checkpoint();
        assert_eq!(inner, Checkpoint(1));

        host.swap(&k, &SwapParams::permissive(Direction::ZeroForOne, 100)).unwrap();
        host.commit(outer);

        assert_ne!(host.reserves(&k.id()), Some((1_000_000, 1_000_000)));
        assert!(host.revert(inner).is_err());
        assert_eq!(host.checkpoint(), Checkpoint(0));
    }

    #[test]
    fn transfer_requires_funds() {
        let mut host = MemoryHost::new();
        let a = AccountId::new("a");
        let b = AccountId::new("b");
        let eth = AssetId::new("ETH");
        host.mint(&a, &eth, 5);
        assert!(host.transfer(&eth, &a, &b, 6).is_err());
        host.transfer(&eth, &a, &b, 5).unwrap();
        assert_eq!(host.balance_of(&b, &eth), 5);
        assert_eq!(host.balance_of(&a, &eth), 0);
    }
}
