//! Integration tests for the post-swap fill sweep.
//!
//! Tests:
//! 1. Single depositor: crossed order fills, proceeds become claimable
//! 2. Adjacent levels: a fill's own price impact un-crosses the next level
//! 3. Falling price: levels scanned from the anchor downward, restarted after each fill
//! 4. Failed fill: earlier fills stand, failed key keeps its input, last level unchanged
//! 5. No level change: nothing fills
//! 6. Halted venue: first fill fails, nothing recorded
//! 7. Incomplete fill: the venue swap is rolled back along with the book

use limitbook_core::domain::{AccountId, AssetId, Direction, OrderId, PoolKey};
use limitbook_core::host::{
    AssetLedger, Checkpoint, HostError, MemoryHost, ReceiptLedger, SwapDelta, SwapParams,
    SwapVenue,
};
use limitbook_core::{EngineConfig, EngineError, LimitOrderEngine};

/// Helper: fresh engine with one balanced, fee-free pool (spacing 60) at tick 0.
fn setup() -> (LimitOrderEngine, MemoryHost, PoolKey) {
    let mut engine = LimitOrderEngine::new(EngineConfig::default());
    let key = PoolKey::new(eth(), usdc(), 0, 60, engine.account().clone());
    let mut host = MemoryHost::new();
    host.create_pool(key.clone(), 1_000_000, 1_000_000).unwrap();
    engine.after_initialize(&host, &key).unwrap();
    (engine, host, key)
}

fn eth() -> AssetId {
    AssetId::new("ETH")
}

fn usdc() -> AssetId {
    AssetId::new("USDC")
}

/// Helper: fund `who` and rest an order.
fn place(
    engine: &mut LimitOrderEngine,
    host: &mut MemoryHost,
    key: &PoolKey,
    who: &str,
    tick: i32,
    amount: u128,
    direction: Direction,
) -> AccountId {
    let account = AccountId::new(who);
    host.mint(&account, direction.input_asset(key), amount);
    engine
        .place_order(host, &account, key, tick, amount, direction)
        .unwrap();
    account
}

/// Helper: external trader swap, settled immediately.
fn trade(host: &mut MemoryHost, key: &PoolKey, direction: Direction, amount: u128) {
    let trader = AccountId::new("trader");
    host.mint(&trader, direction.input_asset(key), amount);
    host.swap_and_settle(&trader, key, &SwapParams::permissive(direction, amount))
        .unwrap();
}

#[test]
fn single_depositor_fill_becomes_claimable() {
    let (mut engine, mut host, key) = setup();
    place(&mut engine, &mut host, &key, "alice", 60, 10, Direction::ZeroForOne);
    let order_id = LimitOrderEngine::order_id(&key, 60, Direction::ZeroForOne);

    trade(&mut host, &key, Direction::OneForZero, 10_000);
    let report = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap();

    assert_eq!(report.candidate, Direction::ZeroForOne);
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].level, 60);
    assert_eq!(report.fills[0].amount_in, 10);
    assert_eq!(report.fills[0].amount_out, 10);
    assert_eq!(engine.pending_amount(&key.id(), 60, Direction::ZeroForOne), 0);
    assert_eq!(engine.claimable_amount(&order_id), 10);
    assert_eq!(engine.total_outstanding(&order_id), 10);
    assert_eq!(host.balance_of(engine.account(), &usdc()), 10);
    assert_eq!(host.balance_of(engine.account(), &eth()), 0);
    assert_eq!(engine.last_level(&key.id()), Some(180));
    assert!(host.is_settled());
}

#[test]
fn adjacent_level_uncrossed_by_fill_impact() {
    let (mut engine, mut host, key) = setup();
    place(&mut engine, &mut host, &key, "alice", 60, 5_000, Direction::ZeroForOne);
    place(&mut engine, &mut host, &key, "bob", 120, 5_000, Direction::ZeroForOne);

    // Price rises to tick 199 (level 180): both levels are crossed.
    trade(&mut host, &key, Direction::OneForZero, 10_000);
    let report = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap();

    // Filling 60 sells 5000 ETH and drags the price back to tick 98 (level 60),
    // so 120 is no longer inside (0, 60] when the scan restarts.
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].level, 60);
    assert_eq!(report.fills[0].amount_out, 5_074);
    assert_eq!(
        engine.resting_levels(&key.id(), Direction::ZeroForOne),
        vec![(120, 5_000)]
    );
    assert_eq!(engine.last_level(&key.id()), Some(60));
}

#[test]
fn chained_fills_ascend_from_anchor() {
    let (mut engine, mut host, key) = setup();
    place(&mut engine, &mut host, &key, "alice", 60, 1_000, Direction::ZeroForOne);
    place(&mut engine, &mut host, &key, "bob", 120, 1_000, Direction::ZeroForOne);

    trade(&mut host, &key, Direction::OneForZero, 20_000);
    let report = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap();

    let levels: Vec<i32> = report.fills.iter().map(|f| f.level).collect();
    assert_eq!(levels, vec![60, 120]);
    assert_eq!(report.start_level, 0);
    assert_eq!(report.end_level, 300);
    assert_eq!(engine.last_level(&key.id()), Some(300));
    assert_eq!(engine.fill_history().count(), 2);
}

#[test]
fn falling_price_scans_downward_and_restarts() {
    let (mut engine, mut host, key) = setup();
    place(&mut engine, &mut host, &key, "alice", -60, 5_000, Direction::OneForZero);
    place(&mut engine, &mut host, &key, "bob", -120, 5_000, Direction::OneForZero);

    // Price falls to tick -200 (level -240).
    trade(&mut host, &key, Direction::ZeroForOne, 10_000);
    let report = engine.after_swap(&mut host, &key, Direction::ZeroForOne).unwrap();

    // -60 first (highest level in [-240, 0)); its fill lifts the price to
    // level -120, which is still inside [-120, 0), so -120 fills next.
    let levels: Vec<i32> = report.fills.iter().map(|f| f.level).collect();
    assert_eq!(levels, vec![-60, -120]);
    assert_eq!(report.fills[0].amount_out, 5_074);
    assert_eq!(report.fills[1].amount_out, 5_024);
    assert_eq!(engine.last_level(&key.id()), Some(0));
}

#[test]
fn same_direction_orders_are_not_candidates() {
    let (mut engine, mut host, key) = setup();
    place(&mut engine, &mut host, &key, "alice", 60, 1_000, Direction::OneForZero);

    trade(&mut host, &key, Direction::OneForZero, 10_000);
    let report = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap();

    assert!(report.fills.is_empty());
    assert_eq!(engine.pending_amount(&key.id(), 60, Direction::OneForZero), 1_000);
}

#[test]
fn no_level_change_fills_nothing() {
    let (mut engine, mut host, key) = setup();
    place(&mut engine, &mut host, &key, "alice", 0, 1_000, Direction::ZeroForOne);

    // 100 units moves the price less than one spacing.
    trade(&mut host, &key, Direction::OneForZero, 100);
    let report = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap();

    assert!(report.fills.is_empty());
    assert_eq!(report.end_level, 0);
    assert_eq!(engine.pending_amount(&key.id(), 0, Direction::ZeroForOne), 1_000);
}

// ── Failing venue ────────────────────────────────────────────────────

/// Memory host whose venue refuses every swap after the first `allowed`.
struct FlakyHost {
    inner: MemoryHost,
    allowed: usize,
}

impl SwapVenue for FlakyHost {
    fn current_tick(&self, pool: &PoolKey) -> Result<i32, HostError> {
        self.inner.current_tick(pool)
    }

    fn swap(&mut self, pool: &PoolKey, params: &SwapParams) -> Result<SwapDelta, HostError> {
        if self.allowed == 0 {
            return Err(HostError::PoolHalted(pool.id()));
        }
        self.allowed -= 1;
        self.inner.swap(pool, params)
    }

    fn supply(&mut self, asset: &AssetId, payer: &AccountId, amount: u128) -> Result<(), HostError> {
        self.inner.supply(asset, payer, amount)
    }

    fn withdraw(
        &mut self,
        asset: &AssetId,
        recipient: &AccountId,
        amount: u128,
    ) -> Result<(), HostError> {
        self.inner.withdraw(asset, recipient, amount)
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.inner.checkpoint()
    }

    fn revert(&mut self, checkpoint: Checkpoint) -> Result<(), HostError> {
        self.inner.revert(checkpoint)
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.inner.commit(checkpoint)
    }
}

impl ReceiptLedger for FlakyHost {
    fn receipt_balance(&self, holder: &AccountId, order: &OrderId) -> u128 {
        self.inner.receipt_balance(holder, order)
    }

    fn receipt_supply(&self, order: &OrderId) -> u128 {
        self.inner.receipt_supply(order)
    }

    fn mint_receipts(
        &mut self,
        holder: &AccountId,
        order: &OrderId,
        amount: u128,
    ) -> Result<(), HostError> {
        self.inner.mint_receipts(holder, order, amount)
    }

    fn burn_receipts(
        &mut self,
        holder: &AccountId,
        order: &OrderId,
        amount: u128,
    ) -> Result<(), HostError> {
        self.inner.burn_receipts(holder, order, amount)
    }
}

impl AssetLedger for FlakyHost {
    fn balance_of(&self, owner: &AccountId, asset: &AssetId) -> u128 {
        self.inner.balance_of(owner, asset)
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), HostError> {
        self.inner.transfer(asset, from, to, amount)
    }
}

#[test]
fn failed_fill_keeps_prior_fills_and_last_level() {
    let (mut engine, mut inner, key) = setup();
    place(&mut engine, &mut inner, &key, "alice", 60, 1_000, Direction::ZeroForOne);
    place(&mut engine, &mut inner, &key, "bob", 120, 1_000, Direction::ZeroForOne);
    trade(&mut inner, &key, Direction::OneForZero, 20_000);

    let mut host = FlakyHost { inner, allowed: 1 };
    let err = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap_err();

    match err {
        EngineError::ExternalSwapFailure { level, ref source, .. } => {
            assert_eq!(level, 120);
            assert!(matches!(source, HostError::PoolHalted(_)));
        }
        other => panic!("expected ExternalSwapFailure, got {other:?}"),
    }
    let first = LimitOrderEngine::order_id(&key, 60, Direction::ZeroForOne);
    assert_eq!(engine.claimable_amount(&first), 1_039);
    assert_eq!(engine.pending_amount(&key.id(), 60, Direction::ZeroForOne), 0);
    assert_eq!(engine.pending_amount(&key.id(), 120, Direction::ZeroForOne), 1_000);
    assert_eq!(engine.last_level(&key.id()), Some(0));
    assert_eq!(host.inner.balance_of(engine.account(), &eth()), 1_000);
    assert!(host.inner.is_settled());

    // Venue recovers: the next sweep retries from the same anchor.
    host.allowed = usize::MAX;
    let report = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap();
    assert_eq!(report.start_level, 0);
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].level, 120);
    assert_eq!(engine.last_level(&key.id()), Some(300));
}

#[test]
fn halted_pool_fails_first_fill_and_keeps_level() {
    let (mut engine, mut host, key) = setup();
    place(&mut engine, &mut host, &key, "alice", 60, 1_000, Direction::ZeroForOne);
    trade(&mut host, &key, Direction::OneForZero, 10_000);
    host.halt_pool(&key.id(), true).unwrap();

    let err = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap_err();

    assert!(matches!(err, EngineError::ExternalSwapFailure { level: 60, .. }));
    assert_eq!(engine.pending_amount(&key.id(), 60, Direction::ZeroForOne), 1_000);
    assert_eq!(engine.fill_history().count(), 0);
    assert_eq!(engine.last_level(&key.id()), Some(0));
}

#[test]
fn incomplete_fill_rolls_back_venue() {
    let mut engine = LimitOrderEngine::new(EngineConfig::default());
    let key = PoolKey::new(eth(), usdc(), 0, 60, engine.account().clone());
    let mut host = MemoryHost::new();
    host.create_pool(key.clone(), 1, 1).unwrap();
    engine.after_initialize(&host, &key).unwrap();

    // Two maximal deposits: more input than the pool can absorb before the
    // price bound, so the venue caps the swap.
    let deposit = u128::from(u64::MAX);
    place(&mut engine, &mut host, &key, "alice", 60, deposit, Direction::ZeroForOne);
    place(&mut engine, &mut host, &key, "bob", 60, deposit, Direction::ZeroForOne);
    trade(&mut host, &key, Direction::OneForZero, 1);
    assert_eq!(host.reserves(&key.id()), Some((1, 2)));
    let tick = host.current_tick(&key).unwrap();

    let err = engine.after_swap(&mut host, &key, Direction::OneForZero).unwrap_err();

    assert!(matches!(
        err,
        EngineError::ExternalSwapFailure {
            level: 60,
            source: HostError::IncompleteSwap { .. },
            ..
        }
    ));
    assert_eq!(host.reserves(&key.id()), Some((1, 2)));
    assert_eq!(host.current_tick(&key).unwrap(), tick);
    assert!(host.is_settled());
    assert_eq!(engine.pending_amount(&key.id(), 60, Direction::ZeroForOne), 2 * deposit);
    assert_eq!(host.balance_of(engine.account(), &eth()), 2 * deposit);
    assert_eq!(host.balance_of(engine.account(), &usdc()), 0);
    assert_eq!(engine.last_level(&key.id()), Some(0));
}
