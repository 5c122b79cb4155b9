//! Interfaces of the external collaborators: the AMM venue, the receipt
//! ledger, and the asset ledger.
//!
//! The engine never owns these. It borrows a `&mut dyn Host` for the duration
//! of one operation, so nothing the host does can call back into the engine
//! while that operation is in flight.

pub mod memory;

pub use memory::MemoryHost;

use crate::domain::{AccountId, Amount, AssetId, Direction, OrderId, PoolId, PoolKey};
use crate::engine::levels::{MAX_TICK, MIN_TICK};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("pool {0} does not exist")]
    UnknownPool(PoolId),

    #[error("pool {0} already exists")]
    PoolExists(PoolId),

    #[error("pool {0} is halted")]
    PoolHalted(PoolId),

    #[error("insufficient liquidity in pool {0}")]
    InsufficientLiquidity(PoolId),

    #[error("account {account} holds {available} {asset}, needs {requested}")]
    InsufficientFunds {
        account: AccountId,
        asset: AssetId,
        requested: Amount,
        available: Amount,
    },

    #[error("settlement of {asset} does not match the open delta: {detail}")]
    SettlementMismatch { asset: AssetId, detail: String },

    #[error("swap consumed {consumed} of the requested {requested}")]
    IncompleteSwap { requested: Amount, consumed: Amount },

    #[error("arithmetic overflow in host")]
    Overflow,

    #[error("checkpoint {0} is not open")]
    UnknownCheckpoint(usize),
}

/// Arguments of one exact-input swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub direction: Direction,
    pub exact_input: Amount,
    /// Tick the swap may not move the price past.
    pub price_limit: i32,
}

impl SwapParams {
    /// Exact-input swap with the widest possible price bound for its direction.
    pub fn permissive(direction: Direction, exact_input: Amount) -> Self {
        let price_limit = match direction {
            Direction::ZeroForOne => MIN_TICK,
            Direction::OneForZero => MAX_TICK,
        };
        Self { direction, exact_input, price_limit }
    }
}

/// Asset flow produced by a swap, owed in each direction until settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwapDelta {
    pub amount_in: Amount,
    pub amount_out: Amount,
}

/// Handle to an open venue savepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

/// The AMM: pool price state, swap execution, and settlement of swap flows.
///
/// Savepoints nest. A fill opens one before swapping and either commits it
/// or reverts to it, so a failure anywhere in swap-and-settle leaves the
/// pool and every balance as they were.
pub trait SwapVenue {
    /// Current tick of the pool (the raw price the engine discretizes).
    fn current_tick(&self, pool: &PoolKey) -> Result<i32, HostError>;

    /// Execute a swap. The returned flow must then be settled with
    /// `supply` (input) and `withdraw` (output).
    fn swap(&mut self, pool: &PoolKey, params: &SwapParams) -> Result<SwapDelta, HostError>;

    /// Pay `amount` of `asset` owed to the venue from `payer`.
    fn supply(&mut self, asset: &AssetId, payer: &AccountId, amount: Amount)
        -> Result<(), HostError>;

    /// Take `amount` of `asset` owed by the venue to `recipient`.
    fn withdraw(
        &mut self,
        asset: &AssetId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), HostError>;

    /// Open a savepoint over pool reserves, balances and open deltas.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Undo everything since `checkpoint` and close it, along with any
    /// savepoint opened after it.
    fn revert(&mut self, checkpoint: Checkpoint) -> Result<(), HostError>;

    /// Keep everything since `checkpoint` and close it.
    fn commit(&mut self, checkpoint: Checkpoint);
}

/// Fungible receipt tokens, one denomination per `OrderId`.
pub trait ReceiptLedger {
    fn receipt_balance(&self, holder: &AccountId, order: &OrderId) -> Amount;
    fn receipt_supply(&self, order: &OrderId) -> Amount;
    fn mint_receipts(
        &mut self,
        holder: &AccountId,
        order: &OrderId,
        amount: Amount,
    ) -> Result<(), HostError>;
    fn burn_receipts(
        &mut self,
        holder: &AccountId,
        order: &OrderId,
        amount: Amount,
    ) -> Result<(), HostError>;
}

/// Plain asset balances and transfers.
pub trait AssetLedger {
    fn balance_of(&self, owner: &AccountId, asset: &AssetId) -> Amount;
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), HostError>;
}

/// Everything the engine needs from its environment.
pub trait Host: SwapVenue + ReceiptLedger + AssetLedger {}

impl<T: SwapVenue + ReceiptLedger + AssetLedger> Host for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_limits_follow_direction() {
        let down = SwapParams::permissive(Direction::ZeroForOne, 10);
        assert_eq!(down.price_limit, MIN_TICK);
        let up = SwapParams::permissive(Direction::OneForZero, 10);
        assert_eq!(up.price_limit, MAX_TICK);
        assert_eq!(up.exact_input, 10);
    }
}
