//! Swap executor — one venue swap plus settlement of its flow.
//!
//! Stateless. Fills accept unlimited slippage: the trigger has already
//! established that the market reached the depositors' level, so the price
//! bound is the widest one the venue accepts.

use crate::domain::{AccountId, Amount, Direction, PoolKey};
use crate::host::{Host, HostError, SwapDelta, SwapParams};
use tracing::warn;

pub struct SwapExecutor<'a> {
    /// Account that pays the input and receives the output.
    account: &'a AccountId,
}

impl<'a> SwapExecutor<'a> {
    pub fn new(account: &'a AccountId) -> Self {
        Self { account }
    }

    /// Swap exactly `amount` of the direction's input asset and settle.
    ///
    /// Runs inside a venue savepoint. A venue that consumes less than
    /// `amount`, or a settlement leg that fails, reverts the pool and every
    /// balance to the savepoint: fills are all-or-nothing.
    pub fn execute(
        &self,
        host: &mut dyn Host,
        pool: &PoolKey,
        direction: Direction,
        amount: Amount,
    ) -> Result<SwapDelta, HostError> {
        let checkpoint = host.checkpoint();
        match self.swap_and_settle(host, pool, direction, amount) {
            Ok(delta) => {
                host.commit(checkpoint);
                Ok(delta)
            }
            Err(err) => {
                if let Err(undo) = host.revert(checkpoint) {
                    let pool_id = pool.id();
                    warn!(pool = %pool_id.short(), error = %undo, "venue revert failed");
                }
                Err(err)
            }
        }
    }

    fn swap_and_settle(
        &self,
        host: &mut dyn Host,
        pool: &PoolKey,
        direction: Direction,
        amount: Amount,
    ) -> Result<SwapDelta, HostError> {
        let params = SwapParams::permissive(direction, amount);
        let delta = host.swap(pool, &params)?;
        if delta.amount_in != amount {
            return Err(HostError::IncompleteSwap {
                requested: amount,
                consumed: delta.amount_in,
            });
        }
        host.supply(direction.input_asset(pool), self.account, delta.amount_in)?;
        host.withdraw(direction.output_asset(pool), self.account, delta.amount_out)?;
        Ok(delta)
    }
}
