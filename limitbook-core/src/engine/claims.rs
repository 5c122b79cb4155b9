//! Claim ledger — fill proceeds and outstanding receipts per order.
//!
//! `claimable` grows on fills and shrinks on redemptions; `outstanding`
//! grows on deposits and shrinks on cancels and redemptions. Payouts are
//! `floor(receipts * claimable / outstanding)`, so the sum of all payouts can
//! never exceed what was collected. The last redeemer may leave dust behind;
//! that residue stays in the ledger and is never rounded up.

use crate::domain::{Amount, OrderId};
use crate::error::{EngineError, ValidationError};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ClaimLedger {
    claimable: HashMap<OrderId, Amount>,
    outstanding: HashMap<OrderId, Amount>,
}

/// Result of a redemption, kept so the debit can be undone if the payout
/// transfer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redemption {
    pub receipts_burned: Amount,
    pub amount_paid: Amount,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claimable(&self, order_id: &OrderId) -> Amount {
        self.claimable.get(order_id).copied().unwrap_or_default()
    }

    pub fn outstanding(&self, order_id: &OrderId) -> Amount {
        self.outstanding.get(order_id).copied().unwrap_or_default()
    }

    /// Receipts issued against a deposit.
    pub fn issue(&mut self, order_id: &OrderId, receipts: Amount) -> Result<(), EngineError> {
        let total = self
            .outstanding(order_id)
            .checked_add(receipts)
            .ok_or(ValidationError::ArithmeticOverflow)?;
        self.outstanding.insert(order_id.clone(), total);
        Ok(())
    }

    /// Receipts retired by a cancel (or the undo of an issue).
    pub fn retire(&mut self, order_id: &OrderId, receipts: Amount) -> Result<(), EngineError> {
        let total = self.outstanding(order_id);
        if receipts > total {
            return Err(EngineError::InsufficientBalance {
                requested: receipts,
                available: total,
            });
        }
        self.outstanding.insert(order_id.clone(), total - receipts);
        Ok(())
    }

    /// Credit fill proceeds. Called after the book has released the filled input.
    pub fn on_fill(&mut self, order_id: &OrderId, proceeds: Amount) {
        let entry = self.claimable.entry(order_id.clone()).or_default();
        *entry = entry.saturating_add(proceeds);
    }

    /// Debit a proportional share of the order's proceeds for `receipts`.
    ///
    /// `held` is the caller's receipt balance on the external ledger. All
    /// checks happen before either counter moves.
    pub fn redeem(
        &mut self,
        order_id: &OrderId,
        receipts: Amount,
        held: Amount,
    ) -> Result<Redemption, EngineError> {
        if receipts == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let claimable = self.claimable(order_id);
        if claimable == 0 {
            return Err(EngineError::NothingToClaim(order_id.clone()));
        }
        if receipts > held {
            return Err(EngineError::InsufficientBalance {
                requested: receipts,
                available: held,
            });
        }
        let outstanding = self.outstanding(order_id);
        if receipts > outstanding {
            return Err(EngineError::InsufficientBalance {
                requested: receipts,
                available: outstanding,
            });
        }

        let amount_paid = receipts
            .checked_mul(claimable)
            .ok_or(ValidationError::ArithmeticOverflow)?
            / outstanding;

        self.claimable.insert(order_id.clone(), claimable - amount_paid);
        self.outstanding.insert(order_id.clone(), outstanding - receipts);
        Ok(Redemption { receipts_burned: receipts, amount_paid })
    }

    /// Reverse a redemption whose external payout failed.
    pub fn unwind(&mut self, order_id: &OrderId, redemption: Redemption) {
        let claimable = self.claimable.entry(order_id.clone()).or_default();
        *claimable = claimable.saturating_add(redemption.amount_paid);
        let outstanding = self.outstanding.entry(order_id.clone()).or_default();
        *outstanding = outstanding.saturating_add(redemption.receipts_burned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderId {
        OrderId::from_bytes(b"order")
    }

    #[test]
    fn proportional_split_floors() {
        let mut ledger = ClaimLedger::new();
        ledger.issue(&order(), 1).unwrap();
        ledger.issue(&order(), 2).unwrap();
        ledger.on_fill(&order(), 100);

        let a = ledger.redeem(&order(), 1, 1).unwrap();
        assert_eq!(a.amount_paid, 33);
        let b = ledger.redeem(&order(), 2, 2).unwrap();
        // 2 * 67 / 2 = 67: the last redeemer takes everything left
        assert_eq!(b.amount_paid, 67);
        assert_eq!(ledger.claimable(&order()), 0);
        assert_eq!(ledger.outstanding(&order()), 0);
    }

    #[test]
    fn redeem_in_reverse_order_leaves_dust() {
        let mut ledger = ClaimLedger::new();
        ledger.issue(&order(), 3).unwrap();
        ledger.on_fill(&order(), 10);

        let first = ledger.redeem(&order(), 1, 3).unwrap();
        let second = ledger.redeem(&order(), 1, 2).unwrap();
        let third = ledger.redeem(&order(), 1, 1).unwrap();
        assert_eq!(first.amount_paid, 3);
        assert_eq!(second.amount_paid, 3);
        assert_eq!(third.amount_paid, 4);
        assert_eq!(first.amount_paid + second.amount_paid + third.amount_paid, 10);
    }

    #[test]
    fn zero_receipts_rejected() {
        let mut ledger = ClaimLedger::new();
        ledger.issue(&order(), 5).unwrap();
        ledger.on_fill(&order(), 5);
        assert_eq!(
            ledger.redeem(&order(), 0, 5).unwrap_err(),
            EngineError::Validation(ValidationError::ZeroAmount)
        );
    }

    #[test]
    fn nothing_to_claim_before_fill() {
        let mut ledger = ClaimLedger::new();
        ledger.issue(&order(), 5).unwrap();
        assert_eq!(
            ledger.redeem(&order(), 5, 5).unwrap_err(),
            EngineError::NothingToClaim(order())
        );
    }

    #[test]
    fn cannot_redeem_more_than_held() {
        let mut ledger = ClaimLedger::new();
        ledger.issue(&order(), 10).unwrap();
        ledger.on_fill(&order(), 10);
        assert_eq!(
            ledger.redeem(&order(), 6, 5).unwrap_err(),
            EngineError::InsufficientBalance { requested: 6, available: 5 }
        );
        assert_eq!(ledger.claimable(&order()), 10);
        assert_eq!(ledger.outstanding(&order()), 10);
    }

    #[test]
    fn retire_bounded_by_outstanding() {
        let mut ledger = ClaimLedger::new();
        ledger.issue(&order(), 4).unwrap();
        assert!(ledger.retire(&order(), 5).is_err());
        ledger.retire(&order(), 4).unwrap();
        assert_eq!(ledger.outstanding(&order()), 0);
    }

    #[test]
    fn unwind_restores_both_counters() {
        let mut ledger = ClaimLedger::new();
        ledger.issue(&order(), 4).unwrap();
        ledger.on_fill(&order(), 9);
        let r = ledger.redeem(&order(), 2, 4).unwrap();
        ledger.unwind(&order(), r);
        assert_eq!(ledger.claimable(&order()), 9);
        assert_eq!(ledger.outstanding(&order()), 4);
    }
}
