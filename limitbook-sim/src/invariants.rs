//! Invariant auditor, run after every scenario step.
//!
//! Checks:
//! - Receipt supply on the ledger equals the engine's outstanding count, per order
//! - Custody balance covers pending input plus unredeemed proceeds, per asset
//! - Every venue swap flow has been settled

use limitbook_core::host::{AssetLedger, MemoryHost, ReceiptLedger};
use limitbook_core::LimitOrderEngine;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ReceiptSupply,
    CustodyShortfall,
    UnsettledVenue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

/// All invariant violations in the current state. Empty when healthy.
pub fn audit(engine: &LimitOrderEngine, host: &MemoryHost) -> Vec<Violation> {
    let mut violations = Vec::new();

    let mut orders: Vec<_> = engine.order_records().map(|(id, _)| id).collect();
    orders.sort();
    for order_id in orders {
        let supply = host.receipt_supply(order_id);
        let outstanding = engine.total_outstanding(order_id);
        if supply != outstanding {
            violations.push(Violation {
                kind: ViolationKind::ReceiptSupply,
                detail: format!(
                    "order {}: receipt supply {supply}, outstanding {outstanding}",
                    order_id.short()
                ),
            });
        }
    }

    for (asset, owed) in engine.liabilities() {
        let held = host.balance_of(engine.account(), &asset);
        if held < owed {
            violations.push(Violation {
                kind: ViolationKind::CustodyShortfall,
                detail: format!("{asset}: custody holds {held}, owes {owed}"),
            });
        }
    }

    if !host.is_settled() {
        violations.push(Violation {
            kind: ViolationKind::UnsettledVenue,
            detail: "venue has unsettled swap deltas".into(),
        });
    }

    violations
}
