//! Simulation report — everything a run produced, serializable to JSON.

use crate::invariants::Violation;
use chrono::{DateTime, Utc};
use limitbook_core::domain::{Amount, Direction, FillRecord, OrderId, PriceLevel};
use serde::{Deserialize, Serialize};

/// Bumped whenever the report layout changes.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Applied,
    Rejected,
}

/// Outcome of one scenario step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub account: String,
    pub status: StepStatus,
    /// Human-readable result: the level placed at, amount refunded or paid,
    /// or the error text for a rejected step.
    pub detail: String,
    /// Fills produced by this step's sweep.
    pub fills: usize,
    /// Error of a sweep that failed after its swap was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_error: Option<String>,
    pub violations: Vec<Violation>,
}

/// Final state of one order key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    pub order_id: OrderId,
    pub pool: String,
    pub level: PriceLevel,
    pub direction: Direction,
    pub pending: Amount,
    pub claimable: Amount,
    pub outstanding: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub account: String,
    pub asset: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimReport {
    pub schema_version: u32,
    pub scenario_hash: String,
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<StepOutcome>,
    pub fills: Vec<FillRecord>,
    pub orders: Vec<OrderState>,
    pub balances: Vec<BalanceRow>,
    /// Last observed level per pool name.
    pub last_levels: Vec<(String, PriceLevel)>,
}

impl SimReport {
    pub fn applied(&self) -> usize {
        self.steps.iter().filter(|s| s.status == StepStatus::Applied).count()
    }

    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| s.status == StepStatus::Rejected).count()
    }

    /// Every violation seen, tagged with the step it followed.
    pub fn violations(&self) -> impl Iterator<Item = (usize, &Violation)> {
        self.steps
            .iter()
            .flat_map(|s| s.violations.iter().map(move |v| (s.index, v)))
    }

    /// Steps whose swap went through but whose sweep failed.
    pub fn failed_sweeps(&self) -> usize {
        self.steps.iter().filter(|s| s.sweep_error.is_some()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.violations().next().is_none()
    }
}
