//! Scenario runner — drives an engine and an in-memory host through a script.
//!
//! Step failures are part of the result, not the run: a rejected step is
//! recorded with its error text and the run continues. Only scenario setup
//! problems (bad pool definition, hash failure) abort.

use crate::invariants::audit;
use crate::report::{BalanceRow, OrderState, SimReport, StepOutcome, StepStatus, SCHEMA_VERSION};
use crate::scenario::{Scenario, ScenarioError, Step};
use limitbook_core::domain::{AccountId, Amount, AssetId, PoolKey};
use limitbook_core::host::{HostError, MemoryHost, ReceiptLedger, SwapParams};
use limitbook_core::{EngineError, LimitOrderEngine};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("host: {0}")]
    Host(#[from] HostError),

    #[error("unknown pool '{0}'")]
    UnknownPool(String),

    #[error("hash scenario: {0}")]
    Hash(#[from] serde_json::Error),
}

/// What an applied step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub detail: String,
    pub fills: usize,
    /// Set when an external swap went through but the sweep after it failed.
    pub sweep_error: Option<String>,
}

impl Applied {
    fn new(detail: String) -> Self {
        Self { detail, fills: 0, sweep_error: None }
    }
}

/// Engine + host + pool names, ready to take steps.
pub struct Simulation {
    engine: LimitOrderEngine,
    host: MemoryHost,
    pools: BTreeMap<String, PoolKey>,
}

impl Simulation {
    /// Create and initialize every pool, then fund every account.
    pub fn new(scenario: &Scenario) -> Result<Self, SimError> {
        let mut engine = LimitOrderEngine::new(scenario.engine.clone());
        let mut host = MemoryHost::new();
        let mut pools = BTreeMap::new();

        for spec in &scenario.pools {
            let key = PoolKey::new(
                AssetId::new(&spec.asset0),
                AssetId::new(&spec.asset1),
                spec.fee_pips,
                spec.tick_spacing,
                engine.account().clone(),
            );
            key.validate().map_err(EngineError::from)?;
            let tick = host.create_pool(
                key.clone(),
                Amount::from(spec.reserve0),
                Amount::from(spec.reserve1),
            )?;
            let level = engine.after_initialize(&host, &key)?;
            debug!(pool = %spec.name, tick, level, "pool ready");
            pools.insert(spec.name.clone(), key);
        }

        for account in &scenario.accounts {
            let owner = AccountId::new(&account.name);
            for (asset, amount) in &account.balances {
                host.mint(&owner, &AssetId::new(asset), Amount::from(*amount));
            }
        }

        Ok(Self { engine, host, pools })
    }

    pub fn engine(&self) -> &LimitOrderEngine {
        &self.engine
    }

    pub fn host(&self) -> &MemoryHost {
        &self.host
    }

    pub fn pool_key(&self, name: &str) -> Result<&PoolKey, SimError> {
        self.pools
            .get(name)
            .ok_or_else(|| SimError::UnknownPool(name.to_string()))
    }

    /// Execute one step against the engine.
    pub fn apply(&mut self, step: &Step) -> Result<Applied, SimError> {
        let key = self.pool_key(step.pool())?.clone();
        let account = AccountId::new(step.account());

        match step {
            Step::Place { tick, amount, direction, .. } => {
                let level = self.engine.place_order(
                    &mut self.host,
                    &account,
                    &key,
                    *tick,
                    Amount::from(*amount),
                    *direction,
                )?;
                Ok(Applied::new(format!("rested {amount} at level {level}")))
            }
            Step::Swap { direction, amount, .. } => {
                let params = SwapParams::permissive(*direction, Amount::from(*amount));
                let delta = self.host.swap_and_settle(&account, &key, &params)?;
                let swapped = format!("swapped {} for {}", delta.amount_in, delta.amount_out);
                let sweeps_before = self.engine.sweep_count();
                match self.engine.after_swap(&mut self.host, &key, *direction) {
                    Ok(sweep) => Ok(Applied {
                        detail: format!(
                            "{swapped}, level {} -> {}",
                            sweep.start_level, sweep.end_level
                        ),
                        fills: sweep.fills.len(),
                        sweep_error: None,
                    }),
                    Err(err) => {
                        // Fills made before the failing one still stand.
                        let fills = self
                            .engine
                            .fill_history()
                            .filter(|f| f.sweep > sweeps_before)
                            .count();
                        Ok(Applied { detail: swapped, fills, sweep_error: Some(err.to_string()) })
                    }
                }
            }
            Step::Cancel { level, direction, .. } => {
                let refunded =
                    self.engine
                        .cancel_order(&mut self.host, &account, &key, *level, *direction)?;
                Ok(Applied::new(format!("refunded {refunded}")))
            }
            Step::CancelReceipts { level, direction, receipts, .. } => {
                let order_id = LimitOrderEngine::order_id(&key, *level, *direction);
                let refunded = self.engine.cancel_receipts(
                    &mut self.host,
                    &account,
                    &order_id,
                    Amount::from(*receipts),
                )?;
                Ok(Applied::new(format!("refunded {refunded}")))
            }
            Step::Redeem { level, direction, receipts, destination, .. } => {
                let order_id = LimitOrderEngine::order_id(&key, *level, *direction);
                let receipts = match receipts {
                    Some(r) => Amount::from(*r),
                    None => self.host.receipt_balance(&account, &order_id),
                };
                let destination = destination
                    .as_deref()
                    .map(AccountId::new)
                    .unwrap_or_else(|| account.clone());
                let paid = self.engine.redeem(
                    &mut self.host,
                    &account,
                    &order_id,
                    receipts,
                    &destination,
                )?;
                Ok(Applied::new(format!("burned {receipts}, paid {paid} to {destination}")))
            }
        }
    }

    /// Snapshot of the final state.
    pub fn report(&self, scenario_hash: String, steps: Vec<StepOutcome>) -> SimReport {
        let pool_name = |key: &PoolKey| {
            self.pools
                .iter()
                .find(|(_, k)| *k == key)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| key.id().short().to_string())
        };

        let mut orders: Vec<OrderState> = self
            .engine
            .order_records()
            .map(|(order_id, record)| OrderState {
                order_id: order_id.clone(),
                pool: pool_name(&record.pool_key),
                level: record.level,
                direction: record.direction,
                pending: self.engine.pending_amount(
                    &record.pool_key.id(),
                    record.level,
                    record.direction,
                ),
                claimable: self.engine.claimable_amount(order_id),
                outstanding: self.engine.total_outstanding(order_id),
            })
            .collect();
        orders.sort_by(|a, b| {
            (&a.pool, a.direction, a.level).cmp(&(&b.pool, b.direction, b.level))
        });

        let balances = self
            .host
            .balances()
            .map(|(account, asset, amount)| BalanceRow {
                account: account.0.clone(),
                asset: asset.0.clone(),
                amount,
            })
            .collect();

        let last_levels = self
            .pools
            .iter()
            .filter_map(|(name, key)| {
                self.engine
                    .last_level(&key.id())
                    .map(|level| (name.clone(), level))
            })
            .collect();

        SimReport {
            schema_version: SCHEMA_VERSION,
            scenario_hash,
            generated_at: chrono::Utc::now(),
            steps,
            fills: self.engine.fill_history().cloned().collect(),
            orders,
            balances,
            last_levels,
        }
    }
}

/// Run every step of a scenario, auditing invariants after each.
pub fn run_scenario(scenario: &Scenario) -> Result<SimReport, SimError> {
    let scenario_hash = scenario.hash()?;
    let mut sim = Simulation::new(scenario)?;
    info!(
        scenario = %scenario_hash,
        pools = scenario.pools.len(),
        steps = scenario.steps.len(),
        "running scenario"
    );

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let (status, detail, fills, sweep_error) = match sim.apply(step) {
            Ok(applied) => {
                if let Some(err) = &applied.sweep_error {
                    warn!(step = index, error = %err, "sweep after swap failed");
                }
                (StepStatus::Applied, applied.detail, applied.fills, applied.sweep_error)
            }
            Err(err) => {
                warn!(step = index, action = step.action(), error = %err, "step rejected");
                (StepStatus::Rejected, err.to_string(), 0, None)
            }
        };

        let violations = audit(&sim.engine, &sim.host);
        for violation in &violations {
            warn!(step = index, %violation, "invariant violated");
        }

        outcomes.push(StepOutcome {
            index,
            action: step.action().to_string(),
            account: step.account().to_string(),
            status,
            detail,
            fills,
            sweep_error,
            violations,
        });
    }

    let report = sim.report(scenario_hash, outcomes);
    info!(
        applied = report.applied(),
        rejected = report.rejected(),
        fills = report.fills.len(),
        clean = report.is_clean(),
        "scenario complete"
    );
    Ok(report)
}
