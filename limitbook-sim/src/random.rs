//! Seeded random traffic — generated scenarios and parallel batch runs.
//!
//! A master seed is expanded into one sub-seed per run via BLAKE3, so run `i`
//! generates the same scenario no matter how many runs there are or which
//! thread picks it up.

use crate::report::SimReport;
use crate::runner::{run_scenario, SimError};
use crate::scenario::{AccountSpec, PoolSpec, Scenario, Step};
use limitbook_core::domain::Direction;
use limitbook_core::engine::discretize;
use limitbook_core::EngineConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const POOL: &str = "eth-usdc";
const TICK_SPACING: i32 = 60;
const DEPOSITORS: [&str; 4] = ["alice", "bob", "carol", "dave"];
const TRADER: &str = "trader";

/// Master seed → per-run sub-seeds.
#[derive(Debug, Clone)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Sub-seed for one run, independent of derivation order.
    pub fn sub_seed(&self, run: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(b"limitbook-fuzz");
        hasher.update(&run.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, run: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(run))
    }
}

fn random_direction(rng: &mut StdRng) -> Direction {
    if rng.gen_bool(0.5) {
        Direction::ZeroForOne
    } else {
        Direction::OneForZero
    }
}

/// Random but well-formed scenario: one pool, a handful of funded depositors,
/// a funded trader, and `steps` mixed actions around the starting price.
pub fn generate_scenario(rng: &mut StdRng, steps: usize) -> Scenario {
    let pools = vec![PoolSpec {
        name: POOL.to_string(),
        asset0: "ETH".to_string(),
        asset1: "USDC".to_string(),
        fee_pips: 3_000,
        tick_spacing: TICK_SPACING,
        reserve0: 10_000_000,
        reserve1: 10_000_000,
    }];

    let funded = |amount: u64| -> BTreeMap<String, u64> {
        [("ETH".to_string(), amount), ("USDC".to_string(), amount)]
            .into_iter()
            .collect()
    };
    let mut accounts: Vec<AccountSpec> = DEPOSITORS
        .iter()
        .map(|name| AccountSpec { name: name.to_string(), balances: funded(1_000_000) })
        .collect();
    accounts.push(AccountSpec { name: TRADER.to_string(), balances: funded(100_000_000) });

    let mut script = Vec::with_capacity(steps);
    for _ in 0..steps {
        let account = DEPOSITORS[rng.gen_range(0..DEPOSITORS.len())].to_string();
        let pool = POOL.to_string();
        let direction = random_direction(rng);
        let level = discretize(rng.gen_range(-1_200..1_200), TICK_SPACING);
        let step = match rng.gen_range(0..10) {
            0..=3 => Step::Place {
                account,
                pool,
                tick: rng.gen_range(-1_200..1_200),
                amount: rng.gen_range(1..50_000),
                direction,
            },
            4..=6 => Step::Swap {
                account: TRADER.to_string(),
                pool,
                direction,
                amount: rng.gen_range(1..400_000),
            },
            7 => Step::Cancel { account, pool, level, direction },
            8 => Step::CancelReceipts {
                account,
                pool,
                level,
                direction,
                receipts: rng.gen_range(1..10_000),
            },
            _ => Step::Redeem {
                account,
                pool,
                level,
                direction,
                receipts: None,
                destination: None,
            },
        };
        script.push(step);
    }

    Scenario {
        engine: EngineConfig::default(),
        pools,
        accounts,
        steps: script,
    }
}

/// Summary of one fuzz run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzOutcome {
    pub run: u64,
    pub seed: u64,
    pub scenario_hash: String,
    pub applied: usize,
    pub rejected: usize,
    pub fills: usize,
    pub violations: Vec<String>,
}

impl FuzzOutcome {
    fn from_report(run: u64, seed: u64, report: &SimReport) -> Self {
        Self {
            run,
            seed,
            scenario_hash: report.scenario_hash.clone(),
            applied: report.applied(),
            rejected: report.rejected(),
            fills: report.fills.len(),
            violations: report
                .violations()
                .map(|(step, v)| format!("step {step}: {v}"))
                .collect(),
        }
    }
}

/// Generate and run `runs` scenarios of `steps` steps each, in parallel.
/// Results are ordered by run index.
pub fn run_batch(master_seed: u64, runs: u64, steps: usize) -> Result<Vec<FuzzOutcome>, SimError> {
    let seeds = SeedHierarchy::new(master_seed);
    (0..runs)
        .into_par_iter()
        .map(|run| {
            let mut rng = seeds.rng_for(run);
            let scenario = generate_scenario(&mut rng, steps);
            let report = run_scenario(&scenario)?;
            Ok(FuzzOutcome::from_report(run, seeds.sub_seed(run), &report))
        })
        .collect()
}
