//! Scenario files — pools, funded accounts, and a scripted sequence of steps.
//!
//! ```toml
//! [engine]
//! account = "hook"
//!
//! [[pools]]
//! name = "eth-usdc"
//! asset0 = "ETH"
//! asset1 = "USDC"
//! fee_pips = 3000
//! tick_spacing = 60
//! reserve0 = 1000000
//! reserve1 = 1000000
//!
//! [[accounts]]
//! name = "alice"
//! balances = { ETH = 5000 }
//!
//! [[steps]]
//! action = "place"
//! account = "alice"
//! pool = "eth-usdc"
//! tick = 60
//! amount = 5000
//! direction = "zero_for_one"
//! ```
//!
//! Amounts are `u64` in the file (TOML integers are 64-bit) and widened to
//! the engine's `u128` on use.

use limitbook_core::domain::Direction;
use limitbook_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse scenario TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// A complete, self-contained simulation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub engine: EngineConfig,
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSpec {
    /// Name steps use to refer to the pool.
    pub name: String,
    pub asset0: String,
    pub asset1: String,
    #[serde(default)]
    pub fee_pips: u32,
    pub tick_spacing: i32,
    pub reserve0: u64,
    pub reserve1: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSpec {
    pub name: String,
    /// Starting balance per asset.
    #[serde(default)]
    pub balances: BTreeMap<String, u64>,
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Rest an order at the level containing `tick`.
    Place {
        account: String,
        pool: String,
        tick: i32,
        amount: u64,
        direction: Direction,
    },
    /// External trader swap, followed by the engine's sweep.
    Swap {
        account: String,
        pool: String,
        direction: Direction,
        amount: u64,
    },
    /// Cancel the account's whole receipt balance for an order.
    Cancel {
        account: String,
        pool: String,
        level: i32,
        direction: Direction,
    },
    /// Cancel part of the account's receipts for an order.
    CancelReceipts {
        account: String,
        pool: String,
        level: i32,
        direction: Direction,
        receipts: u64,
    },
    /// Redeem receipts for fill proceeds (all held receipts when `receipts` is absent).
    Redeem {
        account: String,
        pool: String,
        level: i32,
        direction: Direction,
        #[serde(default)]
        receipts: Option<u64>,
        #[serde(default)]
        destination: Option<String>,
    },
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::Place { .. } => "place",
            Step::Swap { .. } => "swap",
            Step::Cancel { .. } => "cancel",
            Step::CancelReceipts { .. } => "cancel_receipts",
            Step::Redeem { .. } => "redeem",
        }
    }

    pub fn account(&self) -> &str {
        match self {
            Step::Place { account, .. }
            | Step::Swap { account, .. }
            | Step::Cancel { account, .. }
            | Step::CancelReceipts { account, .. }
            | Step::Redeem { account, .. } => account,
        }
    }

    pub fn pool(&self) -> &str {
        match self {
            Step::Place { pool, .. }
            | Step::Swap { pool, .. }
            | Step::Cancel { pool, .. }
            | Step::CancelReceipts { pool, .. }
            | Step::Redeem { pool, .. } => pool,
        }
    }
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Structural checks only. Whether a step succeeds is decided by the engine
    /// at run time.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.engine
            .validate()
            .map_err(|e| ScenarioError::Invalid(e.to_string()))?;
        if self.pools.is_empty() {
            return Err(ScenarioError::Invalid("at least one pool is required".into()));
        }

        let mut pool_names = HashSet::new();
        for pool in &self.pools {
            if !pool_names.insert(pool.name.as_str()) {
                return Err(ScenarioError::Invalid(format!("duplicate pool '{}'", pool.name)));
            }
            if pool.reserve0 == 0 || pool.reserve1 == 0 {
                return Err(ScenarioError::Invalid(format!(
                    "pool '{}' needs non-zero reserves",
                    pool.name
                )));
            }
        }

        let mut account_names = HashSet::new();
        for account in &self.accounts {
            if !account_names.insert(account.name.as_str()) {
                return Err(ScenarioError::Invalid(format!(
                    "duplicate account '{}'",
                    account.name
                )));
            }
        }

        for (i, step) in self.steps.iter().enumerate() {
            if !pool_names.contains(step.pool()) {
                return Err(ScenarioError::Invalid(format!(
                    "step {i} ({}) references unknown pool '{}'",
                    step.action(),
                    step.pool()
                )));
            }
        }
        Ok(())
    }

    /// Deterministic content hash (BLAKE3 of the canonical JSON form).
    pub fn hash(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
