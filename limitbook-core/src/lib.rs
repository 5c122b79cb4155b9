//! Limitbook Core — limit orders resting on a constant-function AMM pool.
//!
//! This crate contains:
//! - Domain types (pool keys, order keys, immutable order records, fills)
//! - Price discretization and per-pool last-observed level
//! - Order book of pending input per (pool, level, direction)
//! - Fill sweep run after every external swap, with restart after each fill
//! - Proportional claim ledger for fill proceeds
//! - Host traits for the venue, the receipt ledger, and the asset ledger,
//!   plus an in-memory host

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod host;

pub use config::{ConfigError, EngineConfig};
pub use engine::{discretize, LimitOrderEngine, SweepReport};
pub use error::{EngineError, ValidationError};
pub use host::{Host, HostError, MemoryHost};
