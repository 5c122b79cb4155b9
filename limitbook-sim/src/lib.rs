//! Limitbook Sim — scripted and randomized runs of the limit order engine.
//!
//! This crate builds on `limitbook-core` to provide:
//! - TOML scenario files (pools, funded accounts, scripted steps)
//! - A runner that drives the engine against the in-memory host
//! - An invariant auditor run after every step
//! - JSON report and CSV fill tape export
//! - Seeded random traffic with parallel batch runs

pub mod export;
pub mod invariants;
pub mod random;
pub mod report;
pub mod runner;
pub mod scenario;

pub use export::{export_fills_csv, export_json, import_json, save_artifacts};
pub use invariants::{audit, Violation, ViolationKind};
pub use random::{generate_scenario, run_batch, FuzzOutcome, SeedHierarchy};
pub use report::{SimReport, StepOutcome, StepStatus};
pub use runner::{run_scenario, SimError, Simulation};
pub use scenario::{Scenario, ScenarioError, Step};
