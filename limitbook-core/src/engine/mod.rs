//! Limit order engine — resting orders on an AMM pool, filled as the price
//! crosses their level.
//!
//! Per operation the engine:
//!
//! 1. Places and cancels deposits against the order book, issuing receipts 1:1
//! 2. After every external swap, sweeps the opposite side of the book for
//!    crossed levels and fills each with a swap of its own
//! 3. Credits fill proceeds to the claim ledger, redeemable pro rata

pub mod api;
pub mod claims;
pub mod fill_engine;
pub mod levels;
pub mod order_book;
pub mod swap_executor;

pub use api::LimitOrderEngine;
pub use claims::{ClaimLedger, Redemption};
pub use fill_engine::SweepReport;
pub use levels::{discretize, LevelRange, LevelTracker, MAX_TICK, MIN_TICK};
pub use order_book::OrderBook;
pub use swap_executor::SwapExecutor;
