//! Rebalance Simulator
//!
//! Responsible for:
//! - Predicting the basket once a set of auctions has filled at fair value
//! - Ordering fills smallest-value first
//! - Rejecting auctions whose price range excludes the fair rate

mod rebalance;
mod report;

pub use rebalance::{get_basket, simulate, RebalanceSimulator};
pub use report::{SimulationReport, SimulationStep};
