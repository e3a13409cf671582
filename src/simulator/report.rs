//! Simulation output

use serde::Serialize;

use crate::fixed::{Rate, Weight};

/// One executed auction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStep {
    /// Position of the auction in the input list
    pub auction: usize,
    pub sell: String,
    pub buy: String,
    /// Basket fraction moved from `sell` to `buy`
    pub weight_moved: Weight,
    pub value_usd: f64,
    /// Fair rate the auction's price range was checked against
    pub rate: Rate,
}

/// Final basket plus the order auctions were executed in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub basket: Vec<Weight>,
    pub steps: Vec<SimulationStep>,
}

impl SimulationReport {
    /// Total USD moved across all steps
    pub fn volume_usd(&self) -> f64 {
        self.steps.iter().map(|s| s.value_usd).sum()
    }

    /// Auction indices in execution order
    pub fn order(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.auction).collect()
    }
}
