//! Sequential fill model
//!
//! Every remaining auction is valued at `min(sell surplus, buy deficit)`
//! against its spot targets. The smallest strictly positive one fills first
//! (lowest index on ties); when none is positive, the first remaining auction
//! is consumed without moving anything. The basket is held at D36 until the
//! end so repeated updates do not accumulate rounding.

use alloy_primitives::U256;
use tracing::{debug, info, trace};

use super::report::{SimulationReport, SimulationStep};
use crate::auction::Auction;
use crate::basket::Fund;
use crate::error::{ensure_len, PriceBound, RebalanceError, Result};
use crate::fixed::{Precise, Weight};
use crate::tokens::TokenSet;

/// An auction resolved against the token set
struct Pending<'a> {
    index: usize,
    auction: &'a Auction,
    sell: usize,
    buy: usize,
    sell_target: Precise,
    buy_target: Precise,
}

impl Pending<'_> {
    /// Basket fraction this auction would move right now
    fn fill(&self, basket: &[Precise]) -> Precise {
        let surplus = basket[self.sell].saturating_sub(self.sell_target);
        let deficit = self.buy_target.saturating_sub(basket[self.buy]);
        surplus.min(deficit)
    }
}

pub struct RebalanceSimulator<'a> {
    set: &'a TokenSet,
    fund: Fund,
}

impl<'a> RebalanceSimulator<'a> {
    pub fn new(set: &'a TokenSet, fund: Fund) -> Self {
        Self { set, fund }
    }

    pub fn run(&self, auctions: &[Auction], current: &[Weight]) -> Result<SimulationReport> {
        ensure_len("current basket", self.set.len(), current.len())?;
        self.fund.ensure_value()?;

        let fund_usd = self.fund.value_usd();
        let mut basket: Vec<Precise> = current.iter().map(|&w| Precise::from_weight(w)).collect();
        let mut remaining = auctions
            .iter()
            .enumerate()
            .map(|(index, auction)| self.resolve(index, auction))
            .collect::<Result<Vec<_>>>()?;

        let mut steps = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let mut selected = 0;
            let mut smallest: Option<Precise> = None;

            for (pos, pending) in remaining.iter().enumerate() {
                let value = pending.fill(&basket);
                trace!(
                    "Auction {} ({}) would move {:.6} (${:.2})",
                    pending.index,
                    pending.auction.pair(),
                    value.to_f64(),
                    value.to_f64() * fund_usd
                );
                if !value.is_zero() && smallest.map_or(true, |s| value < s) {
                    smallest = Some(value);
                    selected = pos;
                }
            }

            let pending = remaining.remove(selected);
            let moved = smallest.unwrap_or(Precise::ZERO);
            let rate = self.set.fair_rate(pending.sell, pending.buy)?;
            let prices = pending.auction.prices;

            let bound = if rate > prices.start {
                Some(PriceBound::Start)
            } else if rate < prices.end {
                Some(PriceBound::End)
            } else {
                None
            };
            if let Some(bound) = bound {
                return Err(RebalanceError::PriceOutOfRange {
                    sell: pending.auction.sell.clone(),
                    buy: pending.auction.buy.clone(),
                    rate: rate.raw(),
                    start: prices.start.raw(),
                    end: prices.end.raw(),
                    bound,
                });
            }

            basket[pending.sell] = basket[pending.sell].saturating_sub(moved);
            basket[pending.buy] = basket[pending.buy].checked_add(moved)?;

            let step = SimulationStep {
                auction: pending.index,
                sell: pending.auction.sell.clone(),
                buy: pending.auction.buy.clone(),
                weight_moved: moved.to_weight()?,
                value_usd: moved.to_f64() * fund_usd,
                rate,
            };
            debug!(
                "Filled auction {} ({}): {:.6} of basket, ${:.2} at rate {}",
                step.auction,
                pending.auction.pair(),
                step.weight_moved.to_f64(),
                step.value_usd,
                rate
            );
            steps.push(step);
        }

        let basket = basket
            .into_iter()
            .map(Precise::to_weight)
            .collect::<Result<Vec<_>>>()?;

        info!("Simulated {} auctions", steps.len());
        Ok(SimulationReport { basket, steps })
    }

    fn resolve<'b>(&self, index: usize, auction: &'b Auction) -> Result<Pending<'b>> {
        let sell = self.set.index_of(&auction.sell)?;
        let buy = self.set.index_of(&auction.buy)?;
        let share_price = self.fund.share_price;

        Ok(Pending {
            index,
            auction,
            sell,
            buy,
            sell_target: self.set.ratio_to_weight(sell, auction.sell_limit.spot, share_price)?,
            buy_target: self.set.ratio_to_weight(buy, auction.buy_limit.spot, share_price)?,
        })
    }
}

/// Run every auction and report the execution order
pub fn simulate<S: AsRef<str>>(
    supply: U256,
    auctions: &[Auction],
    tokens: &[S],
    decimals: &[u8],
    current_basket: &[Weight],
    prices: &[f64],
    dtf_price: f64,
) -> Result<SimulationReport> {
    let set = TokenSet::new(tokens, decimals, prices)?;
    let fund = Fund::new(supply, dtf_price)?;
    RebalanceSimulator::new(&set, fund).run(auctions, current_basket)
}

/// Basket once every auction has filled at fair value
pub fn get_basket<S: AsRef<str>>(
    supply: U256,
    auctions: &[Auction],
    tokens: &[S],
    decimals: &[u8],
    current_basket: &[Weight],
    prices: &[f64],
    dtf_price: f64,
) -> Result<Vec<Weight>> {
    simulate(supply, auctions, tokens, decimals, current_basket, prices, dtf_price)
        .map(|report| report.basket)
}
