//! Auction Planner
//!
//! Splits a basket into surplus and deficit tokens and pairs them into
//! sell/buy auctions. Each auction's limits describe where the basket should
//! land; its price range brackets the fair exchange rate by a spread.

use alloy_primitives::U256;
use tracing::{debug, info};

use super::{Auction, LimitPair, PriceRange};
use crate::basket::Fund;
use crate::error::{ensure_len, RebalanceError, Result};
use crate::fixed::{max_limit, mul_div, narrow, parse_f64, Rate, Rounding, ShareRatio, Weight};
use crate::tokens::TokenSet;

/// Planner spread around the fair rate (1%)
pub const DEFAULT_PRICE_SPREAD: f64 = 0.01;

/// Which side of an auction a token is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Sell,
    Buy,
}

/// Distance of a token from its target, beyond tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imbalance {
    /// Over target by this much
    Surplus(Weight),
    /// Under target by this much
    Deficit(Weight),
    Balanced,
}

/// Classify a token by absolute weight distance
///
/// A tolerance of exactly 1 defers to the curator: any difference counts.
pub fn classify(current: Weight, target: Weight, tolerance: Weight) -> Imbalance {
    let defer = is_defer(tolerance);

    if current > target {
        let excess = current.raw() - target.raw();
        if defer || excess > tolerance.raw() {
            return Imbalance::Surplus(Weight::from_raw(excess));
        }
    } else if target > current {
        let shortfall = target.raw() - current.raw();
        if defer || shortfall > tolerance.raw() {
            return Imbalance::Deficit(Weight::from_raw(shortfall));
        }
    }

    Imbalance::Balanced
}

fn is_defer(tolerance: Weight) -> bool {
    tolerance == Weight::one()
}

/// Parse per-token tolerances, each within `[0, 1]`
pub fn parse_tolerances(tolerances: &[f64]) -> Result<Vec<Weight>> {
    tolerances
        .iter()
        .map(|&tol| {
            let raw = parse_f64(tol, 18, "error tolerance")?;
            if raw > Weight::one().raw() {
                return Err(RebalanceError::InvalidInput {
                    what: "error tolerance",
                    value: tol.to_string(),
                });
            }
            Ok(Weight::from_raw(raw))
        })
        .collect()
}

/// Parse a price spread within `[0, 1)`
pub(crate) fn parse_spread(spread: f64) -> Result<Weight> {
    let raw = parse_f64(spread, 18, "price spread")?;
    if raw >= Weight::one().raw() {
        return Err(RebalanceError::InvalidInput {
            what: "price spread",
            value: spread.to_string(),
        });
    }
    Ok(Weight::from_raw(raw))
}

// ============================================
// PLANNER
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionPlanner {
    /// D18 fraction of the fair rate
    price_spread: Weight,
}

impl Default for AuctionPlanner {
    fn default() -> Self {
        Self {
            price_spread: Weight::from_raw(U256::from(10_000_000_000_000_000u64)),
        }
    }
}

impl AuctionPlanner {
    pub fn new(price_spread: f64) -> Result<Self> {
        Ok(Self {
            price_spread: parse_spread(price_spread)?,
        })
    }

    pub fn price_spread(&self) -> Weight {
        self.price_spread
    }

    /// Plan auctions from raw inputs (array arguments aligned by index)
    #[allow(clippy::too_many_arguments)]
    pub fn get_auctions<S: AsRef<str>>(
        &self,
        supply: U256,
        tokens: &[S],
        decimals: &[u8],
        current_basket: &[Weight],
        target_basket: &[Weight],
        prices: &[f64],
        error_tolerances: &[f64],
        dtf_price: f64,
    ) -> Result<Vec<Auction>> {
        let set = TokenSet::new(tokens, decimals, prices)?;
        ensure_len("error tolerances", set.len(), error_tolerances.len())?;
        let tolerances = parse_tolerances(error_tolerances)?;
        let fund = Fund::new(supply, dtf_price)?;

        self.plan(&set, &fund, current_basket, target_basket, &tolerances)
    }

    /// Pair every surplus token with every deficit token, sell side outermost
    ///
    /// Auctions only carry targets, so fills run each pair as far as it goes.
    /// With every pair present, whatever surplus is left can still reach
    /// whatever deficit is left.
    pub fn plan(
        &self,
        set: &TokenSet,
        fund: &Fund,
        current: &[Weight],
        target: &[Weight],
        tolerances: &[Weight],
    ) -> Result<Vec<Auction>> {
        ensure_len("current basket", set.len(), current.len())?;
        ensure_len("target basket", set.len(), target.len())?;
        ensure_len("error tolerances", set.len(), tolerances.len())?;
        fund.ensure_value()?;

        let mut surplus = Vec::new();
        let mut deficit = Vec::new();

        for i in 0..set.len() {
            match classify(current[i], target[i], tolerances[i]) {
                Imbalance::Surplus(excess) => surplus.push((i, excess)),
                Imbalance::Deficit(shortfall) => deficit.push((i, shortfall)),
                Imbalance::Balanced => {
                    debug!("{} within tolerance of target", set.symbol(i));
                }
            }
        }

        debug!(
            "{} surplus and {} deficit tokens",
            surplus.len(),
            deficit.len()
        );

        let mut auctions = Vec::with_capacity(surplus.len() * deficit.len());

        for &(sell, excess) in &surplus {
            for &(buy, shortfall) in &deficit {
                let auction = self.build_auction(set, fund, sell, buy, target, tolerances)?;
                debug!(
                    "Auction {}: up to {:.4} of basket | {}",
                    auctions.len(),
                    excess.min(shortfall).to_f64(),
                    auction
                );
                auctions.push(auction);
            }
        }

        info!("Planned {} auctions over {} tokens", auctions.len(), set.len());
        Ok(auctions)
    }

    /// Limits and price range for one sell/buy pair
    pub fn build_auction(
        &self,
        set: &TokenSet,
        fund: &Fund,
        sell: usize,
        buy: usize,
        target: &[Weight],
        tolerances: &[Weight],
    ) -> Result<Auction> {
        let sell_limit = self.limit_pair(set, fund, sell, Side::Sell, target[sell], tolerances[sell])?;
        let buy_limit = self.limit_pair(set, fund, buy, Side::Buy, target[buy], tolerances[buy])?;

        let defer = is_defer(tolerances[sell]) || is_defer(tolerances[buy]);
        let prices = if defer {
            PriceRange::default()
        } else {
            self.price_range(set.fair_rate(sell, buy)?)?
        };

        Ok(Auction {
            sell: set.symbol(sell).to_string(),
            buy: set.symbol(buy).to_string(),
            sell_limit,
            buy_limit,
            prices,
        })
    }

    /// Tokens-per-share band for one token
    ///
    /// Deferred tokens get an open band so the curator can pick any amount.
    pub fn limit_pair(
        &self,
        set: &TokenSet,
        fund: &Fund,
        index: usize,
        side: Side,
        target: Weight,
        tolerance: Weight,
    ) -> Result<LimitPair> {
        let ratio = |weight: U256, rounding| {
            set.weight_to_ratio(index, Weight::from_raw(weight), fund.share_price, rounding)
        };

        let spot = ratio(target.raw(), Rounding::Nearest)?;

        if is_defer(tolerance) {
            let max = ShareRatio::from_raw(max_limit());
            return Ok(match side {
                Side::Sell => LimitPair::new(spot, ShareRatio::ZERO, max),
                Side::Buy => {
                    let floor = ShareRatio::from_raw(U256::from(1u64));
                    LimitPair::new(spot.max(floor), floor, max)
                }
            });
        }

        let low = ratio(target.raw().saturating_sub(tolerance.raw()), Rounding::Floor)?;
        let high = ratio(target.raw() + tolerance.raw(), Rounding::Ceil)?;

        Ok(LimitPair::new(spot, low, high))
    }

    /// `fair * (1 + spread)` down to `fair * (1 - spread)`
    pub fn price_range(&self, fair_rate: Rate) -> Result<PriceRange> {
        let one = Weight::scale();
        let spread = self.price_spread.widen();

        let start = mul_div(fair_rate.widen(), one + spread, one, Rounding::Ceil)?;
        let end = mul_div(fair_rate.widen(), one - spread, one, Rounding::Floor)?;

        Ok(PriceRange::new(
            Rate::from_raw(narrow(start)?),
            Rate::from_raw(narrow(end)?),
        ))
    }
}

/// Plan auctions with the default 1% spread
#[allow(clippy::too_many_arguments)]
pub fn get_auctions<S: AsRef<str>>(
    supply: U256,
    tokens: &[S],
    decimals: &[u8],
    current_basket: &[Weight],
    target_basket: &[Weight],
    prices: &[f64],
    error_tolerances: &[f64],
    dtf_price: f64,
) -> Result<Vec<Auction>> {
    AuctionPlanner::default().get_auctions(
        supply,
        tokens,
        decimals,
        current_basket,
        target_basket,
        prices,
        error_tolerances,
        dtf_price,
    )
}
