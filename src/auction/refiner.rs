//! Auction Refiner
//!
//! Recomputes one auction's limits and price range from fresh targets and
//! prices right before it opens. Uses the same construction as the planner,
//! with its own spread.

use alloy_primitives::U256;
use tracing::{debug, warn};

use super::planner::{parse_tolerances, AuctionPlanner};
use super::Auction;
use crate::basket::Fund;
use crate::error::{ensure_len, Result};
use crate::fixed::Weight;
use crate::tokens::TokenSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuctionRefiner {
    planner: AuctionPlanner,
}

impl AuctionRefiner {
    pub fn new(price_spread: f64) -> Result<Self> {
        Ok(Self {
            planner: AuctionPlanner::new(price_spread)?,
        })
    }

    pub fn price_spread(&self) -> Weight {
        self.planner.price_spread()
    }

    /// Refresh an auction from raw inputs (array arguments aligned by index)
    #[allow(clippy::too_many_arguments)]
    pub fn open_auction<S: AsRef<str>>(
        &self,
        auction: &Auction,
        supply: U256,
        tokens: &[S],
        decimals: &[u8],
        target_basket: &[Weight],
        prices: &[f64],
        error_tolerances: &[f64],
        dtf_price: f64,
    ) -> Result<Auction> {
        let set = TokenSet::new(tokens, decimals, prices)?;
        ensure_len("error tolerances", set.len(), error_tolerances.len())?;
        let tolerances = parse_tolerances(error_tolerances)?;
        let fund = Fund::new(supply, dtf_price)?;

        self.refine(auction, &set, &fund, target_basket, &tolerances)
    }

    /// Same pair, limits and prices rebuilt from current data
    pub fn refine(
        &self,
        auction: &Auction,
        set: &TokenSet,
        fund: &Fund,
        target: &[Weight],
        tolerances: &[Weight],
    ) -> Result<Auction> {
        ensure_len("target basket", set.len(), target.len())?;
        ensure_len("error tolerances", set.len(), tolerances.len())?;
        fund.ensure_value()?;

        let sell = set.index_of(&auction.sell)?;
        let buy = set.index_of(&auction.buy)?;

        let refined = self
            .planner
            .build_auction(set, fund, sell, buy, target, tolerances)?;

        let provisional = auction.prices;
        let fresh = refined.prices;
        if !provisional.is_unconstrained()
            && !(provisional.contains(fresh.start) && provisional.contains(fresh.end))
        {
            warn!(
                "Auction {} drifted since planning: [{}, {}] -> [{}, {}]",
                auction.pair(),
                provisional.start,
                provisional.end,
                fresh.start,
                fresh.end
            );
        }

        debug!("Opened {}", refined);
        Ok(refined)
    }
}

/// Refresh an auction with the default 1% spread
#[allow(clippy::too_many_arguments)]
pub fn open_auction<S: AsRef<str>>(
    auction: &Auction,
    supply: U256,
    tokens: &[S],
    decimals: &[u8],
    target_basket: &[Weight],
    prices: &[f64],
    error_tolerances: &[f64],
    dtf_price: f64,
) -> Result<Auction> {
    AuctionRefiner::default().open_auction(
        auction,
        supply,
        tokens,
        decimals,
        target_basket,
        prices,
        error_tolerances,
        dtf_price,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RebalanceError;
    use crate::fixed::{parse_amount, Rate, ShareRatio};

    fn w(values: &[&str]) -> Vec<Weight> {
        values.iter().map(|v| Weight::parse(v).unwrap()).collect()
    }

    fn assert_approx(actual: U256, expected: &str) {
        let expected = parse_amount(expected).unwrap();
        let delta = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            delta <= expected / U256::from(1000u64),
            "{} not within 0.1% of {}",
            actual,
            expected
        );
    }

    fn provisional(sell: &str, buy: &str) -> Auction {
        Auction::from_spots(
            sell,
            buy,
            ShareRatio::ZERO,
            ShareRatio::parse_raw("1e54").unwrap(),
            Rate::parse_raw("1e54").unwrap(),
            Rate::ZERO,
        )
    }

    /// Provisional auction with 1% limit bands, as planned earlier
    fn planned(sell: &str, buy: &str, spots: [&str; 2], prices: [&str; 2]) -> Auction {
        Auction::from_banded_spots(
            sell,
            buy,
            ShareRatio::parse_raw(spots[0]).unwrap(),
            ShareRatio::parse_raw(spots[1]).unwrap(),
            Rate::parse_raw(prices[0]).unwrap(),
            Rate::parse_raw(prices[1]).unwrap(),
            Weight::parse("0.01").unwrap(),
        )
        .unwrap()
    }

    /// [sellSpot, buySpot, start, end]
    fn opened(auction: &Auction) -> [U256; 4] {
        [
            auction.sell_limit.spot.raw(),
            auction.buy_limit.spot.raw(),
            auction.prices.start.raw(),
            auction.prices.end.raw(),
        ]
    }

    #[test]
    fn test_open_full_target() {
        let auction = open_auction(
            &planned("USDC", "DAI", ["0", "1e27"], ["1.02e39", "0.98e39"]),
            parse_amount("1e21").unwrap(),
            &["USDC", "DAI"],
            &[6, 18],
            &w(&["0", "1"]),
            &[1.0, 1.0],
            &[0.01, 0.01],
            1.0,
        )
        .unwrap();

        let [sell, buy, start, end] = opened(&auction);
        assert_eq!(sell, U256::ZERO);
        assert_approx(buy, "1e27");
        assert_approx(start, "1.01e39");
        assert_approx(end, "0.99e39");
    }

    #[test]
    fn test_open_half_target() {
        let auction = open_auction(
            &planned("USDC", "DAI", ["5e14", "5e26"], ["1.02e39", "0.98e39"]),
            parse_amount("1e21").unwrap(),
            &["USDC", "DAI"],
            &[6, 18],
            &w(&["0.5", "0.5"]),
            &[1.0, 1.0],
            &[0.01, 0.01],
            1.0,
        )
        .unwrap();

        let [sell, buy, start, end] = opened(&auction);
        assert_approx(sell, "5e14");
        assert_approx(buy, "5e26");
        assert_approx(start, "1.01e39");
        assert_approx(end, "0.99e39");
    }

    #[test]
    fn test_open_volatile_pair() {
        let auction = open_auction(
            &planned("WETH", "USDC", ["1.666e23", "5e14"], ["3.04e18", "2.96e18"]),
            parse_amount("1e21").unwrap(),
            &["WETH", "USDC"],
            &[18, 6],
            &w(&["0.5", "0.5"]),
            &[3000.0, 1.0],
            &[0.01, 0.01],
            1.0,
        )
        .unwrap();

        let [sell, buy, start, end] = opened(&auction);
        assert_approx(sell, "1.666e23");
        assert_approx(buy, "5e14");
        assert_approx(start, "3.03e18");
        assert_approx(end, "2.97e18");
    }

    #[test]
    fn test_open_keeps_pair_and_tightens() {
        let wide = provisional("USDC", "DAI");
        let refiner = AuctionRefiner::new(0.005).unwrap();
        let auction = refiner
            .open_auction(
                &wide,
                parse_amount("1e21").unwrap(),
                &["USDC", "DAI"],
                &[6, 18],
                &w(&["0", "1"]),
                &[1.0, 1.0],
                &[0.01, 0.01],
                1.0,
            )
            .unwrap();

        assert_eq!(auction.pair(), wide.pair());
        assert!(wide.prices.contains(auction.prices.start));
        assert!(wide.prices.contains(auction.prices.end));
        assert_eq!(auction.prices.start.raw(), parse_amount("1.005e39").unwrap());
        assert_eq!(auction.prices.end.raw(), parse_amount("0.995e39").unwrap());
    }

    #[test]
    fn test_open_unknown_token() {
        let result = open_auction(
            &provisional("USDC", "WETH"),
            parse_amount("1e21").unwrap(),
            &["USDC", "DAI"],
            &[6, 18],
            &w(&["0", "1"]),
            &[1.0, 1.0],
            &[0.01, 0.01],
            1.0,
        );
        assert_eq!(result, Err(RebalanceError::UnknownToken("WETH".to_string())));
    }
}
