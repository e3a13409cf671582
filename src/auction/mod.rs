//! Dutch Auctions
//!
//! Responsible for:
//! - The auction record shared by planning, refining, validation and simulation
//! - Validating an auction's price range against spot prices (`check`)
//! - Planning auctions from current/target baskets (`planner`)
//! - Tightening an auction right before it opens (`refiner`)

mod check;
mod planner;
mod refiner;

pub use check::{check_auction, check_auction_with, AuctionRule, FairPriceRule, LimitOrderRule};
pub use planner::{
    classify, get_auctions, parse_tolerances, AuctionPlanner, Imbalance, Side,
    DEFAULT_PRICE_SPREAD,
};
pub use refiner::{open_auction, AuctionRefiner};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fixed::{mul_div, narrow, saturate, Rate, Rounding, ShareRatio, Weight};

/// Acceptable tokens-per-share band for one side of a trade
///
/// All values D27{tok/share}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPair {
    /// Expected ratio once the auction has run
    pub spot: ShareRatio,
    pub low: ShareRatio,
    pub high: ShareRatio,
}

impl LimitPair {
    pub fn new(spot: ShareRatio, low: ShareRatio, high: ShareRatio) -> Self {
        Self { spot, low, high }
    }

    /// Band of zero width around `spot`
    pub fn collapsed(spot: ShareRatio) -> Self {
        Self {
            spot,
            low: spot,
            high: spot,
        }
    }

    /// `spot * (1 - band)` to `spot * (1 + band)`, band a D18 fraction
    ///
    /// `low` stops at zero and `high` at 1e54.
    pub fn banded(spot: ShareRatio, band: Weight) -> Result<Self> {
        let one = Weight::scale();
        let band = band.widen();

        let low = mul_div(spot.widen(), one.saturating_sub(band), one, Rounding::Floor)?;
        let high = mul_div(spot.widen(), one + band, one, Rounding::Ceil)?;

        Ok(Self {
            spot,
            low: ShareRatio::from_raw(narrow(low)?),
            high: ShareRatio::from_raw(saturate(high)),
        })
    }

    /// `low <= spot <= high`
    pub fn is_ordered(&self) -> bool {
        self.low <= self.spot && self.spot <= self.high
    }
}

/// Exchange-rate schedule, D27{buyTok/sellTok}
///
/// The rate starts at `start` and decays to `end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub start: Rate,
    pub end: Rate,
}

impl PriceRange {
    pub fn new(start: Rate, end: Rate) -> Self {
        Self { start, end }
    }

    pub fn is_decreasing(&self) -> bool {
        self.end <= self.start
    }

    /// `end <= rate <= start`
    pub fn contains(&self, rate: Rate) -> bool {
        self.end <= rate && rate <= self.start
    }

    /// `{0, 0}`: no automatic price constraint
    pub fn is_unconstrained(&self) -> bool {
        self.start.is_zero() && self.end.is_zero()
    }
}

/// A single sell/buy auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub sell: String,
    pub buy: String,
    pub sell_limit: LimitPair,
    pub buy_limit: LimitPair,
    pub prices: PriceRange,
}

impl Auction {
    /// Auction whose limit bands are collapsed onto their spot ratios
    pub fn from_spots(
        sell: &str,
        buy: &str,
        sell_spot: ShareRatio,
        buy_spot: ShareRatio,
        start: Rate,
        end: Rate,
    ) -> Self {
        Self {
            sell: sell.to_string(),
            buy: buy.to_string(),
            sell_limit: LimitPair::collapsed(sell_spot),
            buy_limit: LimitPair::collapsed(buy_spot),
            prices: PriceRange::new(start, end),
        }
    }

    /// Auction whose limit bands sit `band` either side of their spots
    pub fn from_banded_spots(
        sell: &str,
        buy: &str,
        sell_spot: ShareRatio,
        buy_spot: ShareRatio,
        start: Rate,
        end: Rate,
        band: Weight,
    ) -> Result<Self> {
        Ok(Self {
            sell: sell.to_string(),
            buy: buy.to_string(),
            sell_limit: LimitPair::banded(sell_spot, band)?,
            buy_limit: LimitPair::banded(buy_spot, band)?,
            prices: PriceRange::new(start, end),
        })
    }

    /// "SELL -> BUY"
    pub fn pair(&self) -> String {
        format!("{} -> {}", self.sell, self.buy)
    }
}

impl std::fmt::Display for Auction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | sell spot {} [{}, {}] | buy spot {} [{}, {}] | price [{}, {}]",
            self.pair(),
            self.sell_limit.spot,
            self.sell_limit.low,
            self.sell_limit.high,
            self.buy_limit.spot,
            self.buy_limit.low,
            self.buy_limit.high,
            self.prices.start,
            self.prices.end
        )
    }
}
