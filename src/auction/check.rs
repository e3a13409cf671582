//! Auction Validator
//!
//! A predicate, not a failure: `check_auction` answers whether an auction's
//! price schedule is consistent with current fair value. Bad inputs (unknown
//! token, zero price, mismatched arrays) simply fail the check.
//!
//! The default verdict only looks at the price range. Stricter policies are
//! separate `AuctionRule`s passed to `check_auction_with`.

use tracing::debug;

use super::Auction;
use crate::error::Result;
use crate::fixed::Rate;
use crate::tokens::TokenSet;

/// One acceptance condition evaluated against the pair's fair rate
pub trait AuctionRule {
    fn name(&self) -> &'static str;

    fn accepts(&self, auction: &Auction, fair_rate: Rate) -> bool;
}

/// `start >= fair` and `end <= start`
///
/// An auction must not open below spot value, and its rate only decays.
#[derive(Debug, Clone, Copy, Default)]
pub struct FairPriceRule;

impl AuctionRule for FairPriceRule {
    fn name(&self) -> &'static str {
        "fair-price"
    }

    fn accepts(&self, auction: &Auction, fair_rate: Rate) -> bool {
        auction.prices.start >= fair_rate && auction.prices.is_decreasing()
    }
}

/// `low <= spot <= high` on both limit pairs (opt-in)
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitOrderRule;

impl AuctionRule for LimitOrderRule {
    fn name(&self) -> &'static str {
        "limit-order"
    }

    fn accepts(&self, auction: &Auction, _fair_rate: Rate) -> bool {
        auction.sell_limit.is_ordered() && auction.buy_limit.is_ordered()
    }
}

/// Default validation: the fair-price rule only
pub fn check_auction<S: AsRef<str>>(
    auction: &Auction,
    tokens: &[S],
    decimals: &[u8],
    prices: &[f64],
) -> bool {
    check_auction_with(auction, tokens, decimals, prices, &[&FairPriceRule])
}

/// Validate against an explicit rule list (all must accept)
pub fn check_auction_with<S: AsRef<str>>(
    auction: &Auction,
    tokens: &[S],
    decimals: &[u8],
    prices: &[f64],
    rules: &[&dyn AuctionRule],
) -> bool {
    let fair_rate = match fair_rate_for(auction, tokens, decimals, prices) {
        Ok(rate) => rate,
        Err(e) => {
            debug!("Auction {} rejected: {}", auction.pair(), e);
            return false;
        }
    };

    rules.iter().all(|rule| {
        let accepted = rule.accepts(auction, fair_rate);
        if !accepted {
            debug!(
                "Auction {} failed {} (fair {}, range [{}, {}])",
                auction.pair(),
                rule.name(),
                fair_rate,
                auction.prices.start,
                auction.prices.end
            );
        }
        accepted
    })
}

fn fair_rate_for<S: AsRef<str>>(
    auction: &Auction,
    tokens: &[S],
    decimals: &[u8],
    prices: &[f64],
) -> Result<Rate> {
    let set = TokenSet::new(tokens, decimals, prices)?;
    let sell = set.index_of(&auction.sell)?;
    let buy = set.index_of(&auction.buy)?;
    set.fair_rate(sell, buy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::LimitPair;
    use crate::fixed::{parse_amount, ShareRatio};
    use alloy_primitives::U256;

    fn trade(start: U256, end: U256) -> Auction {
        Auction {
            sell: "USDC".to_string(),
            buy: "DAI".to_string(),
            sell_limit: LimitPair::default(),
            buy_limit: LimitPair::collapsed(ShareRatio::parse_raw("1e54").unwrap()),
            prices: crate::auction::PriceRange::new(Rate::from_raw(start), Rate::from_raw(end)),
        }
    }

    fn call(start: U256, end: U256) -> bool {
        check_auction(&trade(start, end), &["USDC", "DAI"], &[6, 18], &[1.0, 1.0])
    }

    fn n(text: &str) -> U256 {
        parse_amount(text).unwrap()
    }

    #[test]
    fn test_boundary_cases() {
        let one = U256::from(1u64);

        assert!(call(n("1e39"), n("1e39")));
        assert!(call(n("1e39"), n("0")));
        assert!(call(n("1e54"), n("1e39")));
        assert!(call(n("1e40"), n("1e38")));
        assert!(call(n("1e39") + one, n("1e38")));
        assert!(call(n("1e39"), n("1e38") - one));

        assert!(!call(n("1e39") - one, n("1e39")));
        assert!(!call(n("1e39"), n("1e39") + one));
        assert!(!call(n("1e38"), n("1e38")));
        assert!(!call(n("1e27"), n("1e27")));
        assert!(!call(n("1e15"), n("1e15")));
    }

    #[test]
    fn test_bad_inputs_fail_the_check() {
        let auction = trade(n("1e39"), n("1e39"));
        assert!(!check_auction(&auction, &["USDC", "DAI"], &[6, 18], &[0.0, 1.0]));
        assert!(!check_auction(&auction, &["USDC", "DAI"], &[6], &[1.0, 1.0]));
        assert!(!check_auction(&auction, &["USDC", "USDT"], &[6, 6], &[1.0, 1.0]));
    }

    #[test]
    fn test_limit_rule_is_opt_in() {
        // buy limit is collapsed and ordered, sell limit is default (ordered)
        let mut auction = trade(n("1e39"), n("1e39"));
        assert!(check_auction_with(
            &auction,
            &["USDC", "DAI"],
            &[6, 18],
            &[1.0, 1.0],
            &[&FairPriceRule, &LimitOrderRule]
        ));

        auction.sell_limit.spot = ShareRatio::parse_raw("5").unwrap();
        assert!(check_auction(&auction, &["USDC", "DAI"], &[6, 18], &[1.0, 1.0]));
        assert!(!check_auction_with(
            &auction,
            &["USDC", "DAI"],
            &[6, 18],
            &[1.0, 1.0],
            &[&FairPriceRule, &LimitOrderRule]
        ));
    }
}
