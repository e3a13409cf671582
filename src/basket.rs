//! Basket Calculator
//!
//! Turns raw balances and USD spot prices into D18 basket weights.
//! The weights always sum to exactly 1e18: each entry is floored and the
//! leftover units go to the largest remainders (ties to the lower index).

use alloy_primitives::{U256, U512};
use tracing::debug;

use crate::error::{ensure_len, RebalanceError, Result};
use crate::fixed::{mul_div, narrow, pow10, scaled_to_f64, widen, Rounding, UsdPrice, Weight};
use crate::tokens::{parse_price, TokenSet};

/// Share supply and share price, as seen by auction math
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fund {
    /// {share}
    pub supply: U256,

    /// D27{USD/wholeShare}
    pub share_price: UsdPrice,
}

impl Fund {
    /// Fails with `ZeroPrice` when the share price is zero
    pub fn new(supply: U256, share_price: f64) -> Result<Self> {
        Ok(Self {
            supply,
            share_price: parse_price("share", share_price)?,
        })
    }

    /// `EmptyBasket` unless the fund holds value
    pub fn ensure_value(&self) -> Result<()> {
        if self.supply.is_zero() || self.share_price.is_zero() {
            return Err(RebalanceError::EmptyBasket);
        }
        Ok(())
    }

    /// Total USD value of all shares, for display
    pub fn value_usd(&self) -> f64 {
        scaled_to_f64(&self.supply.to_string(), 18) * self.share_price.to_f64()
    }
}

/// Fund valuation derived from balances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundValuation {
    /// Total basket value in USD (display precision)
    pub total_usd: f64,

    /// D27{USD/wholeShare}
    pub share_price: UsdPrice,
}

/// Current basket weights from raw balances
///
/// Fails with `ZeroPrice` on a zero price and `EmptyBasket` when every
/// balance is zero.
pub fn current_basket(balances: &[U256], decimals: &[u8], prices: &[f64]) -> Result<Vec<Weight>> {
    let set = unnamed_set(balances.len(), decimals, prices)?;
    let values = scaled_values(&set, balances)?;
    let basket = basket_from_values(&values)?;

    debug!(
        "Current basket: [{}]",
        basket
            .iter()
            .map(|w| format!("{:.4}", w.to_f64()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(basket)
}

/// Per-share USD price implied by balances and supply
pub fn share_value(
    supply: U256,
    balances: &[U256],
    decimals: &[u8],
    prices: &[f64],
) -> Result<FundValuation> {
    let set = unnamed_set(balances.len(), decimals, prices)?;
    let values = scaled_values(&set, balances)?;
    let total = sum(&values)?;

    if total.is_zero() || supply.is_zero() {
        return Err(RebalanceError::EmptyBasket);
    }

    // values carry 10^(27 + 36); D27{USD/wholeShare} = total * D18 / supply / 10^36
    let share_price = mul_div(
        total,
        pow10(18),
        widen(supply) * pow10(36),
        Rounding::Nearest,
    )?;

    let total_usd = balances
        .iter()
        .enumerate()
        .map(|(i, &balance)| set.value_usd(i, balance))
        .sum::<Result<f64>>()?;

    Ok(FundValuation {
        total_usd,
        share_price: UsdPrice::from_raw(narrow(share_price)?),
    })
}

/// Normalize exact values into weights summing to 1e18
pub fn basket_from_values(values: &[U512]) -> Result<Vec<Weight>> {
    let total = sum(values)?;
    if total.is_zero() {
        return Err(RebalanceError::EmptyBasket);
    }

    let one = Weight::scale();
    let mut floors = Vec::with_capacity(values.len());
    let mut remainders = Vec::with_capacity(values.len());

    for (i, value) in values.iter().enumerate() {
        let scaled = value
            .checked_mul(one)
            .ok_or(RebalanceError::Arithmetic("basket value overflow"))?;
        floors.push(scaled / total);
        remainders.push((scaled % total, i));
    }

    // largest remainder first, lower index on ties
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let assigned = sum(&floors)?;
    let mut missing = one.saturating_sub(assigned);
    for &(_, i) in &remainders {
        if missing.is_zero() {
            break;
        }
        floors[i] += U512::from(1u64);
        missing -= U512::from(1u64);
    }

    floors
        .into_iter()
        .map(|raw| narrow(raw).map(Weight::from_raw))
        .collect()
}

fn unnamed_set(len: usize, decimals: &[u8], prices: &[f64]) -> Result<TokenSet> {
    ensure_len("decimals", len, decimals.len())?;
    let symbols: Vec<String> = (0..len).map(|i| format!("token #{}", i)).collect();
    TokenSet::new(&symbols, decimals, prices)
}

fn scaled_values(set: &TokenSet, balances: &[U256]) -> Result<Vec<U512>> {
    balances
        .iter()
        .enumerate()
        .map(|(i, &balance)| set.scaled_value(i, balance))
        .collect()
}

fn sum(values: &[U512]) -> Result<U512> {
    values.iter().try_fold(U512::ZERO, |acc, v| {
        acc.checked_add(*v)
            .ok_or(RebalanceError::Arithmetic("basket total overflow"))
    })
}
