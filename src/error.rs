//! Errors raised by the rebalancing engine
//!
//! Every failure is an input problem: the computations are deterministic,
//! so nothing here is retried.

use alloy_primitives::U256;
use thiserror::Error;

/// Which edge of an auction's price range was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBound {
    /// Rate is above `start`
    Start,
    /// Rate is below `end`
    End,
}

impl std::fmt::Display for PriceBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceBound::Start => write!(f, "start"),
            PriceBound::End => write!(f, "end"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RebalanceError {
    /// A spot price was exactly zero, every ratio divides by it
    #[error("a price is zero ({token})")]
    ZeroPrice { token: String },

    /// Total USD value of the basket (or the fund) is zero
    #[error("basket has zero total value")]
    EmptyBasket,

    /// Simulated fair rate falls outside an auction's committed range
    #[error("price {rate} out of range [{start}, {end}] for {sell} -> {buy} ({bound} bound violated)")]
    PriceOutOfRange {
        sell: String,
        buy: String,
        rate: U256,
        start: U256,
        end: U256,
        bound: PriceBound,
    },

    /// Parallel input arrays disagree on length
    #[error("dimension mismatch: {field} has {actual} entries, expected {expected}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown token {0}")]
    UnknownToken(String),

    #[error("invalid {what}: {value}")]
    InvalidInput { what: &'static str, value: String },

    #[error("arithmetic error: {0}")]
    Arithmetic(&'static str),
}

pub type Result<T> = std::result::Result<T, RebalanceError>;

/// Fail with `DimensionMismatch` unless `actual == expected`
pub(crate) fn ensure_len(field: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RebalanceError::DimensionMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len("prices", 3, 3).is_ok());
        assert_eq!(
            ensure_len("prices", 3, 2),
            Err(RebalanceError::DimensionMismatch {
                field: "prices",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_price_out_of_range_message() {
        let err = RebalanceError::PriceOutOfRange {
            sell: "USDC".to_string(),
            buy: "DAI".to_string(),
            rate: U256::from(100u64),
            start: U256::from(99u64),
            end: U256::from(90u64),
            bound: PriceBound::Start,
        };
        let msg = err.to_string();
        assert!(msg.contains("price 100 out of range [99, 90]"));
        assert!(msg.contains("start bound"));
    }
}
