//! Token definitions and the per-call market snapshot
//!
//! A `TokenSet` binds each basket position to its symbol, decimal precision
//! and USD spot price. Positions are aligned by index with every basket it
//! is used with. Prices are supplied per call and never cached.

use alloy_primitives::{U256, U512};

use crate::error::{ensure_len, RebalanceError, Result};
use crate::fixed::{
    div_round, mul_div, narrow, parse_f64, pow10, saturate, scaled_to_f64, widen, Precise, Rate, Rounding,
    ShareRatio, UsdPrice, Weight, MAX_TOKEN_DECIMALS, PRECISE_DECIMALS,
};

/// One basket position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub decimals: u8,
    /// D27{USD/wholeTok}
    pub price: UsdPrice,
}

impl Token {
    pub fn new(symbol: &str, decimals: u8, price: f64) -> Result<Self> {
        if decimals > MAX_TOKEN_DECIMALS {
            return Err(RebalanceError::InvalidInput {
                what: "token decimals",
                value: format!("{} ({})", decimals, symbol),
            });
        }

        Ok(Self {
            symbol: symbol.to_string(),
            decimals,
            price: parse_price(symbol, price)?,
        })
    }

    /// {tok/wholeTok}
    fn unit(&self) -> U512 {
        pow10(self.decimals as u32)
    }
}

/// Parse a USD price into D27, rejecting zero
pub fn parse_price(label: &str, price: f64) -> Result<UsdPrice> {
    if price == 0.0 {
        return Err(RebalanceError::ZeroPrice {
            token: label.to_string(),
        });
    }

    let raw = parse_f64(price, 27, "price")?;
    if raw.is_zero() {
        return Err(RebalanceError::InvalidInput {
            what: "price below 1e-27",
            value: format!("{} ({})", price, label),
        });
    }

    Ok(UsdPrice::from_raw(raw))
}

// ============================================
// TOKEN SET
// ============================================

/// Validated tokens, decimals and prices for a single call
#[derive(Debug, Clone)]
pub struct TokenSet {
    tokens: Vec<Token>,
}

impl TokenSet {
    /// Fails on length mismatch, zero prices or unsupported decimals
    pub fn new<S: AsRef<str>>(symbols: &[S], decimals: &[u8], prices: &[f64]) -> Result<Self> {
        ensure_len("decimals", symbols.len(), decimals.len())?;
        ensure_len("prices", symbols.len(), prices.len())?;

        let tokens = symbols
            .iter()
            .zip(decimals)
            .zip(prices)
            .map(|((symbol, &decimals), &price)| Token::new(symbol.as_ref(), decimals, price))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn symbol(&self, index: usize) -> &str {
        self.tokens.get(index).map(|t| t.symbol.as_str()).unwrap_or("?")
    }

    /// Position of a symbol (first match)
    pub fn index_of(&self, symbol: &str) -> Result<usize> {
        self.tokens
            .iter()
            .position(|t| t.symbol == symbol)
            .ok_or_else(|| RebalanceError::UnknownToken(symbol.to_string()))
    }

    fn token(&self, index: usize) -> Result<&Token> {
        self.tokens
            .get(index)
            .ok_or_else(|| RebalanceError::UnknownToken(format!("#{}", index)))
    }

    /// Decimal-adjusted fair exchange rate from spot prices
    ///
    /// D27{buyTok/sellTok} = {USD/wholeSellTok} / {USD/wholeBuyTok} * D27
    ///     * {buyTok/wholeBuyTok} / {sellTok/wholeSellTok}
    pub fn fair_rate(&self, sell: usize, buy: usize) -> Result<Rate> {
        let sell = self.token(sell)?;
        let buy = self.token(buy)?;

        let rate = mul_div(
            sell.price.widen(),
            pow10(27) * buy.unit(),
            buy.price.widen() * sell.unit(),
            Rounding::Nearest,
        )?;

        narrow(rate).map(Rate::from_raw)
    }

    /// Basket weight of one token expressed as tokens per share
    ///
    /// D27{tok/share} = D18{1} * {USD/wholeShare} / {USD/wholeTok}
    ///     * {tok/wholeTok} / {share/wholeShare} * D27 / D18
    ///
    /// Clamped at 1e54.
    pub fn weight_to_ratio(
        &self,
        index: usize,
        weight: Weight,
        share_price: UsdPrice,
        rounding: Rounding,
    ) -> Result<ShareRatio> {
        let token = self.token(index)?;

        let ratio = mul_div(
            weight.widen() * share_price.widen(),
            token.unit(),
            token.price.widen() * pow10(9),
            rounding,
        )?;

        Ok(ShareRatio::from_raw(saturate(ratio)))
    }

    /// Inverse of `weight_to_ratio`, at D36
    pub fn ratio_to_weight(
        &self,
        index: usize,
        ratio: ShareRatio,
        share_price: UsdPrice,
    ) -> Result<Precise> {
        let token = self.token(index)?;

        let weight = mul_div(
            ratio.widen() * token.price.widen(),
            pow10(PRECISE_DECIMALS - 9),
            share_price.widen() * token.unit(),
            Rounding::Nearest,
        )?;

        Ok(Precise::from_raw(weight))
    }

    /// USD value of a raw balance, scaled by 10^(27 + 36)
    ///
    /// Exact for any supported precision, so values compare without rounding.
    pub fn scaled_value(&self, index: usize, balance: U256) -> Result<U512> {
        let token = self.token(index)?;
        let shift = pow10(MAX_TOKEN_DECIMALS as u32 - token.decimals as u32);

        widen(balance)
            .checked_mul(token.price.widen())
            .and_then(|v| v.checked_mul(shift))
            .ok_or(RebalanceError::Arithmetic("token value overflow"))
    }

    /// Whole-unit USD value of a raw balance, for display
    pub fn value_usd(&self, index: usize, balance: U256) -> Result<f64> {
        let scaled = self.scaled_value(index, balance)?;
        let cents = div_round(scaled, pow10(27 + 36 - 2), Rounding::Nearest)?;
        Ok(scaled_to_f64(&cents.to_string(), 2))
    }
}

// ============================================
// WELL-KNOWN TOKENS
// ============================================

/// Tokens whose precision can be assumed when a scenario omits it
pub const KNOWN_TOKENS: &[(&str, u8)] = &[
    ("WETH", 18),
    ("USDC", 6),
    ("USDT", 6),
    ("DAI", 18),
    ("WBTC", 8),
    ("cbBTC", 8),
    ("USDS", 18),
    ("sUSDS", 18),
    ("wstETH", 18),
    ("stETH", 18),
    ("pyUSD", 6),
    ("crvUSD", 18),
    ("GHO", 18),
    ("LINK", 18),
    ("UNI", 18),
    ("AAVE", 18),
    ("MKR", 18),
    ("LDO", 18),
];

/// Precision of a well-known symbol (case-insensitive)
pub fn known_decimals(symbol: &str) -> Option<u8> {
    KNOWN_TOKENS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(symbol))
        .map(|&(_, decimals)| decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::parse_amount;

    fn stables() -> TokenSet {
        TokenSet::new(&["USDC", "DAI", "USDT"], &[6, 18, 6], &[1.0, 1.0, 1.0]).unwrap()
    }

    #[test]
    fn test_token_set_validation() {
        assert!(matches!(
            TokenSet::new(&["USDC", "DAI"], &[6], &[1.0, 1.0]),
            Err(RebalanceError::DimensionMismatch { field: "decimals", .. })
        ));
        assert!(matches!(
            TokenSet::new(&["USDC", "DAI"], &[6, 18], &[1.0]),
            Err(RebalanceError::DimensionMismatch { field: "prices", .. })
        ));
        assert!(matches!(
            TokenSet::new(&["USDC", "DAI"], &[6, 18], &[0.0, 1.0]),
            Err(RebalanceError::ZeroPrice { .. })
        ));
        assert!(matches!(
            TokenSet::new(&["X"], &[37], &[1.0]),
            Err(RebalanceError::InvalidInput { .. })
        ));

        // tiny but non-zero is fine
        assert!(TokenSet::new(&["A", "B", "C"], &[18, 18, 18], &[0.000000000001, 1.0, 2.0]).is_ok());
    }

    #[test]
    fn test_fair_rate_decimal_adjusted() {
        let set = stables();
        assert_eq!(set.fair_rate(0, 1).unwrap().raw(), parse_amount("1e39").unwrap());
        assert_eq!(set.fair_rate(1, 0).unwrap().raw(), parse_amount("1e15").unwrap());
        assert_eq!(set.fair_rate(0, 2).unwrap().raw(), parse_amount("1e27").unwrap());

        let volatile = TokenSet::new(&["USDC", "WETH"], &[6, 18], &[1.0, 3000.0]).unwrap();
        assert_eq!(volatile.fair_rate(1, 0).unwrap().raw(), parse_amount("3e18").unwrap());
    }

    #[test]
    fn test_weight_ratio_conversions() {
        let set = stables();
        let half = Weight::parse("0.5").unwrap();
        let one = UsdPrice::one();

        let dai = set.weight_to_ratio(1, half, one, Rounding::Nearest).unwrap();
        assert_eq!(dai.raw(), parse_amount("5e26").unwrap());

        let usdc = set.weight_to_ratio(0, half, one, Rounding::Nearest).unwrap();
        assert_eq!(usdc.raw(), parse_amount("5e14").unwrap());

        let back = set.ratio_to_weight(0, usdc, one).unwrap();
        assert_eq!(back.to_weight().unwrap(), half);
    }

    #[test]
    fn test_weight_to_ratio_saturates() {
        let set = TokenSet::new(&["DUST"], &[36], &[0.000000001]).unwrap();
        let ratio = set
            .weight_to_ratio(0, Weight::one(), UsdPrice::parse("1000000000").unwrap(), Rounding::Ceil)
            .unwrap();
        assert_eq!(ratio.raw(), crate::fixed::max_limit());
    }

    #[test]
    fn test_value_usd() {
        let set = TokenSet::new(&["USDC", "WETH"], &[6, 18], &[1.0, 3000.0]).unwrap();
        assert_eq!(set.value_usd(0, parse_amount("2500e6").unwrap()).unwrap(), 2500.0);
        assert_eq!(set.value_usd(1, parse_amount("0.5e18").unwrap()).unwrap(), 1500.0);
    }

    #[test]
    fn test_known_decimals() {
        assert_eq!(known_decimals("USDC"), Some(6));
        assert_eq!(known_decimals("weth"), Some(18));
        assert_eq!(known_decimals("WBTC"), Some(8));
        assert_eq!(known_decimals("NOPE"), None);
    }

    #[test]
    fn test_index_of() {
        let set = stables();
        assert_eq!(set.index_of("USDT").unwrap(), 2);
        assert_eq!(
            set.index_of("WETH"),
            Err(RebalanceError::UnknownToken("WETH".to_string()))
        );
    }
}
