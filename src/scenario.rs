//! Rebalance Scenarios
//!
//! A scenario describes one fund at one point in time: share supply, tokens
//! with prices and balances (or current weights), targets and tolerances,
//! and optionally a set of open auctions. Stored as TOML or JSON.
//!
//! ```toml
//! supply = "1e21"
//! share_price = 1.0
//!
//! [[tokens]]
//! symbol = "USDC"
//! price = 1.0
//! balance = "1000e6"
//! target = 0.0
//!
//! [[tokens]]
//! symbol = "DAI"
//! price = 1.0
//! balance = "0"
//! target = 1.0
//! ```

use alloy_primitives::U256;
use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::auction::Auction;
use crate::basket::{current_basket, share_value, Fund};
use crate::error::{RebalanceError, Result};
use crate::fixed::{amount, parse_amount, UsdPrice, Weight};
use crate::tokens::{known_decimals, parse_price, TokenSet};

fn default_tolerance() -> f64 {
    0.01
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub symbol: String,

    /// Falls back to the well-known token table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,

    /// USD per whole token
    pub price: f64,

    /// Raw balance, e.g. `"1000e6"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,

    /// Current weight when balances are not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    pub target: f64,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw share supply (D18 shares)
    #[serde(with = "amount")]
    pub supply: U256,

    /// USD per whole share; derived from balances when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_price: Option<f64>,

    pub tokens: Vec<TokenEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auctions: Vec<Auction>,
}

impl Scenario {
    /// Load a scenario, JSON for `.json` files and TOML otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> EyreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading scenario {}", path.display()))?;

        let scenario: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .wrap_err_with(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content)
                .wrap_err_with(|| format!("parsing {}", path.display()))?,
        };

        scenario.validate()?;
        Ok(scenario)
    }

    /// Save as TOML (or JSON for `.json` paths)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> EyreResult<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self)?,
        };
        fs::write(path, content)?;
        Ok(())
    }

    /// Label for logs and the run log
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.tokens
                .iter()
                .map(|t| t.symbol.as_str())
                .collect::<Vec<_>>()
                .join("/")
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(RebalanceError::InvalidInput {
                what: "scenario",
                value: "no tokens".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for token in &self.tokens {
            if !seen.insert(token.symbol.as_str()) {
                return Err(RebalanceError::InvalidInput {
                    what: "duplicate token",
                    value: token.symbol.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn symbols(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.symbol.clone()).collect()
    }

    pub fn decimals(&self) -> Result<Vec<u8>> {
        self.tokens
            .iter()
            .map(|t| {
                t.decimals
                    .or_else(|| known_decimals(&t.symbol))
                    .ok_or_else(|| RebalanceError::InvalidInput {
                        what: "token decimals (not a well-known token)",
                        value: t.symbol.clone(),
                    })
            })
            .collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.tokens.iter().map(|t| t.price).collect()
    }

    pub fn tolerances(&self) -> Vec<f64> {
        self.tokens.iter().map(|t| t.tolerance).collect()
    }

    pub fn target_basket(&self) -> Result<Vec<Weight>> {
        self.tokens.iter().map(|t| Weight::from_f64(t.target)).collect()
    }

    /// Raw balances, if every token has one
    pub fn balances(&self) -> Result<Option<Vec<U256>>> {
        let given = self.tokens.iter().filter(|t| t.balance.is_some()).count();
        if given == 0 {
            return Ok(None);
        }
        if given != self.tokens.len() {
            return Err(RebalanceError::InvalidInput {
                what: "balances",
                value: format!("{} of {} tokens have one", given, self.tokens.len()),
            });
        }

        self.tokens
            .iter()
            .map(|t| parse_amount(t.balance.as_deref().unwrap_or("0")))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Current weights from balances, or the explicit `weight` fields
    pub fn current_basket(&self) -> Result<Vec<Weight>> {
        if let Some(balances) = self.balances()? {
            return current_basket(&balances, &self.decimals()?, &self.prices());
        }

        self.tokens
            .iter()
            .map(|t| {
                t.weight
                    .ok_or_else(|| RebalanceError::InvalidInput {
                        what: "current weight (no balances given)",
                        value: t.symbol.clone(),
                    })
                    .and_then(Weight::from_f64)
            })
            .collect()
    }

    /// Explicit share price, or the exact one implied by balances and supply
    pub fn share_price(&self) -> Result<UsdPrice> {
        if let Some(price) = self.share_price {
            return parse_price("share", price);
        }

        match self.balances()? {
            Some(balances) => {
                let valuation = share_value(self.supply, &balances, &self.decimals()?, &self.prices())?;
                Ok(valuation.share_price)
            }
            None => Err(RebalanceError::InvalidInput {
                what: "share price",
                value: "neither share_price nor balances given".to_string(),
            }),
        }
    }

    pub fn token_set(&self) -> Result<TokenSet> {
        TokenSet::new(&self.symbols(), &self.decimals()?, &self.prices())
    }

    pub fn fund(&self) -> Result<Fund> {
        Ok(Fund {
            supply: self.supply,
            share_price: self.share_price()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPLIT: &str = r#"
name = "split"
supply = "1e21"
share_price = 1.0

[[tokens]]
symbol = "USDC"
price = 1.0
weight = 1.0
target = 0.0

[[tokens]]
symbol = "DAI"
price = 1.0
weight = 0.0
target = 0.5

[[tokens]]
symbol = "USDT"
price = 1.0
weight = 0.0
target = 0.5
"#;

    #[test]
    fn test_parse_toml_scenario() {
        let scenario: Scenario = toml::from_str(SPLIT).unwrap();
        scenario.validate().unwrap();

        assert_eq!(scenario.label(), "split");
        assert_eq!(scenario.supply, parse_amount("1e21").unwrap());
        assert_eq!(scenario.decimals().unwrap(), vec![6, 18, 6]);
        assert_eq!(scenario.tolerances(), vec![0.01, 0.01, 0.01]);
        assert_eq!(
            scenario.current_basket().unwrap(),
            vec![Weight::one(), Weight::ZERO, Weight::ZERO]
        );
        assert_eq!(scenario.target_basket().unwrap()[1], Weight::parse("0.5").unwrap());
        assert!(scenario.auctions.is_empty());
    }

    #[test]
    fn test_parse_json_with_auctions() {
        let json = r#"{
            "supply": "1e21",
            "tokens": [
                { "symbol": "USDC", "price": 1.0, "balance": "250e6", "target": 0.75 },
                { "symbol": "WETH", "price": 3000.0, "balance": "0.25e18", "target": 0.25 }
            ],
            "auctions": [{
                "sell": "WETH",
                "buy": "USDC",
                "sellLimit": { "spot": "8.33e22", "low": "8.33e22", "high": "8.33e22" },
                "buyLimit": { "spot": "750e12", "low": "750e12", "high": "750e12" },
                "prices": { "start": "3.03e18", "end": "2.97e18" }
            }]
        }"#;

        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.label(), "USDC/WETH");
        assert_eq!(scenario.auctions.len(), 1);
        assert_eq!(scenario.auctions[0].pair(), "WETH -> USDC");

        let basket = scenario.current_basket().unwrap();
        assert_eq!(basket[0], Weight::parse("0.25").unwrap());
        assert_eq!(basket[1], Weight::parse("0.75").unwrap());

        // $1000 over 1000 shares
        assert_eq!(scenario.share_price().unwrap(), UsdPrice::parse("1").unwrap());
    }

    #[test]
    fn test_scenario_errors() {
        let mut scenario: Scenario = toml::from_str(SPLIT).unwrap();

        scenario.tokens[0].symbol = "MYSTERY".to_string();
        assert!(matches!(
            scenario.decimals(),
            Err(RebalanceError::InvalidInput { .. })
        ));

        scenario.tokens[0].symbol = "DAI".to_string();
        assert!(scenario.validate().is_err());

        let mut scenario: Scenario = toml::from_str(SPLIT).unwrap();
        scenario.tokens[0].balance = Some("1000e6".to_string());
        assert!(scenario.balances().is_err());

        scenario.tokens[0].balance = None;
        scenario.tokens[1].weight = None;
        assert!(scenario.current_basket().is_err());

        scenario.share_price = None;
        assert!(scenario.share_price().is_err());
    }

    #[test]
    fn test_derived_share_price_stays_exact() {
        let json = r#"{
            "supply": "3e18",
            "tokens": [
                { "symbol": "DAI", "price": 1.0, "balance": "1e18", "target": 1.0 }
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();

        // $1 over 3 shares, all 27 digits kept
        let third = UsdPrice::from_raw(parse_amount("333333333333333333333333333").unwrap());
        assert_eq!(scenario.share_price().unwrap(), third);

        let fund = scenario.fund().unwrap();
        assert_eq!(fund.share_price, third);
        assert_eq!(fund.supply, parse_amount("3e18").unwrap());
    }

    #[test]
    fn test_file_round_trip() {
        let scenario: Scenario = toml::from_str(SPLIT).unwrap();
        let path = std::env::temp_dir().join(format!("dtf-scenario-{}.json", std::process::id()));

        scenario.save_to_file(&path).unwrap();
        let loaded = Scenario::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, scenario);
    }

    #[test]
    fn test_bundled_scenarios() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");

        let split = Scenario::from_file(dir.join("split.toml")).unwrap();
        assert_eq!(split.current_basket().unwrap()[0], Weight::one());
        assert_eq!(split.fund().unwrap().supply, parse_amount("1e21").unwrap());

        let volatile = Scenario::from_file(dir.join("volatile.toml")).unwrap();
        assert_eq!(volatile.auctions.len(), 1);
        assert_eq!(volatile.share_price().unwrap(), UsdPrice::parse("1").unwrap());

        let defer = Scenario::from_file(dir.join("defer.json")).unwrap();
        assert_eq!(defer.tolerances(), vec![1.0, 1.0]);
        assert_eq!(defer.token_set().unwrap().len(), 2);
    }
}
