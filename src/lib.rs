//! DTF Rebalance - Basket Rebalancing Auction Engine
//!
//! Plans, refines, validates and simulates the Dutch auctions that move a
//! multi-asset fund from its current basket to a target basket.
//!
//! Pipeline:
//! 1. `current_basket`: balances and prices to D18 weights
//! 2. `get_auctions`: surplus/deficit tokens paired into auctions
//! 3. `open_auction`: one auction refreshed right before it opens
//! 4. `check_auction`: price range against the fair rate
//! 5. `get_basket`: predicted basket once every auction fills
//!
//! All operations are pure and deterministic over their inputs.

pub mod auction;
pub mod basket;
pub mod config;
pub mod error;
pub mod fixed;
pub mod scenario;
pub mod simulator;
pub mod tokens;

pub use auction::{
    check_auction, check_auction_with, get_auctions, open_auction, Auction, AuctionPlanner,
    AuctionRefiner, AuctionRule, LimitPair, PriceRange,
};
pub use basket::{current_basket, share_value, Fund, FundValuation};
pub use error::{PriceBound, RebalanceError, Result};
pub use fixed::{Precise, Rate, Rounding, ShareRatio, UsdPrice, Weight};
pub use simulator::{get_basket, simulate, SimulationReport, SimulationStep};
pub use tokens::{Token, TokenSet};
