//! DTF Rebalance - Command Line Driver
//!
//! Run with: cargo run -- plan scenarios/split.toml

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dtf_rebalance::auction::{check_auction_with, AuctionRule, FairPriceRule, LimitOrderRule};
use dtf_rebalance::config::{Config, OutputFormat, RunLog};
use dtf_rebalance::scenario::Scenario;
use dtf_rebalance::simulator::RebalanceSimulator;
use dtf_rebalance::{Auction, AuctionPlanner, AuctionRefiner, SimulationReport, Weight};

#[derive(Parser, Debug)]
#[command(name = "dtf-rebalance")]
#[command(about = "Plan, open, check and simulate basket rebalancing auctions")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to environment / .env)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Print the configuration summary before running
    #[arg(long, global = true)]
    show_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Current basket from balances and prices
    Basket { scenario: PathBuf },

    /// Auctions that move the current basket to the target
    Plan { scenario: PathBuf },

    /// Refresh every scenario auction with current targets and prices
    Open { scenario: PathBuf },

    /// Validate every scenario auction against spot prices
    Check {
        scenario: PathBuf,

        /// Also require low <= spot <= high on both limits
        #[arg(long)]
        strict: bool,
    },

    /// Predicted basket once all auctions fill (planned when none are given)
    Simulate { scenario: PathBuf },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Basket { .. } => "basket",
            Command::Plan { .. } => "plan",
            Command::Open { .. } => "open",
            Command::Check { .. } => "check",
            Command::Simulate { .. } => "simulate",
        }
    }

    fn scenario(&self) -> &Path {
        match self {
            Command::Basket { scenario }
            | Command::Plan { scenario }
            | Command::Open { scenario }
            | Command::Check { scenario, .. }
            | Command::Simulate { scenario } => scenario,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if cli.json {
        config.output_format = OutputFormat::Json;
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_directive.parse()?),
        )
        .init();

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file or --config");
        return Err(e);
    }

    if cli.show_config {
        config.print_summary();
        println!();
    }

    let path = cli.command.scenario();
    let scenario = Scenario::from_file(path)?;
    info!("Loaded scenario {} ({} tokens)", scenario.label(), scenario.tokens.len());

    let (auctions, basket) = match &cli.command {
        Command::Basket { .. } => run_basket(&config, &scenario)?,
        Command::Plan { .. } => run_plan(&config, &scenario)?,
        Command::Open { .. } => run_open(&config, &scenario)?,
        Command::Check { strict, .. } => run_check(&config, &scenario, *strict)?,
        Command::Simulate { .. } => run_simulate(&config, &scenario)?,
    };

    if let Some(log_path) = &config.run_log_path {
        RunLog::new(cli.command.name(), &scenario.label(), auctions, basket)
            .append_to_file(log_path)?;
    }

    Ok(())
}

// ============================================
// COMMANDS
// ============================================

/// (auction count, resulting basket) for the run log
type Outcome = (usize, Vec<Weight>);

#[derive(Serialize)]
struct BasketRow<'a> {
    symbol: &'a str,
    current: Weight,
    target: Weight,
}

fn run_basket(config: &Config, scenario: &Scenario) -> Result<Outcome> {
    let current = scenario.current_basket()?;
    let target = scenario.target_basket()?;

    let rows: Vec<BasketRow> = scenario
        .tokens
        .iter()
        .zip(current.iter().zip(&target))
        .map(|(token, (&current, &target))| BasketRow {
            symbol: &token.symbol,
            current,
            target,
        })
        .collect();

    match config.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => {
            print_header(&format!("BASKET: {}", scenario.label()));
            println!("  {:<10} {:>12} {:>12} {:>12}", "TOKEN", "CURRENT", "TARGET", "DRIFT");
            for row in &rows {
                let drift = row.current.to_f64() - row.target.to_f64();
                let drift = if drift.abs() < 1e-9 {
                    style(format!("{:>11.4}%", 0.0)).dim()
                } else if drift > 0.0 {
                    style(format!("{:>+11.4}%", drift * 100.0)).red()
                } else {
                    style(format!("{:>+11.4}%", drift * 100.0)).green()
                };
                println!(
                    "  {:<10} {:>11.4}% {:>11.4}% {}",
                    row.symbol,
                    row.current.to_f64() * 100.0,
                    row.target.to_f64() * 100.0,
                    drift
                );
            }
        }
    }

    Ok((0, current))
}

fn run_plan(config: &Config, scenario: &Scenario) -> Result<Outcome> {
    let auctions = plan(config, scenario)?;

    match config.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&auctions)?),
        OutputFormat::Table => {
            print_header(&format!("PLAN: {}", scenario.label()));
            print_auctions(&auctions);
        }
    }

    Ok((auctions.len(), scenario.target_basket()?))
}

fn run_open(config: &Config, scenario: &Scenario) -> Result<Outcome> {
    let refiner = AuctionRefiner::new(config.open_price_spread)?;
    let set = scenario.token_set()?;
    let fund = scenario.fund()?;
    let target = scenario.target_basket()?;
    let tolerances = dtf_rebalance::auction::parse_tolerances(&scenario.tolerances())?;

    let opened = scenario
        .auctions
        .iter()
        .map(|auction| refiner.refine(auction, &set, &fund, &target, &tolerances))
        .collect::<dtf_rebalance::Result<Vec<_>>>()?;

    match config.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&opened)?),
        OutputFormat::Table => {
            print_header(&format!("OPEN: {}", scenario.label()));
            if opened.is_empty() {
                println!("  {}", style("Scenario has no auctions to open").yellow());
            } else {
                print_auctions(&opened);
            }
        }
    }

    Ok((opened.len(), target))
}

#[derive(Serialize)]
struct Verdict<'a> {
    auction: usize,
    pair: String,
    valid: bool,
    #[serde(skip)]
    source: &'a Auction,
}

fn run_check(config: &Config, scenario: &Scenario, strict: bool) -> Result<Outcome> {
    let symbols = scenario.symbols();
    let decimals = scenario.decimals()?;
    let prices = scenario.prices();

    let rules: Vec<&dyn AuctionRule> = if strict {
        vec![&FairPriceRule as &dyn AuctionRule, &LimitOrderRule]
    } else {
        vec![&FairPriceRule as &dyn AuctionRule]
    };

    let verdicts: Vec<Verdict> = scenario
        .auctions
        .iter()
        .enumerate()
        .map(|(i, auction)| Verdict {
            auction: i,
            pair: auction.pair(),
            valid: check_auction_with(auction, &symbols, &decimals, &prices, &rules),
            source: auction,
        })
        .collect();

    match config.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&verdicts)?),
        OutputFormat::Table => {
            print_header(&format!("CHECK: {}", scenario.label()));
            for verdict in &verdicts {
                let mark = if verdict.valid {
                    style("✓ valid").green()
                } else {
                    style("✗ invalid").red().bold()
                };
                println!(
                    "  #{:<3} {:<20} {} (start {}, end {})",
                    verdict.auction,
                    verdict.pair,
                    mark,
                    verdict.source.prices.start,
                    verdict.source.prices.end
                );
            }
        }
    }

    let invalid = verdicts.iter().filter(|v| !v.valid).count();
    if invalid > 0 {
        info!("{} of {} auctions failed validation", invalid, verdicts.len());
    }

    Ok((verdicts.len(), Vec::new()))
}

fn run_simulate(config: &Config, scenario: &Scenario) -> Result<Outcome> {
    let auctions = if scenario.auctions.is_empty() {
        info!("Scenario has no auctions, simulating the planned ones");
        plan(config, scenario)?
    } else {
        scenario.auctions.clone()
    };

    let set = scenario.token_set()?;
    let report = RebalanceSimulator::new(&set, scenario.fund()?)
        .run(&auctions, &scenario.current_basket()?)?;

    match config.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            print_header(&format!("SIMULATE: {}", scenario.label()));
            print_report(scenario, &report, config.show_steps)?;
        }
    }

    Ok((auctions.len(), report.basket))
}

fn plan(config: &Config, scenario: &Scenario) -> Result<Vec<Auction>> {
    let planner = AuctionPlanner::new(config.price_spread)?;
    let tolerances = dtf_rebalance::auction::parse_tolerances(&scenario.tolerances())?;
    let auctions = planner.plan(
        &scenario.token_set()?,
        &scenario.fund()?,
        &scenario.current_basket()?,
        &scenario.target_basket()?,
        &tolerances,
    )?;
    Ok(auctions)
}

// ============================================
// RENDERING
// ============================================

fn print_header(title: &str) {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(format!(" {}", title)).cyan().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn print_auctions(auctions: &[Auction]) {
    if auctions.is_empty() {
        println!("  {}", style("Nothing to trade: basket is within tolerance").green());
        return;
    }

    for (i, auction) in auctions.iter().enumerate() {
        println!("  {} {}", style(format!("#{}", i)).bold(), style(auction.pair()).yellow().bold());
        println!(
            "     sell  spot {:<28} low {:<28} high {}",
            auction.sell_limit.spot, auction.sell_limit.low, auction.sell_limit.high
        );
        println!(
            "     buy   spot {:<28} low {:<28} high {}",
            auction.buy_limit.spot, auction.buy_limit.low, auction.buy_limit.high
        );
        if auction.prices.is_unconstrained() {
            println!("     price {}", style("deferred to curator").dim());
        } else {
            println!(
                "     price start {:<27} end {}",
                auction.prices.start, auction.prices.end
            );
        }
    }
}

fn print_report(scenario: &Scenario, report: &SimulationReport, show_steps: bool) -> Result<()> {
    if show_steps {
        for (n, step) in report.steps.iter().enumerate() {
            println!(
                "  step {}: auction #{} {} -> {}  {:.4}% (${:.2}) at {}",
                n + 1,
                step.auction,
                step.sell,
                step.buy,
                step.weight_moved.to_f64() * 100.0,
                step.value_usd,
                step.rate
            );
        }
        println!();
    }

    let target = scenario.target_basket()?;
    println!("  {:<10} {:>12} {:>12}", "TOKEN", "RESULT", "TARGET");
    for ((token, result), target) in scenario.tokens.iter().zip(&report.basket).zip(&target) {
        println!(
            "  {:<10} {:>11.4}% {:>11.4}%",
            token.symbol,
            result.to_f64() * 100.0,
            target.to_f64() * 100.0
        );
    }
    println!();
    println!(
        "  {} auctions, ${:.2} traded",
        style(report.steps.len()).bold(),
        report.volume_usd()
    );

    Ok(())
}
