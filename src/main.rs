//! Aegis - Autonomous Paper-Trading Copilot
//!
//! Simulated autonomous trading against live discovery feeds with enforced
//! risk guardrails. No real transactions are ever submitted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use aegis_trader::application::Orchestrator;
use aegis_trader::config::load_config;
use aegis_trader::domain::Network;

#[derive(Parser)]
#[command(name = "aegis-trader", about = "Autonomous paper-trading copilot with risk guardrails")]
struct Cli {
    /// Path to config.toml
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Info-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Debug-level logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the feed, agent, and ledger until interrupted
    Run,
    /// Print portfolio statistics and recent activity
    Status,
    /// Destructively reset the paper portfolio
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets (advisory API key) come from the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    let config = load_config(&cli.config).context("Failed to load configuration")?;

    match cli.command {
        Command::Run => {
            tracing::info!("Starting Aegis paper-trading copilot...");
            tracing::warn!("PAPER TRADING - no real transactions");
            let orchestrator = Orchestrator::new(&config).await?;
            orchestrator.run().await?;
            tracing::info!("Aegis stopped");
        }
        Command::Status => {
            let orchestrator = Orchestrator::new(&config).await?;
            let ledger = orchestrator.ledger();
            let owner = &config.agent.owner;

            match ledger.portfolio_stats(owner, Network::Devnet).await {
                Some(stats) => {
                    println!("Portfolio for {}:", owner);
                    println!("  Total value:     {:.4} SOL", stats.total_value);
                    println!("  Balance:         {:.4} SOL", stats.sol_balance);
                    println!("  Positions:       {} ({:.4} SOL)", stats.position_count, stats.positions_value);
                    println!("  Total P&L:       {:+.4} SOL ({:+.2}%)", stats.total_pnl, stats.total_pnl_percent);
                    println!("  Win rate:        {:.1}%", stats.win_rate);
                    println!("  Best trade:      {:.2}x", stats.best_trade);
                    println!("  Daily spent:     {:.4} SOL (remaining {:.4})", stats.daily_spent, stats.daily_remaining);

                    let activities = ledger.activities(owner, Network::Devnet, 10).await;
                    if !activities.is_empty() {
                        println!("\nRecent activity:");
                        for activity in activities {
                            println!("  [{}] {}", activity.created_at.format("%H:%M:%S"), activity.message);
                        }
                    }
                }
                None => println!("No portfolio yet for {}", owner),
            }
        }
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!(
                    "Resetting deletes all positions, trades, and history. Re-run with --yes to confirm."
                );
            }
            let orchestrator = Orchestrator::new(&config).await?;
            orchestrator
                .ledger()
                .reset_portfolio(&config.agent.owner, Network::Devnet)
                .await;
            println!("Portfolio reset for {}", config.agent.owner);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).init();
}
