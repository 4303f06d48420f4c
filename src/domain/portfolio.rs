//! Portfolio and Position Accounting
//!
//! Pure accounting state for the paper trading engine: one portfolio per
//! (owner, network) with its open positions keyed by token address. All
//! mutation happens through the ledger; these types only know the arithmetic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Starting base-currency balance for a fresh paper portfolio
pub const INITIAL_SOL_BALANCE: f64 = 10.0;

/// Quantity below which a position is considered fully drained
pub const POSITION_EPSILON: f64 = 1e-4;

/// Simulated network a portfolio trades on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    MainnetBeta,
    Devnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Devnet
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::MainnetBeta => write!(f, "mainnet-beta"),
            Network::Devnet => write!(f, "devnet"),
        }
    }
}

/// An open holding of one asset within one portfolio
///
/// Invariant: `quantity > 0` while the position exists; a sell that drains
/// the quantity within [`POSITION_EPSILON`] removes the position entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Token mint address
    pub token_address: String,
    /// Token symbol
    pub token_symbol: String,
    /// Asset quantity held
    pub quantity: f64,
    /// Cost-basis-weighted average entry price
    pub avg_entry_price: f64,
    /// Last marked price
    pub current_price: f64,
    /// Cost basis in base currency (sum of buy spends minus sold basis)
    pub entry_value: f64,
    /// Mark-to-market value in base currency
    pub current_value: f64,
    /// Unrealized profit/loss
    pub pnl: f64,
    /// Unrealized profit/loss percentage
    pub pnl_percent: f64,
    /// When the position was opened
    pub opened_at: DateTime<Utc>,
    /// Last mutation/mark timestamp
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Open a new position from a first buy
    pub fn open(
        token_address: &str,
        token_symbol: &str,
        quantity: f64,
        price: f64,
        sol_amount: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            token_address: token_address.to_string(),
            token_symbol: token_symbol.to_string(),
            quantity,
            avg_entry_price: price,
            current_price: price,
            entry_value: sol_amount,
            current_value: sol_amount,
            pnl: 0.0,
            pnl_percent: 0.0,
            opened_at: now,
            updated_at: now,
        }
    }

    /// Merge a second buy into this position, re-basing the average entry
    /// price as a cost-basis-weighted average.
    pub fn apply_buy(&mut self, quantity: f64, price: f64, sol_amount: f64, now: DateTime<Utc>) {
        let new_quantity = self.quantity + quantity;
        let new_entry_value = self.entry_value + sol_amount;
        self.quantity = new_quantity;
        self.entry_value = new_entry_value;
        self.avg_entry_price = new_entry_value / new_quantity;
        self.current_price = price;
        self.current_value = new_quantity * price;
        self.updated_at = now;
    }

    /// Reduce this position by a sell. Returns true when the remaining
    /// quantity falls within [`POSITION_EPSILON`] and the row should be
    /// removed.
    pub fn apply_sell(&mut self, quantity: f64, cost_basis: f64, price: f64, now: DateTime<Utc>) -> bool {
        let remaining = self.quantity - quantity;
        if remaining <= POSITION_EPSILON {
            return true;
        }
        self.quantity = remaining;
        self.entry_value -= cost_basis;
        self.current_price = price;
        self.current_value = remaining * price;
        self.updated_at = now;
        false
    }

    /// Refresh the mark-to-market snapshot at a new price
    pub fn mark(&mut self, price: f64, now: DateTime<Utc>) {
        self.current_price = price;
        self.current_value = self.quantity * price;
        self.pnl = (price - self.avg_entry_price) * self.quantity;
        self.pnl_percent = if self.avg_entry_price > 0.0 {
            (price / self.avg_entry_price - 1.0) * 100.0
        } else {
            0.0
        };
        self.updated_at = now;
    }

    /// Current-to-entry price ratio
    pub fn multiplier(&self) -> f64 {
        if self.avg_entry_price > 0.0 {
            self.current_price / self.avg_entry_price
        } else {
            1.0
        }
    }
}

/// One paper portfolio per (owner, network)
///
/// Invariant: `sol_balance >= 0` at all times; the ledger rejects any buy
/// that would violate this before mutating anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    /// Portfolio id
    pub id: u64,
    /// Owning identity (wallet address in the original domain)
    pub owner: String,
    /// Network this portfolio simulates
    pub network: Network,
    /// Base-currency balance
    pub sol_balance: f64,
    /// Total base currency ever deposited
    pub total_deposited: f64,
    /// Realized profit/loss, accumulated on sells
    pub total_pnl: f64,
    /// Count of executed trades (buys and sells)
    pub total_trades: u64,
    /// Running trade-level win rate, 0-100
    pub win_rate: f64,
    /// Best realized multiplier seen
    pub best_trade: f64,
    /// Count of avoided rug pulls (informational)
    pub rugs_avoided: u64,
    /// Base currency spent today
    pub daily_spent: f64,
    /// When the daily spend counter last reset
    pub daily_spent_reset: DateTime<Utc>,
    /// Open positions by token address
    pub positions: HashMap<String, Position>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    /// Create a fresh portfolio with the fixed starting balance
    pub fn fresh(id: u64, owner: &str, network: Network, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner: owner.to_string(),
            network,
            sol_balance: INITIAL_SOL_BALANCE,
            total_deposited: INITIAL_SOL_BALANCE,
            total_pnl: 0.0,
            total_trades: 0,
            win_rate: 0.0,
            best_trade: 0.0,
            rugs_avoided: 0,
            daily_spent: 0.0,
            daily_spent_reset: now,
            positions: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark-to-market value of all open positions
    pub fn positions_value(&self) -> f64 {
        self.positions.values().map(|p| p.current_value).sum()
    }

    /// Sum of unrealized pnl across open positions
    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.pnl).sum()
    }

    /// Fold one closed sell into the running trade-level win rate.
    /// Must be called after `total_trades` has been incremented.
    pub fn fold_win_rate(&mut self, is_win: bool) {
        let n = self.total_trades as f64;
        let outcome = if is_win { 100.0 } else { 0.0 };
        self.win_rate = (self.win_rate * (n - 1.0) + outcome) / n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_open_position() {
        let pos = Position::open("mint1", "$TEST", 500.0, 0.001, 0.5, now());
        assert_relative_eq!(pos.quantity, 500.0);
        assert_relative_eq!(pos.avg_entry_price, 0.001);
        assert_relative_eq!(pos.entry_value, 0.5);
        assert_relative_eq!(pos.current_value, 0.5);
    }

    #[test]
    fn test_weighted_average_rebase() {
        let mut pos = Position::open("mint1", "$TEST", 1000.0, 0.001, 1.0, now());
        // Second buy at double the price
        pos.apply_buy(500.0, 0.002, 1.0, now());

        assert_relative_eq!(pos.quantity, 1500.0);
        assert_relative_eq!(pos.entry_value, 2.0);
        // (1.0 + 1.0) / (1000 + 500)
        assert_relative_eq!(pos.avg_entry_price, 2.0 / 1500.0, max_relative = 1e-12);
    }

    #[test]
    fn test_entry_value_is_sum_of_buys() {
        let mut pos = Position::open("mint1", "$TEST", 100.0, 0.01, 1.0, now());
        pos.apply_buy(50.0, 0.02, 1.0, now());
        pos.apply_buy(25.0, 0.04, 1.0, now());
        assert_relative_eq!(pos.entry_value, 3.0);
        // Weighted average over all buys
        assert_relative_eq!(pos.avg_entry_price, 3.0 / 175.0, max_relative = 1e-12);
    }

    #[test]
    fn test_sell_within_epsilon_closes() {
        let mut pos = Position::open("mint1", "$TEST", 500.0, 0.001, 0.5, now());
        let closed = pos.apply_sell(500.0 - 0.5e-4, 0.5, 0.002, now());
        assert!(closed);
    }

    #[test]
    fn test_partial_sell_reduces_exactly() {
        let mut pos = Position::open("mint1", "$TEST", 500.0, 0.001, 0.5, now());
        let closed = pos.apply_sell(250.0, 0.25, 0.002, now());
        assert!(!closed);
        assert_relative_eq!(pos.quantity, 250.0);
        assert_relative_eq!(pos.entry_value, 0.25);
    }

    #[test]
    fn test_mark_updates_pnl() {
        let mut pos = Position::open("mint1", "$TEST", 500.0, 0.001, 0.5, now());
        pos.mark(0.002, now());
        assert_relative_eq!(pos.current_value, 1.0);
        assert_relative_eq!(pos.pnl, 0.5);
        assert_relative_eq!(pos.pnl_percent, 100.0);
        assert_relative_eq!(pos.multiplier(), 2.0);
    }

    #[test]
    fn test_fresh_portfolio() {
        let p = Portfolio::fresh(1, "owner1", Network::Devnet, now());
        assert_relative_eq!(p.sol_balance, INITIAL_SOL_BALANCE);
        assert_relative_eq!(p.total_deposited, INITIAL_SOL_BALANCE);
        assert!(p.positions.is_empty());
        assert_eq!(p.total_trades, 0);
    }

    #[test]
    fn test_fold_win_rate() {
        let mut p = Portfolio::fresh(1, "owner1", Network::Devnet, now());

        p.total_trades = 1;
        p.fold_win_rate(true);
        assert_relative_eq!(p.win_rate, 100.0);

        p.total_trades = 2;
        p.fold_win_rate(false);
        assert_relative_eq!(p.win_rate, 50.0);

        p.total_trades = 3;
        p.fold_win_rate(true);
        assert_relative_eq!(p.win_rate, 200.0 / 3.0, max_relative = 1e-12);
    }
}
