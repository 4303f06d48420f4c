//! Autonomous Agent Layer
//!
//! The supervised decision loop and its pluggable strategies:
//!
//! - `strategy`: the decision seam plus the always-available rule-based brain
//! - `advisor`: external-reasoning strategy with rule-based fallback
//! - `trader`: the agent state machine and position-management tick

pub mod advisor;
pub mod strategy;
pub mod trader;

pub use advisor::{AdvisorConfig, AdvisorError, AdvisoryStrategy};
pub use strategy::{DecisionAction, DecisionStrategy, RuleBasedStrategy, TradeDecision};
pub use trader::{AgentConfig, AgentStats, AutoTrader, SkipReason, Verdict};
