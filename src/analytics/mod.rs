//! Option analytics
//!
//! Black-Scholes-Merton pricing, sensitivities and implied volatility, and
//! the per-row engine that writes them into an option chain.

pub mod engine;
pub mod pricing;

pub use engine::{AnalyticsEngine, EnrichSummary, RowOutcome};
pub use pricing::{BlackScholes, SolverSettings};
