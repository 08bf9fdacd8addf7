//! Standalone reports over enriched snapshots
//!
//! Neither report takes part in the enrich or clean runs.

pub mod atm;
pub mod regression;

pub use atm::{summarize, summarize_tree, AtmSummary, GreekTotals};
pub use regression::{decayed_linear_regression, exponential_weights, weighted_linear_regression, LinearFit};
