//! # rusty_greeks
//!
//! Batch enrichment and cleaning of option-chain snapshots.
//!
//! A snapshot tree holds one directory per underlying, each containing
//! per-timestamp CSV files with one row per strike. Two runs operate on
//! the tree:
//!
//! - **enrich**: solve implied volatility for both sides of every strike
//!   and fill in delta, gamma, vega and theta
//! - **clean**: interpolate missing values from neighboring strikes, flag
//!   unsalvageable files, and remove directories that collect too many flags
//!
//! Both runs share one worker-pool pipeline.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rusty_greeks::prelude::*;
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let orchestrator = Orchestrator::new(Config::default())?;
//!     let report = orchestrator.process(Path::new("dataset"))?;
//!     println!("{} files enriched", report.enrich.stats.files_written);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod repair;
pub mod report;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::analytics::{AnalyticsEngine, BlackScholes, SolverSettings};
    pub use crate::config::{Config, PipelineConfig, PricingConfig, RepairConfig, RetentionConfig, VegaPutRule};
    pub use crate::data::{enumerate_files, load_rows, write_rows};
    pub use crate::error::{ChainError, Result};
    pub use crate::pipeline::{Orchestrator, PipelineReport, RunKind, RunReport};
    pub use crate::repair::{RepairOutcome, RepairPass};
    pub use crate::types::*;
}
