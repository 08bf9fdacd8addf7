//! At-the-money Greek totals
//!
//! Sums the Greeks of the strikes around the money for one snapshot, as
//! used by position-level risk reports.

use crate::data::{enumerate_files, load_rows};
use crate::error::Result;
use crate::types::{OptionChainRow, Price};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Half-width of the band used to find the anchor strike
pub const ANCHOR_BAND: f64 = 50.0;

/// Rows taken on each side of the anchor
pub const NEIGHBOR_ROWS: usize = 4;

/// Summed Greeks over the rows around an anchor strike
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GreekTotals {
    pub gamma_call: f64,
    pub gamma_put: f64,
    pub theta_call: f64,
    pub theta_put: f64,
    pub delta_call: f64,
    pub delta_put: f64,
    pub vega_call: f64,
    pub vega_put: f64,
    /// Number of rows summed
    pub rows: usize,
}

impl GreekTotals {
    /// Add one row; missing values count as zero
    pub fn add(&mut self, row: &OptionChainRow) {
        fn value(v: f64) -> f64 {
            if v.is_nan() {
                0.0
            } else {
                v
            }
        }
        self.gamma_call += value(row.gamma_call);
        self.gamma_put += value(row.gamma_put);
        self.theta_call += value(row.theta_call);
        self.theta_put += value(row.theta_put);
        self.delta_call += value(row.delta_call);
        self.delta_put += value(row.delta_put);
        self.vega_call += value(row.vega_call);
        self.vega_put += value(row.vega_put);
        self.rows += 1;
    }

    /// Net delta across both sides
    pub fn net_delta(&self) -> f64 {
        self.delta_call + self.delta_put
    }
}

/// Totals anchored on one snapshot's at-the-money strike
#[derive(Debug, Clone, Serialize)]
pub struct AtmSummary {
    pub path: PathBuf,
    pub underlying: Price,
    pub anchor_strike: Price,
    pub totals: GreekTotals,
}

/// Highest underlying price in the snapshot
pub fn max_underlying(rows: &[OptionChainRow]) -> Option<Price> {
    rows.iter()
        .map(|row| row.underlying_ltp)
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}

/// Index of the first row whose strike is within the anchor band of `price`
pub fn anchor_index(rows: &[OptionChainRow], price: Price) -> Option<usize> {
    rows.iter().position(|row| {
        row.strike_price >= price - ANCHOR_BAND && row.strike_price <= price + ANCHOR_BAND
    })
}

/// Sum the rows from `NEIGHBOR_ROWS` before to `NEIGHBOR_ROWS` after `anchor`,
/// clipped to the snapshot
pub fn totals_around(rows: &[OptionChainRow], anchor: usize) -> GreekTotals {
    let start = anchor.saturating_sub(NEIGHBOR_ROWS);
    let end = (anchor + NEIGHBOR_ROWS + 1).min(rows.len());
    let mut totals = GreekTotals::default();
    for row in rows.get(start..end).unwrap_or(&[]) {
        totals.add(row);
    }
    totals
}

/// Anchor on the strike nearest the maximum underlying price and sum the
/// surrounding Greeks. `None` if no strike lies within the band.
pub fn summarize(rows: &[OptionChainRow]) -> Option<(Price, Price, GreekTotals)> {
    let underlying = max_underlying(rows)?;
    let anchor = anchor_index(rows, underlying)?;
    Some((underlying, rows[anchor].strike_price, totals_around(rows, anchor)))
}

/// Sum the Greeks around a caller-chosen strike, typically the anchor of a
/// reference snapshot. Without a strike in the band the sum is taken around
/// the first row, so an empty snapshot gives zero totals.
pub fn summarize_at_strike(rows: &[OptionChainRow], strike: Price) -> GreekTotals {
    totals_around(rows, anchor_index(rows, strike).unwrap_or(0))
}

/// First row whose strike is at or above `price`
pub fn row_at_or_above(rows: &[OptionChainRow], price: Price) -> Option<&OptionChainRow> {
    rows.iter().find(|row| row.strike_price >= price)
}

/// Load one file and summarize it
pub fn summarize_file(path: &Path) -> Result<Option<AtmSummary>> {
    let rows = load_rows(path)?;
    Ok(summarize(&rows).map(|(underlying, anchor_strike, totals)| AtmSummary {
        path: path.to_path_buf(),
        underlying,
        anchor_strike,
        totals,
    }))
}

/// Summarize every file under `root` in parallel.
///
/// Files that fail to load or have no anchor are logged and left out;
/// results keep enumeration order.
pub fn summarize_tree(root: &Path) -> Result<Vec<AtmSummary>> {
    let files = enumerate_files(root)?;
    let summaries = files
        .par_iter()
        .filter_map(|path| match summarize_file(path) {
            Ok(Some(summary)) => Some(summary),
            Ok(None) => {
                log::debug!("No at-the-money strike in {}", path.display());
                None
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect();
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::write_rows;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::TempDir;

    fn chain(underlying: f64) -> Vec<OptionChainRow> {
        (0..15)
            .map(|i| {
                let strike = 21300.0 + 100.0 * i as f64;
                let mut row = OptionChainRow::quote(strike, 100.0, 100.0, underlying, 5.0);
                row.gamma_call = 0.001;
                row.gamma_put = 0.001;
                row.delta_call = 0.5;
                row.delta_put = -0.4;
                row.theta_call = -2.0;
                row.theta_put = -1.5;
                row.vega_call = 10.0;
                row.vega_put = 9.0;
                row
            })
            .collect()
    }

    #[test]
    fn test_summarize_sums_nine_rows() {
        let mut rows = chain(21990.0);
        rows[3].underlying_ltp = 22010.0;

        let (underlying, anchor, totals) = summarize(&rows).unwrap();
        assert_eq!(underlying, 22010.0);
        assert_eq!(anchor, 22000.0);
        assert_eq!(totals.rows, 9);
        assert_relative_eq!(totals.vega_call, 90.0);
        assert_relative_eq!(totals.theta_put, -13.5);
        assert_relative_eq!(totals.net_delta(), 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_window_clipped_at_edges() {
        let rows = chain(21300.0);
        let (_, anchor, totals) = summarize(&rows).unwrap();
        assert_eq!(anchor, 21300.0);
        assert_eq!(totals.rows, 5);
    }

    #[test]
    fn test_no_anchor_is_none() {
        let rows = chain(30000.0);
        assert!(summarize(&rows).is_none());
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_reference_without_anchor_sums_first_rows() {
        let rows = chain(22000.0);
        let totals = summarize_at_strike(&rows, 50000.0);
        assert_eq!(totals.rows, NEIGHBOR_ROWS + 1);
        assert_relative_eq!(totals.vega_call, 50.0);
        assert_eq!(totals, summarize_at_strike(&rows, 21300.0));

        assert_eq!(summarize_at_strike(&[], 22000.0), GreekTotals::default());
    }

    #[test]
    fn test_missing_greeks_count_as_zero() {
        let mut rows = chain(22000.0);
        rows[7].vega_call = f64::NAN;
        let totals = summarize_at_strike(&rows, 22000.0);
        assert_relative_eq!(totals.vega_call, 80.0);
    }

    #[test]
    fn test_row_at_or_above() {
        let rows = chain(22000.0);
        assert_eq!(row_at_or_above(&rows, 22050.0).map(|r| r.strike_price), Some(22100.0));
        assert_eq!(row_at_or_above(&rows, 21300.0).map(|r| r.strike_price), Some(21300.0));
        assert!(row_at_or_above(&rows, 99999.0).is_none());
    }

    #[test]
    fn test_summarize_tree_skips_bad_files() {
        let tmp = TempDir::new().unwrap();
        write_rows(&tmp.path().join("a.csv"), &chain(22000.0)).unwrap();
        write_rows(&tmp.path().join("b.csv"), &chain(40000.0)).unwrap();
        fs::write(tmp.path().join("c.csv"), "Strike Price\nnot-a-number\n").unwrap();

        let summaries = summarize_tree(tmp.path()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].path, tmp.path().join("a.csv"));
        assert_eq!(summaries[0].anchor_strike, 22000.0);
    }
}
