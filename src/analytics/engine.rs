//! Per-row enrichment: implied volatility, delta, gamma, vega and theta
//! for both sides of every strike.

use crate::analytics::pricing::{BlackScholes, SolverSettings};
use crate::config::PricingConfig;
use crate::types::{is_missing, OptionChainRow, OptionSide, SideAnalytics};
use serde::Serialize;

/// What happened to one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Enriched,
    /// Underlying price is zero or absent; the row was left untouched
    NoUnderlyingPrice,
}

/// Row counts for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    pub enriched: usize,
    pub no_underlying: usize,
}

/// Stateless analytics engine configured with fixed market parameters
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    model: BlackScholes,
    solver: SolverSettings,
    days_per_year: f64,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(&PricingConfig::default())
    }
}

impl AnalyticsEngine {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            model: BlackScholes::new(config.risk_free_rate, config.dividend_yield)
                .with_days_per_year(config.days_per_year),
            solver: SolverSettings::from(config),
            days_per_year: config.days_per_year,
        }
    }

    pub fn model(&self) -> &BlackScholes {
        &self.model
    }

    /// Years to expiry for a row
    pub fn time_to_expiry(&self, row: &OptionChainRow) -> f64 {
        row.days_to_expiry / self.days_per_year
    }

    /// Analytics for one side, each Greek evaluated at that side's own
    /// implied volatility
    pub fn side_analytics(&self, row: &OptionChainRow, side: OptionSide) -> SideAnalytics {
        let spot = row.underlying_ltp;
        let strike = row.strike_price;
        let time = self.time_to_expiry(row);

        let iv = self
            .model
            .implied_vol(side, row.market_price(side), spot, strike, time, &self.solver);

        SideAnalytics {
            implied_vol: iv,
            delta: self.model.delta(side, spot, strike, time, iv),
            gamma: self.model.gamma(spot, strike, time, iv),
            vega: self.model.vega(spot, strike, time, iv),
            theta: self.model.theta(side, spot, strike, time, iv),
        }
    }

    /// Write both sides' analytics into the row in place
    pub fn enrich_row(&self, row: &mut OptionChainRow) -> RowOutcome {
        if row.underlying_ltp == 0.0 || is_missing(row.underlying_ltp) {
            log::debug!("Underlying price is zero at strike {}", row.strike_price);
            return RowOutcome::NoUnderlyingPrice;
        }

        for side in OptionSide::BOTH {
            let analytics = self.side_analytics(row, side);
            row.set_analytics(side, &analytics);
        }
        RowOutcome::Enriched
    }

    /// Enrich every row of a file, left to right
    pub fn enrich_rows(&self, rows: &mut [OptionChainRow]) -> EnrichSummary {
        let mut summary = EnrichSummary::default();
        for row in rows.iter_mut() {
            match self.enrich_row(row) {
                RowOutcome::Enriched => summary.enriched += 1,
                RowOutcome::NoUnderlyingPrice => summary.no_underlying += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn priced_row(engine: &AnalyticsEngine, strike: f64, vol_call: f64, vol_put: f64) -> OptionChainRow {
        let spot = 22000.0;
        let days = 9.0;
        let t = days / 365.0;
        let model = engine.model();
        OptionChainRow::quote(
            strike,
            model.price(OptionSide::Call, spot, strike, t, vol_call),
            model.price(OptionSide::Put, spot, strike, t, vol_put),
            spot,
            days,
        )
    }

    #[test]
    fn test_enrich_recovers_each_side_vol() {
        let engine = AnalyticsEngine::default();
        let mut row = priced_row(&engine, 22100.0, 0.13, 0.17);

        assert_eq!(engine.enrich_row(&mut row), RowOutcome::Enriched);
        assert_relative_eq!(row.iv_call, 0.13, epsilon = 1e-6);
        assert_relative_eq!(row.iv_put, 0.17, epsilon = 1e-6);
        assert!(row.delta_call > 0.0 && row.delta_call < 1.0);
        assert!(row.delta_put < 0.0 && row.delta_put > -1.0);
        // Same strike, different vols: gamma stored per side differs
        assert!(row.gamma_call > 0.0 && row.gamma_put > 0.0);
        assert!((row.gamma_call - row.gamma_put).abs() > 1e-9);
        assert!(row.vega_call > 0.0 && row.vega_put > 0.0);
        assert!(row.theta_call < 0.0);
    }

    #[test]
    fn test_enrich_touches_only_analytics_fields() {
        let engine = AnalyticsEngine::default();
        let mut row = priced_row(&engine, 21900.0, 0.15, 0.15);
        row.rho_call = 1.25;
        row.volume_put = 300.0;
        row.call_open_interest = 4200.0;
        let call_ltp = row.call_ltp;

        engine.enrich_row(&mut row);
        assert_eq!(row.rho_call, 1.25);
        assert!(row.rho_put.is_nan());
        assert_eq!(row.volume_put, 300.0);
        assert_eq!(row.call_open_interest, 4200.0);
        assert_eq!(row.call_ltp, call_ltp);
        assert_eq!(row.strike_price, 21900.0);
    }

    #[test]
    fn test_zero_underlying_is_skipped() {
        let engine = AnalyticsEngine::default();
        let mut row = OptionChainRow::quote(100.0, 5.0, 4.0, 0.0, 7.0);

        assert_eq!(engine.enrich_row(&mut row), RowOutcome::NoUnderlyingPrice);
        assert!(row.iv_call.is_nan());
        assert!(row.delta_put.is_nan());
        assert!(row.gamma_call.is_nan());
        assert!(row.vega_put.is_nan());
        assert!(row.theta_call.is_nan());
    }

    #[test]
    fn test_enrich_rows_counts_and_continues() {
        let engine = AnalyticsEngine::default();
        let mut rows = vec![
            priced_row(&engine, 21900.0, 0.15, 0.16),
            OptionChainRow::quote(22000.0, 80.0, 75.0, 0.0, 9.0),
            priced_row(&engine, 22100.0, 0.14, 0.15),
        ];

        let summary = engine.enrich_rows(&mut rows);
        assert_eq!(summary.enriched, 2);
        assert_eq!(summary.no_underlying, 1);
        assert!(rows[2].iv_call.is_finite());
    }

    #[test]
    fn test_day_count_reaches_model() {
        let engine = AnalyticsEngine::new(&PricingConfig {
            days_per_year: 252.0,
            ..PricingConfig::default()
        });
        assert_eq!(engine.model().days_per_year, 252.0);
        assert_eq!(AnalyticsEngine::default().model().days_per_year, 365.0);
    }

    #[test]
    fn test_unpriceable_quote_leaves_nan_greeks() {
        let engine = AnalyticsEngine::default();
        // Call quoted below intrinsic value
        let mut row = OptionChainRow::quote(21000.0, 1.0, 2.0, 22000.0, 9.0);
        engine.enrich_row(&mut row);
        assert!(row.iv_call.is_nan());
        assert!(row.delta_call.is_nan());
        assert!(row.iv_put.is_finite());
    }
}
