//! Property-based tests for the pricing model and the repair pass

use proptest::prelude::*;
use rusty_greeks::analytics::{BlackScholes, SolverSettings};
use rusty_greeks::repair::RepairPass;
use rusty_greeks::types::{OptionChainRow, OptionSide};
use std::path::Path;

fn model() -> BlackScholes {
    BlackScholes::new(0.0675, 0.013)
}

fn side() -> impl Strategy<Value = OptionSide> {
    prop_oneof![Just(OptionSide::Call), Just(OptionSide::Put)]
}

fn full_row(strike: f64, value: f64) -> OptionChainRow {
    let mut row = OptionChainRow::quote(strike, value, value, 22000.0, 7.0);
    row.gamma_call = value;
    row.gamma_put = value;
    row.iv_call = value;
    row.iv_put = value;
    row.delta_call = value;
    row.delta_put = value;
    row.theta_call = value;
    row.theta_put = value;
    row.rho_call = value;
    row.rho_put = value;
    row.vega_put = value;
    row
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn implied_vol_reprices_market_quote(
        side in side(),
        moneyness in 0.9f64..1.1,
        days in 2.0f64..60.0,
        vol in 0.05f64..0.8,
    ) {
        let bs = model();
        let spot = 22000.0;
        let strike = spot * moneyness;
        let t = days / 365.0;
        let price = bs.price(side, spot, strike, t, vol);
        let settings = SolverSettings::default();

        let iv = bs.implied_vol(side, price, spot, strike, t, &settings);
        prop_assume!(iv.is_finite());
        let repriced = bs.price(side, spot, strike, t, iv);
        prop_assert!((repriced - price).abs() < 1e-6, "price {} repriced {}", price, repriced);
    }

    #[test]
    fn put_call_parity_holds(
        strike in 18000.0f64..26000.0,
        days in 1.0f64..90.0,
        vol in 0.05f64..1.0,
    ) {
        let bs = model();
        let spot = 22000.0;
        let t = days / 365.0;
        let call = bs.price(OptionSide::Call, spot, strike, t, vol);
        let put = bs.price(OptionSide::Put, spot, strike, t, vol);
        let forward = spot * (-bs.dividend * t).exp() - strike * (-bs.rate * t).exp();
        prop_assert!((call - put - forward).abs() < 1e-6);
    }

    #[test]
    fn repair_is_noop_on_complete_files(
        values in prop::collection::vec(0.01f64..500.0, 3..20),
    ) {
        let mut rows: Vec<OptionChainRow> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| full_row(21600.0 + 50.0 * i as f64, v))
            .collect();
        let original = rows.clone();
        let pass = RepairPass::default();

        let first = pass.repair(Path::new("a.csv"), &mut rows).unwrap();
        let second = pass.repair(Path::new("a.csv"), &mut rows).unwrap();
        prop_assert!(!first.changed);
        prop_assert!(!second.changed);
        prop_assert_eq!(first.deficiency, 0);
        for (after, before) in rows.iter().zip(&original) {
            prop_assert_eq!(after.call_ltp, before.call_ltp);
            prop_assert_eq!(after.vega_put, before.vega_put);
        }
    }

    #[test]
    fn single_gap_is_midpoint(
        previous in 0.01f64..500.0,
        next in 0.01f64..500.0,
    ) {
        let mut rows = vec![
            full_row(21950.0, previous),
            full_row(22000.0, 1.0),
            full_row(22050.0, next),
        ];
        rows[1].put_ltp = f64::NAN;

        let outcome = RepairPass::default().repair(Path::new("b.csv"), &mut rows).unwrap();
        prop_assert!(outcome.changed);
        prop_assert_eq!(rows[1].put_ltp, (previous + next) / 2.0);
    }
}
