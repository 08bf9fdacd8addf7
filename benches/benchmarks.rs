use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rusty_greeks::{
    analytics::{AnalyticsEngine, BlackScholes, SolverSettings},
    repair::RepairPass,
    types::{OptionChainRow, OptionSide},
};
use std::path::Path;

fn synthetic_chain(strikes: usize) -> Vec<OptionChainRow> {
    let engine = AnalyticsEngine::default();
    let model = engine.model();
    let spot = 22000.0;
    let days = 9.0;
    let t = days / 365.0;

    (0..strikes)
        .map(|i| {
            let strike = spot - 50.0 * (strikes / 2) as f64 + 50.0 * i as f64;
            OptionChainRow::quote(
                strike,
                model.price(OptionSide::Call, spot, strike, t, 0.14),
                model.price(OptionSide::Put, spot, strike, t, 0.16),
                spot,
                days,
            )
        })
        .collect()
}

fn benchmark_implied_vol(c: &mut Criterion) {
    let model = BlackScholes::new(0.0675, 0.013);
    let settings = SolverSettings::default();
    let t = 9.0 / 365.0;
    let price = model.price(OptionSide::Call, 22000.0, 22300.0, t, 0.22);

    c.bench_function("implied_vol_otm_call", |b| {
        b.iter(|| {
            model.implied_vol(
                OptionSide::Call,
                black_box(price),
                black_box(22000.0),
                black_box(22300.0),
                t,
                &settings,
            )
        });
    });
}

fn benchmark_enrich_file(c: &mut Criterion) {
    let engine = AnalyticsEngine::default();
    let rows = synthetic_chain(100);

    c.bench_function("enrich_100_strikes", |b| {
        b.iter(|| {
            let mut rows = rows.clone();
            engine.enrich_rows(black_box(&mut rows))
        });
    });
}

fn benchmark_repair_file(c: &mut Criterion) {
    let engine = AnalyticsEngine::default();
    let mut rows = synthetic_chain(100);
    engine.enrich_rows(&mut rows);
    for row in rows.iter_mut().skip(1).step_by(3) {
        row.call_ltp = f64::NAN;
        row.iv_put = f64::NAN;
    }
    let pass = RepairPass::default();

    c.bench_function("repair_100_strikes", |b| {
        b.iter(|| {
            let mut rows = rows.clone();
            pass.repair(Path::new("bench.csv"), black_box(&mut rows))
        });
    });
}

criterion_group!(
    benches,
    benchmark_implied_vol,
    benchmark_enrich_file,
    benchmark_repair_file
);
criterion_main!(benches);
