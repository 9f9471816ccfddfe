//! Property tests for backtests and the model lifecycle.

use chrono::Duration;
use proptest::prelude::*;

use gwlab_core::data::WellSeries;
use gwlab_core::domain::{parse_timestamp, GroundwaterReading, WellId};
use gwlab_core::forecast::{BaseModel, ForecastProgram};
use gwlab_core::metrics::MetricSet;
use gwlab_runner::backtest::{run_backtest, BacktestConfig};
use gwlab_runner::evaluation::WellForecast;
use gwlab_runner::lifecycle::{Candidate, ModelKind, ModelLifecycle};

fn series(values: &[f64]) -> WellSeries {
    let start = parse_timestamp("2023-06-01").unwrap();
    let mut s = WellSeries::empty(WellId::from("P"));
    s.groundwater = values
        .iter()
        .enumerate()
        .map(|(i, &gwl)| GroundwaterReading {
            well_id: WellId::from("P"),
            timestamp: start + Duration::days(i as i64),
            gwl,
            ec: None,
        })
        .collect();
    s
}

#[derive(Debug, Clone)]
enum Op {
    Install { window: usize, validated: bool },
    Check { rmse: f64 },
    Fail,
    Revert,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..30, any::<bool>())
            .prop_map(|(window, validated)| Op::Install { window, validated }),
        (0.01f64..5.0).prop_map(|rmse| Op::Check { rmse }),
        Just(Op::Fail),
        Just(Op::Revert),
    ]
}

fn checked_forecast(rmse: f64) -> WellForecast {
    let mut f = WellForecast::cleared(0);
    f.predictions = vec![1.0; 7];
    f.metrics = MetricSet {
        rmse,
        mse: rmse * rmse,
        mae: rmse,
    };
    f
}

proptest! {
    #[test]
    fn backtest_scores_every_point_but_the_first(
        values in prop::collection::vec(0.0f64..50.0, 1..60),
    ) {
        let s = series(&values);
        let config = BacktestConfig::full_history(7);
        let report = run_backtest(&s, &ForecastProgram::default(), &config);
        prop_assert_eq!(report.errors.len(), values.len() - 1);
        prop_assert_eq!(report.skipped.len(), 1);
        prop_assert!(report.errors.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        for e in &report.errors {
            prop_assert!((e.error - (e.predicted - e.actual)).abs() < 1e-12);
        }
    }

    #[test]
    fn trailing_backtest_never_exceeds_leading_period(
        values in prop::collection::vec(0.0f64..50.0, 0..40),
        leading in 0usize..12,
    ) {
        let s = series(&values);
        let program = ForecastProgram::from_base(BaseModel::MovingAverage { window: 3 });
        let report = run_backtest(&s, &program, &BacktestConfig::trailing(leading, 7));
        prop_assert!(report.errors.len() + report.skipped.len() <= leading);
        prop_assert_eq!(report.errors.len() + report.skipped.len(), leading.min(values.len()));
    }

    #[test]
    fn failures_never_touch_last_valid(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut lc = ModelLifecycle::new();
        let kind = ModelKind::Arima;
        for op in ops {
            let before = lc.registry.slot(kind).last_valid.clone();
            match op {
                Op::Install { window, validated } => {
                    let candidate = Candidate {
                        program: ForecastProgram::from_base(BaseModel::MovingAverage { window }),
                        theory: String::new(),
                        explanation: String::new(),
                        params: None,
                    };
                    lc.install_candidate(kind, candidate, validated);
                    if !validated {
                        prop_assert_eq!(&lc.registry.slot(kind).last_valid, &before);
                    }
                }
                Op::Check { rmse } => {
                    lc.record_check(kind, &checked_forecast(rmse));
                    prop_assert!(lc.registry.slot(kind).last_valid.is_some());
                }
                Op::Fail => {
                    lc.record_failure(kind, "boom");
                    prop_assert_eq!(&lc.registry.slot(kind).last_valid, &before);
                }
                Op::Revert => {
                    let reverted = lc.revert(kind).is_ok();
                    prop_assert_eq!(reverted, before.is_some());
                    prop_assert_eq!(&lc.registry.slot(kind).last_valid, &before);
                }
            }
        }
    }

    #[test]
    fn best_entry_has_minimum_finite_metric(
        rmses in prop::collection::vec(prop_oneof![0.0f64..10.0, Just(f64::INFINITY)], 1..20),
    ) {
        let mut lc = ModelLifecycle::new();
        for (i, rmse) in rmses.iter().enumerate() {
            let candidate = Candidate {
                program: ForecastProgram::from_base(BaseModel::MovingAverage { window: i + 1 }),
                theory: String::new(),
                explanation: String::new(),
                params: None,
            };
            lc.install_candidate(ModelKind::General, candidate, true);
            lc.record_check(ModelKind::General, &checked_forecast(*rmse));
        }

        let finite_min = rmses
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::INFINITY, f64::min);
        match lc.select_best() {
            Ok(best) => prop_assert_eq!(best.metrics.rmse, finite_min),
            Err(_) => prop_assert!(finite_min.is_infinite()),
        }
    }
}
