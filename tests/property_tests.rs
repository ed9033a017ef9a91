mod common;

use chrono::{Duration, TimeZone, Utc};
use demand_planner::{
    commands::{demand::BulkUpdateCommand, Command},
    entities::working_demand,
    forecasting::{huber::MIN_SCALE, ForecastAggregator, HuberEstimator},
    models::{DemandDataset, DemandScope},
};
use proptest::prelude::*;

use common::{demand, event_channel, memory_store, product};

fn working_row(id: i32, day: i64, product: u8, quantity: f64) -> working_demand::Model {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let at = base + Duration::days(day);
    working_demand::Model {
        id,
        demand_date: at,
        product_id: format!("P{}", product),
        product_name: format!("Product {}", product),
        customer_id: "C1".to_string(),
        customer_name: "Customer 1".to_string(),
        quantity,
        created_at: base,
        modified_at: base,
    }
}

fn rows_strategy() -> impl Strategy<Value = Vec<working_demand::Model>> {
    prop::collection::vec((0i64..365, 0u8..4, 0.0f64..10_000.0), 1..60).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (day, product, quantity))| working_row(i as i32 + 1, day, product, quantity))
            .collect()
    })
}

proptest! {
    #[test]
    fn estimate_stays_within_sample_range(values in prop::collection::vec(-1e6f64..1e6, 1..80)) {
        let estimate = HuberEstimator::default().estimate(&values);
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let slack = 1e-9 * min.abs().max(max.abs()).max(1.0);
        prop_assert!(estimate.location >= min - slack);
        prop_assert!(estimate.location <= max + slack);
        prop_assert!(estimate.scale > 0.0);
        prop_assert!(estimate.iterations <= HuberEstimator::default().max_iterations);
    }

    #[test]
    fn estimate_of_constant_series_is_that_constant(value in -1e6f64..1e6, n in 1usize..30) {
        let estimate = HuberEstimator::default().estimate(&vec![value; n]);
        prop_assert!((estimate.location - value).abs() <= 1e-12 * value.abs().max(1.0));
        prop_assert!(estimate.scale > 0.0 && estimate.scale <= MIN_SCALE);
    }

    #[test]
    fn aggregate_preserves_totals(rows in rows_strategy()) {
        let aggregate = ForecastAggregator::rebuild(&rows);
        let input: f64 = rows.iter().map(|r| r.quantity).sum();
        let output: f64 = aggregate.iter().map(|a| a.quantity).sum();
        prop_assert!((input - output).abs() <= 1e-6 * input.max(1.0));

        let mut keys: Vec<_> = aggregate.iter().map(|a| (a.period, a.product_id.clone())).collect();
        let len = keys.len();
        keys.dedup();
        prop_assert_eq!(keys.len(), len);
    }

    #[test]
    fn aggregate_rebuild_is_deterministic(rows in rows_strategy()) {
        let first = ForecastAggregator::rebuild(&rows);
        let mut reversed = rows.clone();
        reversed.reverse();
        let second = ForecastAggregator::rebuild(&rows);
        prop_assert_eq!(&first, &second);
        // grouping does not depend on row order
        let third = ForecastAggregator::rebuild(&reversed);
        prop_assert_eq!(first.len(), third.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bulk_update_scales_scope_total(
        quantities in prop::collection::vec(0.0f64..1_000.0, 1..20),
        percentage in -100.0f64..300.0,
        scope_product in 0u8..3,
    ) {
        prop_assume!(percentage != 0.0);
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let dataset = DemandDataset {
                demand: quantities
                    .iter()
                    .enumerate()
                    .map(|(i, q)| {
                        let day = format!("2024-01-{:02}T00:00:00Z", i % 28 + 1);
                        demand(&day, &format!("P{}", i % 3), "C1", *q)
                    })
                    .collect(),
                products: vec![product("P0", 1.0, 1.0, 1.0)],
            };
            let store = memory_store(dataset).await;
            let before = store.snapshot().await;
            let scope = DemandScope::all().with_product(format!("P{}", scope_product));
            let in_scope: f64 = before
                .working_demand
                .iter()
                .filter(|r| scope.matches(r))
                .map(|r| r.quantity)
                .sum();
            let out_of_scope: f64 = before
                .working_demand
                .iter()
                .filter(|r| !scope.matches(r))
                .map(|r| r.quantity)
                .sum();

            let (events, _rx) = event_channel();
            let outcome = BulkUpdateCommand::new(scope.clone(), percentage, "property")
                .execute(store.clone(), events)
                .await;
            let after = store.snapshot().await;

            match outcome {
                Ok(result) => {
                    let total: f64 = after.working_demand.iter().map(|r| r.quantity).sum();
                    let expected = in_scope * result.multiplier + out_of_scope;
                    assert!((total - expected).abs() <= 1e-6 * expected.max(1.0));
                    assert_eq!(after.update_history.len(), 1);
                    assert_eq!(after.forecast_aggregate, ForecastAggregator::rebuild(&after.working_demand));
                }
                Err(_) => {
                    // only possible when the product has no rows
                    assert_eq!(in_scope, 0.0);
                    assert_eq!(after, before);
                }
            }
        });
    }
}
