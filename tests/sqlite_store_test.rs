//! The same flows as the in-memory tests, against a migrated SQLite database.

mod common;

use assert_matches::assert_matches;
use demand_planner::{
    commands::{demand::BulkUpdateCommand, forecasting::ProcessForecastCommand, Command},
    errors::{ErrorKind, ServiceError},
    forecasting::{ForecastAggregator, SERVICE_LEVEL_Z},
    models::DemandScope,
    repositories::DemandStore,
};
use rstest::rstest;

use common::{event_channel, january_p1_dataset, sample_dataset, seeded_sqlite_store, sqlite_store};

#[tokio::test]
async fn import_populates_every_table() {
    let store = seeded_sqlite_store(sample_dataset()).await;

    assert_eq!(store.original_demand().await.unwrap().len(), 7);
    assert_eq!(store.working_demand().await.unwrap().len(), 7);
    assert_eq!(store.product_parameters().await.unwrap().len(), 2);
    // P1: Jan, Feb. P2: Jan, Feb, Mar.
    assert_eq!(store.read_aggregate().await.unwrap().len(), 5);
    assert!(store.update_history().await.unwrap().is_empty());
}

#[rstest]
#[case(None, None, None, 7)]
#[case(Some("2024-01"), None, None, 4)]
#[case(None, Some("P1"), None, 4)]
#[case(None, None, Some("C1"), 4)]
#[case(Some("2024-01"), Some("P1"), None, 3)]
#[case(Some("2024-01"), None, Some("C1"), 2)]
#[case(None, Some("P2"), Some("C1"), 2)]
#[case(Some("2024-01"), Some("P1"), Some("C2"), 1)]
#[tokio::test]
async fn update_count_matches_scope(
    #[case] month: Option<&str>,
    #[case] product: Option<&str>,
    #[case] customer: Option<&str>,
    #[case] expected: u64,
) {
    let store = seeded_sqlite_store(sample_dataset()).await;
    let before = store.working_demand().await.unwrap();
    let scope = DemandScope::from_filters(month, product, customer).unwrap();
    let (events, _rx) = event_channel();

    let result = BulkUpdateCommand::new(scope.clone(), 10.0, "seasonal uplift")
        .execute(store.clone(), events)
        .await
        .unwrap();
    assert_eq!(result.records_affected, expected);

    let after = store.working_demand().await.unwrap();
    let changed = before
        .iter()
        .zip(&after)
        .filter(|(old, new)| (old.quantity - new.quantity).abs() > 1e-9)
        .count() as u64;
    assert_eq!(changed, expected);
    for (old, new) in before.iter().zip(&after) {
        let factor = if scope.matches(old) { 1.1 } else { 1.0 };
        assert!((new.quantity - old.quantity * factor).abs() < 1e-9);
    }

    let history = store.update_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].records_affected, expected as i64);
    assert_eq!(history[0].id, result.history_id);

    assert_eq!(store.read_aggregate().await.unwrap(), ForecastAggregator::rebuild(&after));
}

#[tokio::test]
async fn no_match_rolls_back() {
    let store = seeded_sqlite_store(sample_dataset()).await;
    let working = store.working_demand().await.unwrap();
    let aggregate = store.read_aggregate().await.unwrap();
    let (events, _rx) = event_channel();

    let err = BulkUpdateCommand::new(DemandScope::all().with_product("missing"), 10.0, "noop")
        .execute(store.clone(), events)
        .await
        .unwrap_err();

    assert_matches!(&err, ServiceError::NotFound(msg) if msg == "No records match the specified criteria");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.working_demand().await.unwrap(), working);
    assert_eq!(store.read_aggregate().await.unwrap(), aggregate);
    assert!(store.update_history().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_database_reports_no_records() {
    let store = sqlite_store().await;
    let (events, _rx) = event_channel();
    let err = BulkUpdateCommand::new(DemandScope::all(), 10.0, "noop")
        .execute(store, events)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(msg) if msg == "No records found in working demand");
}

#[tokio::test]
async fn adjustment_then_forecast_end_to_end() {
    let store = seeded_sqlite_store(january_p1_dataset()).await;
    let (events, _rx) = event_channel();

    let update = BulkUpdateCommand::new(
        DemandScope::from_filters(Some("2024-01"), Some("P1"), None).unwrap(),
        10.0,
        "promo",
    )
    .execute(store.clone(), events.clone())
    .await
    .unwrap();
    assert_eq!(update.records_affected, 3);

    let quantities: Vec<f64> = store
        .working_demand()
        .await
        .unwrap()
        .iter()
        .map(|r| r.quantity)
        .collect();
    for (got, want) in quantities.iter().zip([110.0, 132.0, 88.0]) {
        assert!((got - want).abs() < 1e-9, "{got} != {want}");
    }

    let aggregate = store.read_aggregate().await.unwrap();
    assert_eq!(aggregate.len(), 1);
    assert!((aggregate[0].quantity - 330.0).abs() < 1e-9);
    assert_eq!(aggregate[0].period.to_string(), "2024-01-01");

    let run = ProcessForecastCommand::default()
        .execute(store.clone(), events)
        .await
        .unwrap();
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.parameters_written, 1);

    let params = store.product_parameters().await.unwrap();
    let p1 = &params[0];
    assert!((p1.forecast - 330.0).abs() < 1e-9);
    assert!((p1.dmd_stdev - 0.001).abs() < 1e-12);
    assert!((p1.dl - 660.0).abs() < 1e-9);
    assert!((p1.eoq.unwrap() - 13200f64.sqrt()).abs() < 1e-9);
    let ss = SERVICE_LEVEL_Z * 0.001 * 2f64.sqrt();
    assert!((p1.ss.unwrap() - ss).abs() < 1e-12);
    assert!((p1.rop.unwrap() - (660.0 + ss)).abs() < 1e-9);
}

#[tokio::test]
async fn batch_size_smaller_than_dataset_still_imports_everything() {
    // the store writes in chunks of three
    let mut dataset = sample_dataset();
    let extra = dataset.demand.clone();
    dataset.demand.extend(extra);

    let store = seeded_sqlite_store(dataset).await;
    assert_eq!(store.working_demand().await.unwrap().len(), 14);
    let total: f64 = store.read_aggregate().await.unwrap().iter().map(|a| a.quantity).sum();
    assert!((total - 2.0 * 570.0).abs() < 1e-9);
}

#[tokio::test]
async fn committed_changes_survive_reconnect() {
    use demand_planner::{
        db::{self, DbConfig},
        repositories::SeaOrmDemandStore,
    };
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("planner.db").display());
    let config = DbConfig {
        url,
        max_connections: 1,
        min_connections: 1,
        ..DbConfig::default()
    };

    {
        let pool = db::establish_connection_with_config(&config).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let store = Arc::new(SeaOrmDemandStore::new(Arc::new(pool)));
        common::import(store.clone(), sample_dataset()).await;
        let (events, _rx) = event_channel();
        BulkUpdateCommand::new(DemandScope::all().with_customer("C3"), 25.0, "key account")
            .execute(store, events)
            .await
            .unwrap();
    }

    let pool = db::establish_connection_with_config(&config).await.unwrap();
    let store = SeaOrmDemandStore::new(Arc::new(pool));
    let history = store.update_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].records_affected, 1);
    let c3 = store
        .working_demand()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.customer_id == "C3")
        .unwrap();
    assert!((c3.quantity - 100.0).abs() < 1e-9);
}
