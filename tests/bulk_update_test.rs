mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use demand_planner::{
    commands::{demand::BulkUpdateCommand, Command},
    errors::{ErrorKind, ServiceError},
    events::Event,
    forecasting::ForecastAggregator,
    models::DemandScope,
    repositories::{DemandStore, FailPoint},
};
use rstest::rstest;

use common::{event_channel, january_p1_dataset, memory_store, sample_dataset};

fn bulk(month: Option<&str>, product: Option<&str>, customer: Option<&str>, pct: f64) -> BulkUpdateCommand {
    BulkUpdateCommand {
        month_year: month.map(str::to_string),
        product_id: product.map(str::to_string),
        customer_id: customer.map(str::to_string),
        percentage: pct,
        description: "planner adjustment".to_string(),
    }
}

#[rstest]
#[case::no_filters(None, None, None, 7)]
#[case::month(Some("2024-01"), None, None, 4)]
#[case::product(None, Some("P1"), None, 4)]
#[case::customer(None, None, Some("C1"), 4)]
#[case::month_product(Some("2024-01"), Some("P1"), None, 3)]
#[case::month_customer(Some("2024-01"), None, Some("C1"), 2)]
#[case::product_customer(None, Some("P2"), Some("C1"), 2)]
#[case::all_filters(Some("2024-01"), Some("P1"), Some("C2"), 1)]
#[tokio::test]
async fn scales_exactly_the_rows_in_scope(
    #[case] month: Option<&str>,
    #[case] product: Option<&str>,
    #[case] customer: Option<&str>,
    #[case] expected: u64,
) {
    let store = memory_store(sample_dataset()).await;
    let before = store.snapshot().await;
    let (events, _rx) = event_channel();

    let command = bulk(month, product, customer, 10.0);
    let scope = DemandScope::from_filters(month, product, customer).unwrap();
    let result = command.execute(store.clone(), events).await.unwrap();

    assert_eq!(result.records_affected, expected);
    assert!((result.multiplier - 1.1).abs() < 1e-12);

    let after = store.snapshot().await;
    for (old, new) in before.working_demand.iter().zip(&after.working_demand) {
        assert_eq!(old.id, new.id);
        if scope.matches(old) {
            assert!((new.quantity - old.quantity * 1.1).abs() < 1e-9);
            assert_eq!(new.modified_at, result.committed_at);
        } else {
            assert_eq!(new, old);
        }
    }

    // original demand is never touched by an adjustment
    assert_eq!(after.original_demand, before.original_demand);
}

#[rstest]
#[case::unknown_product(None, Some("P9"), None)]
#[case::empty_month(Some("2023-12"), None, None)]
#[case::disjoint_filters(Some("2024-03"), Some("P1"), None)]
#[tokio::test]
async fn zero_match_leaves_every_table_unchanged(
    #[case] month: Option<&str>,
    #[case] product: Option<&str>,
    #[case] customer: Option<&str>,
) {
    let store = memory_store(sample_dataset()).await;
    let before = store.snapshot().await;
    let (events, mut rx) = event_channel();

    let err = bulk(month, product, customer, 15.0)
        .execute(store.clone(), events)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.snapshot().await, before);
    assert!(rx.try_recv().is_err(), "no event for an aborted update");
}

#[tokio::test]
async fn empty_working_table_is_not_found() {
    let store = Arc::new(demand_planner::repositories::InMemoryDemandStore::new());
    let (events, _rx) = event_channel();
    let err = bulk(None, None, None, 5.0)
        .execute(store, events)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(msg) if msg.contains("No records"));
}

#[rstest]
#[case(0.0, "planner adjustment")]
#[case(-100.01, "planner adjustment")]
#[case(10.0, "")]
#[case(10.0, "   ")]
#[tokio::test]
async fn invalid_input_is_rejected_before_any_mutation(#[case] pct: f64, #[case] description: &str) {
    let store = memory_store(sample_dataset()).await;
    let before = store.snapshot().await;
    let (events, _rx) = event_channel();

    let mut command = bulk(None, None, None, pct);
    command.description = description.to_string();
    let err = command.execute(store.clone(), events).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(store.snapshot().await, before);
}

#[tokio::test]
async fn malformed_month_is_invalid_argument() {
    let store = memory_store(sample_dataset()).await;
    let (events, _rx) = event_channel();
    let err = bulk(Some("2024-13"), None, None, 10.0)
        .execute(store, events)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[rstest]
#[case(FailPoint::Count)]
#[case(FailPoint::Scale)]
#[case(FailPoint::Audit)]
#[case(FailPoint::ReadWorking)]
#[case(FailPoint::ReplaceAggregate)]
#[case(FailPoint::Commit)]
#[tokio::test]
async fn failure_at_any_step_rolls_back_everything(#[case] point: FailPoint) {
    let store = memory_store(sample_dataset()).await;
    let before = store.snapshot().await;
    store.fail_at(Some(point)).await;
    let (events, mut rx) = event_channel();

    let err = bulk(Some("2024-01"), None, None, 20.0)
        .execute(store.clone(), events)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::TransactionFailed(_));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(store.snapshot().await, before);
    assert!(rx.try_recv().is_err());

    // the store is usable again once the fault clears
    store.fail_at(None).await;
    let (events, _rx) = event_channel();
    bulk(Some("2024-01"), None, None, 20.0)
        .execute(store.clone(), events)
        .await
        .unwrap();
    assert_eq!(store.snapshot().await.update_history.len(), 1);
}

#[rstest]
#[case(FailPoint::Count, "Counting:")]
#[case(FailPoint::Scale, "Updating:")]
#[case(FailPoint::Audit, "Auditing:")]
#[case(FailPoint::ReplaceAggregate, "RebuildingAggregate:")]
#[case(FailPoint::Commit, "Committing:")]
#[tokio::test]
async fn failure_names_the_step_that_failed(#[case] point: FailPoint, #[case] prefix: &str) {
    let store = memory_store(sample_dataset()).await;
    store.fail_at(Some(point)).await;
    let (events, _rx) = event_channel();

    let err = bulk(None, Some("P1"), None, 5.0)
        .execute(store, events)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::TransactionFailed(msg) if msg.starts_with(prefix));
}

#[tokio::test]
async fn empty_scope_conserves_total_times_multiplier() {
    let store = memory_store(sample_dataset()).await;
    let total_before: f64 = store.snapshot().await.working_demand.iter().map(|r| r.quantity).sum();
    let (events, _rx) = event_channel();

    bulk(None, None, None, -37.5).execute(store.clone(), events).await.unwrap();

    let total_after: f64 = store.snapshot().await.working_demand.iter().map(|r| r.quantity).sum();
    assert!((total_after - total_before * 0.625).abs() < 1e-9);
}

#[tokio::test]
async fn every_commit_appends_one_audit_entry() {
    let store = memory_store(sample_dataset()).await;
    let updates = [
        bulk(Some("2024-01"), None, None, 10.0),
        bulk(None, Some("P2"), None, -20.0),
        bulk(None, None, Some("C1"), 5.0),
    ];

    let mut affected = Vec::new();
    for update in &updates {
        let (events, _rx) = event_channel();
        affected.push(update.execute(store.clone(), events).await.unwrap().records_affected);
    }
    assert_eq!(affected, vec![4, 3, 4]);

    let history = store.update_history().await.unwrap();
    assert_eq!(history.len(), 3);
    // newest first
    let recorded: Vec<i64> = history.iter().rev().map(|h| h.records_affected).collect();
    assert_eq!(recorded, vec![4, 3, 4]);
    assert_eq!(history[2].month_year.as_deref(), Some("2024-01"));
    assert_eq!(history[1].product_id.as_deref(), Some("P2"));
    assert_eq!(history[0].customer_id.as_deref(), Some("C1"));
    assert_eq!(
        history[1].change_summary,
        "scaled quantity by -20% (x0.8) where product_id = 'P2'"
    );
    assert!(history.iter().all(|h| h.description == "planner adjustment"));
}

#[tokio::test]
async fn aggregate_matches_working_table_after_update() {
    let store = memory_store(sample_dataset()).await;
    let (events, _rx) = event_channel();
    bulk(Some("2024-02"), None, None, 50.0).execute(store.clone(), events).await.unwrap();

    let working = store.working_demand().await.unwrap();
    let aggregate = store.read_aggregate().await.unwrap();
    assert_eq!(aggregate, ForecastAggregator::rebuild(&working));

    let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let p1_feb = aggregate
        .iter()
        .find(|a| a.period == feb && a.product_id == "P1")
        .unwrap();
    assert!((p1_feb.quantity - 135.0).abs() < 1e-9);
}

#[tokio::test]
async fn committed_update_publishes_event() {
    let store = memory_store(january_p1_dataset()).await;
    let (events, mut rx) = event_channel();

    let result = bulk(None, None, None, 10.0).execute(store, events).await.unwrap();

    assert_matches!(
        rx.recv().await,
        Some(Event::DemandBulkUpdated { history_id, records_affected: 3, .. }) if history_id == result.history_id
    );
}

#[tokio::test]
async fn minus_hundred_percent_zeroes_quantities() {
    let store = memory_store(january_p1_dataset()).await;
    let (events, _rx) = event_channel();
    let result = bulk(None, None, None, -100.0).execute(store.clone(), events).await.unwrap();
    assert_eq!(result.records_affected, 3);
    assert!(store
        .snapshot()
        .await
        .working_demand
        .iter()
        .all(|r| r.quantity == 0.0));
}

#[tokio::test]
async fn concurrent_updates_serialize() {
    let store = memory_store(january_p1_dataset()).await;
    let (events, _rx) = event_channel();

    let runs = (0..8).map(|_| {
        let store = store.clone();
        let events = events.clone();
        async move {
            bulk(None, None, None, 10.0)
                .execute(store, events)
                .await
        }
    });
    let results = futures::future::join_all(runs).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let tables = store.snapshot().await;
    assert_eq!(tables.update_history.len(), 8);
    let expected = 100.0 * 1.1f64.powi(8);
    assert!((tables.working_demand[0].quantity - expected).abs() < 1e-6);
}
