#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use demand_planner::{
    commands::{demand::ImportDatasetCommand, Command},
    db::{self, DbConfig},
    events::{Event, EventSender},
    models::{DemandDataset, NewDemandRecord, NewProduct},
    repositories::{DemandStore, InMemoryDemandStore, SeaOrmDemandStore},
};
use tokio::sync::mpsc;

pub fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("valid RFC 3339 timestamp")
}

pub fn demand(date: &str, product: &str, customer: &str, quantity: f64) -> NewDemandRecord {
    NewDemandRecord {
        demand_date: ts(date),
        product_id: product.to_string(),
        product_name: format!("Product {}", product),
        customer_id: customer.to_string(),
        customer_name: format!("Customer {}", customer),
        quantity,
    }
}

pub fn product(id: &str, lead_time_months: f64, ordering_cost: f64, holding_cost: f64) -> NewProduct {
    NewProduct {
        product_id: id.to_string(),
        product_name: format!("Product {}", id),
        cost: 10.0,
        lead_time_months,
        ordering_cost,
        holding_cost,
        eoq: None,
        rop: None,
        ss: None,
        dl: None,
        forecast: None,
        dmd_stdev: None,
    }
}

/// Seven rows over two products, three customers and three months.
pub fn sample_dataset() -> DemandDataset {
    DemandDataset {
        demand: vec![
            demand("2024-01-05T04:00:00Z", "P1", "C1", 100.0),
            demand("2024-01-12T04:00:00Z", "P1", "C2", 120.0),
            demand("2024-01-20T04:00:00Z", "P1", "C3", 80.0),
            demand("2024-02-03T04:00:00Z", "P1", "C1", 90.0),
            demand("2024-01-08T04:00:00Z", "P2", "C1", 50.0),
            demand("2024-02-14T04:00:00Z", "P2", "C2", 60.0),
            demand("2024-03-02T04:00:00Z", "P2", "C1", 70.0),
        ],
        products: vec![product("P1", 2.0, 50.0, 2.5), product("P2", 1.0, 20.0, 0.0)],
    }
}

/// Single product, single month: quantities 100, 120 and 80.
pub fn january_p1_dataset() -> DemandDataset {
    DemandDataset {
        demand: vec![
            demand("2024-01-03T04:00:00Z", "P1", "C1", 100.0),
            demand("2024-01-10T04:00:00Z", "P1", "C2", 120.0),
            demand("2024-01-24T04:00:00Z", "P1", "C3", 80.0),
        ],
        products: vec![product("P1", 2.0, 50.0, 2.5)],
    }
}

pub fn event_channel() -> (Arc<EventSender>, mpsc::Receiver<Event>) {
    let (sender, rx) = EventSender::channel(64);
    (Arc::new(sender), rx)
}

pub async fn import(store: Arc<dyn DemandStore>, dataset: DemandDataset) {
    let (events, _rx) = event_channel();
    ImportDatasetCommand::new(dataset)
        .execute(store, events)
        .await
        .expect("dataset import should succeed");
}

pub async fn memory_store(dataset: DemandDataset) -> Arc<InMemoryDemandStore> {
    let store = Arc::new(InMemoryDemandStore::new());
    import(store.clone(), dataset).await;
    store
}

/// Fresh in-memory SQLite database with the schema applied.
pub async fn sqlite_store() -> Arc<SeaOrmDemandStore> {
    let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
        .await
        .expect("in-memory sqlite should connect");
    db::run_migrations(&pool)
        .await
        .expect("migrations should apply");
    Arc::new(SeaOrmDemandStore::new(Arc::new(pool)).with_batch_size(3))
}

pub async fn seeded_sqlite_store(dataset: DemandDataset) -> Arc<SeaOrmDemandStore> {
    let store = sqlite_store().await;
    import(store.clone(), dataset).await;
    store
}
