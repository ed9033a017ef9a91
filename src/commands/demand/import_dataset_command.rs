use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    commands::Command,
    errors::ServiceError,
    events::{Event, EventSender},
    forecasting::ForecastAggregator,
    models::DemandDataset,
    repositories::{DemandStore, DemandUnitOfWork},
};

/// Replaces the whole demand dataset: both demand tables, the product
/// parameters and the aggregate. The audit log survives the reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDatasetCommand {
    pub dataset: DemandDataset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDatasetResult {
    pub records_processed: u64,
    pub product_records_processed: u64,
    pub aggregate_rows: u64,
}

#[async_trait]
impl Command for ImportDatasetCommand {
    type Result = ImportDatasetResult;

    #[instrument(skip(self, store, event_sender), fields(
        demand_rows = self.dataset.demand.len(),
        product_rows = self.dataset.products.len()
    ))]
    async fn execute(
        &self,
        store: Arc<dyn DemandStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let dataset = self.dataset.clone().normalized();
        dataset.validate_rows().map_err(|e| {
            counter!("demand_planner.import.rejected", 1);
            error!("Dataset rejected: {}", e);
            e
        })?;

        let mut uow = store.begin().await.map_err(|e| e.in_transaction("Begin"))?;

        let result = match load(uow.as_mut(), &dataset).await {
            Ok(result) => {
                uow.commit().await.map_err(|e| e.in_transaction("Commit"))?;
                result
            }
            Err(e) => {
                warn!("Dataset import aborted: {}", e);
                if let Err(rollback_err) = uow.rollback().await {
                    error!("Rollback after failed import also failed: {}", rollback_err);
                }
                return Err(e.in_transaction("Import"));
            }
        };

        counter!("demand_planner.import.records", result.records_processed);
        info!(
            records_processed = result.records_processed,
            product_records_processed = result.product_records_processed,
            "Successfully processed {} demand records and {} product records",
            result.records_processed,
            result.product_records_processed
        );

        event_sender
            .send_or_log(Event::DemandDatasetImported {
                records_processed: result.records_processed,
                product_records_processed: result.product_records_processed,
                aggregate_rows: result.aggregate_rows,
                timestamp: Utc::now(),
            })
            .await;

        Ok(result)
    }
}

impl ImportDatasetCommand {
    pub fn new(dataset: DemandDataset) -> Self {
        Self { dataset }
    }
}

async fn load(
    uow: &mut dyn DemandUnitOfWork,
    dataset: &DemandDataset,
) -> Result<ImportDatasetResult, ServiceError> {
    let now = Utc::now();

    uow.reset_dataset().await?;
    let records_processed = uow.insert_demand(&dataset.demand, now).await?;
    let product_records_processed = uow.insert_products(&dataset.products, now).await?;

    let working = uow.working_rows().await?;
    let aggregate_rows = uow
        .replace_aggregate(ForecastAggregator::rebuild(&working))
        .await?;

    Ok(ImportDatasetResult {
        records_processed,
        product_records_processed,
        aggregate_rows,
    })
}
