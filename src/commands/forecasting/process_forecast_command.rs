use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    commands::Command,
    errors::ServiceError,
    events::{Event, EventSender},
    forecasting::HuberEstimator,
    repositories::DemandStore,
    services::forecasting::{ForecastProcessor, ForecastRun},
};

/// Recomputes forecast, demand deviation and inventory parameters for every
/// product in the aggregate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessForecastCommand {
    /// Overrides the Huber tuning constant
    #[serde(default)]
    pub tuning_constant: Option<f64>,
}

#[async_trait]
impl Command for ProcessForecastCommand {
    type Result = ForecastRun;

    #[instrument(skip(self, store, event_sender))]
    async fn execute(
        &self,
        store: Arc<dyn DemandStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let mut estimator = HuberEstimator::default();
        if let Some(k) = self.tuning_constant {
            if !(k.is_finite() && k > 0.0) {
                return Err(ServiceError::ValidationError(format!(
                    "Tuning constant must be a positive number, got {}",
                    k
                )));
            }
            estimator.k = k;
        }

        info!("Running forecast processing");
        let run = ForecastProcessor::new(estimator).run(store.as_ref()).await?;

        event_sender
            .send_or_log(Event::ForecastProcessed {
                products_processed: run.results.len(),
                parameters_written: run.parameters_written,
                timestamp: run.processed_at,
            })
            .await;

        Ok(run)
    }
}
