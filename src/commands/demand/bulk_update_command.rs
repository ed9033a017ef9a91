use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    commands::Command,
    entities::update_history,
    errors::ServiceError,
    events::{Event, EventSender},
    forecasting::ForecastAggregator,
    models::DemandScope,
    repositories::{DemandStore, DemandUnitOfWork},
};

/// Transactional steps of a bulk adjustment, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BulkUpdateStage {
    Beginning,
    Counting,
    Updating,
    Auditing,
    RebuildingAggregate,
    Committing,
}

/// Scales the quantity of every working-demand row in scope by
/// `1 + percentage / 100`, records the change in `update_history` and rebuilds
/// `forecast_aggregate`, all in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkUpdateCommand {
    /// `YYYY-MM`
    #[serde(default)]
    pub month_year: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[validate(custom = "validate_percentage")]
    pub percentage: f64,
    #[validate(custom = "validate_description")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateResult {
    pub history_id: Uuid,
    pub records_affected: u64,
    pub change_summary: String,
    pub multiplier: f64,
    pub aggregate_rows: u64,
    pub committed_at: DateTime<Utc>,
}

#[async_trait]
impl Command for BulkUpdateCommand {
    type Result = BulkUpdateResult;

    #[instrument(skip(self, store, event_sender), fields(percentage = self.percentage))]
    async fn execute(
        &self,
        store: Arc<dyn DemandStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let started = std::time::Instant::now();

        self.validate().map_err(|e| {
            counter!("demand_planner.bulk_update.rejected", 1);
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let scope = DemandScope::from_filters(
            self.month_year.as_deref(),
            self.product_id.as_deref(),
            self.customer_id.as_deref(),
        )
        .map_err(|e| {
            counter!("demand_planner.bulk_update.rejected", 1);
            e
        })?;

        let multiplier = self.multiplier();
        let now = Utc::now();

        let mut uow = store
            .begin()
            .await
            .map_err(|e| e.in_transaction(BulkUpdateStage::Beginning))?;

        let outcome = self.apply(uow.as_mut(), &scope, multiplier, now).await;

        let result = match outcome {
            Ok(result) => {
                uow.commit().await.map_err(|e| {
                    warn!(scope = %scope, "Bulk update commit failed: {}", e);
                    counter!("demand_planner.bulk_update.aborted", 1);
                    e.in_transaction(BulkUpdateStage::Committing)
                })?;
                result
            }
            Err((stage, err)) => {
                warn!(stage = %stage, scope = %scope, "Bulk update aborted: {}", err);
                if let Err(rollback_err) = uow.rollback().await {
                    error!("Rollback after failed bulk update also failed: {}", rollback_err);
                }
                counter!("demand_planner.bulk_update.aborted", 1);
                return Err(err.in_transaction(stage));
            }
        };

        counter!("demand_planner.bulk_update.committed", 1);
        counter!(
            "demand_planner.bulk_update.records_affected",
            result.records_affected
        );
        histogram!(
            "demand_planner.bulk_update.duration_ms",
            started.elapsed().as_secs_f64() * 1000.0
        );

        info!(
            history_id = %result.history_id,
            records_affected = result.records_affected,
            "Bulk update committed: {}",
            result.change_summary
        );

        event_sender
            .send_or_log(Event::DemandBulkUpdated {
                history_id: result.history_id,
                records_affected: result.records_affected,
                percentage: self.percentage,
                change_summary: result.change_summary.clone(),
                timestamp: now,
            })
            .await;

        Ok(result)
    }
}

impl BulkUpdateCommand {
    pub fn new(scope: DemandScope, percentage: f64, description: impl Into<String>) -> Self {
        Self {
            month_year: scope.month.map(|m| m.to_string()),
            product_id: scope.product_id,
            customer_id: scope.customer_id,
            percentage,
            description: description.into(),
        }
    }

    pub fn multiplier(&self) -> f64 {
        1.0 + self.percentage / 100.0
    }

    /// Runs every step inside the open unit of work. On failure the stage
    /// that failed is returned alongside the error.
    async fn apply(
        &self,
        uow: &mut dyn DemandUnitOfWork,
        scope: &DemandScope,
        multiplier: f64,
        now: DateTime<Utc>,
    ) -> Result<BulkUpdateResult, (BulkUpdateStage, ServiceError)> {
        let count = uow
            .count_scope(scope)
            .await
            .map_err(|e| (BulkUpdateStage::Counting, e))?;

        if count == 0 {
            let msg = if scope.is_unbounded() {
                "No records found in working demand".to_string()
            } else {
                "No records match the specified criteria".to_string()
            };
            return Err((BulkUpdateStage::Counting, ServiceError::NotFound(msg)));
        }

        let updated = uow
            .scale_scope(scope, multiplier, now)
            .await
            .map_err(|e| (BulkUpdateStage::Updating, e))?;

        if updated != count {
            return Err((
                BulkUpdateStage::Updating,
                ServiceError::TransactionFailed(format!(
                    "expected to update {} rows, store reported {}",
                    count, updated
                )),
            ));
        }

        let change_summary = scope.change_summary(self.percentage, multiplier);
        let history_id = Uuid::new_v4();
        let entry = update_history::Model {
            id: history_id,
            month_year: scope.month.map(|m| m.to_string()),
            product_id: scope.product_id.clone(),
            customer_id: scope.customer_id.clone(),
            percentage: self.percentage,
            description: self.description.trim().to_string(),
            records_affected: i64::try_from(updated).unwrap_or(i64::MAX),
            change_summary: change_summary.clone(),
            created_at: now,
        };

        uow.append_audit(entry)
            .await
            .map_err(|e| (BulkUpdateStage::Auditing, e))?;

        let working = uow
            .working_rows()
            .await
            .map_err(|e| (BulkUpdateStage::RebuildingAggregate, e))?;
        let aggregate = ForecastAggregator::rebuild(&working);
        let aggregate_rows = uow
            .replace_aggregate(aggregate)
            .await
            .map_err(|e| (BulkUpdateStage::RebuildingAggregate, e))?;

        Ok(BulkUpdateResult {
            history_id,
            records_affected: updated,
            change_summary,
            multiplier,
            aggregate_rows,
            committed_at: now,
        })
    }
}

fn validate_percentage(percentage: f64) -> Result<(), ValidationError> {
    let message = if !percentage.is_finite() {
        "Percentage must be a finite number"
    } else if percentage == 0.0 {
        "Percentage cannot be zero"
    } else if percentage < -100.0 {
        "Percentage cannot be less than -100%"
    } else {
        return Ok(());
    };

    let mut err = ValidationError::new("percentage");
    err.message = Some(message.into());
    Err(err)
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.trim().is_empty() {
        let mut err = ValidationError::new("description");
        err.message = Some("Description is required".into());
        return Err(err);
    }
    Ok(())
}
