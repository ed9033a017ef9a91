use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::{product_row, DemandStore, DemandUnitOfWork, ParameterUpdate};
use crate::db::DbPool;
use crate::entities::{
    forecast_aggregate, original_demand, product_parameters, update_history, working_demand,
};
use crate::errors::ServiceError;
use crate::models::{DemandScope, NewDemandRecord, NewProduct};

const DEFAULT_BATCH_SIZE: usize = 1000;

/// [`DemandStore`] backed by a SeaORM connection pool (Postgres or SQLite).
#[derive(Debug, Clone)]
pub struct SeaOrmDemandStore {
    db: Arc<DbPool>,
    batch_size: usize,
}

impl SeaOrmDemandStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self {
            db,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows per multi-row INSERT statement
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl DemandStore for SeaOrmDemandStore {
    async fn begin(&self) -> Result<Box<dyn DemandUnitOfWork>, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            counter!("demand_planner_db.transaction.begin_failures", 1);
            ServiceError::DatabaseError(e)
        })?;
        counter!("demand_planner_db.transaction.started", 1);

        Ok(Box::new(SeaOrmUnitOfWork {
            txn,
            batch_size: self.batch_size,
            started: Instant::now(),
        }))
    }

    async fn read_aggregate(&self) -> Result<Vec<forecast_aggregate::Model>, ServiceError> {
        forecast_aggregate::Entity::find()
            .order_by_asc(forecast_aggregate::Column::Period)
            .order_by_asc(forecast_aggregate::Column::ProductId)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn product_parameters(&self) -> Result<Vec<product_parameters::Model>, ServiceError> {
        product_parameters::Entity::find()
            .order_by_asc(product_parameters::Column::ProductId)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn update_history(&self) -> Result<Vec<update_history::Model>, ServiceError> {
        update_history::Entity::find()
            .order_by_desc(update_history::Column::CreatedAt)
            .order_by_desc(update_history::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn working_demand(&self) -> Result<Vec<working_demand::Model>, ServiceError> {
        working_demand::Entity::find()
            .order_by_asc(working_demand::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn original_demand(&self) -> Result<Vec<original_demand::Model>, ServiceError> {
        original_demand::Entity::find()
            .order_by_asc(original_demand::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

/// Unit of work over one open database transaction.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct SeaOrmUnitOfWork {
    txn: DatabaseTransaction,
    batch_size: usize,
    started: Instant,
}

#[async_trait]
impl DemandUnitOfWork for SeaOrmUnitOfWork {
    async fn count_scope(&mut self, scope: &DemandScope) -> Result<u64, ServiceError> {
        working_demand::Entity::find()
            .filter(scope.condition())
            .count(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn scale_scope(
        &mut self,
        scope: &DemandScope,
        multiplier: f64,
        modified_at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let result = working_demand::Entity::update_many()
            .col_expr(
                working_demand::Column::Quantity,
                Expr::col(working_demand::Column::Quantity).mul(multiplier),
            )
            .col_expr(working_demand::Column::ModifiedAt, Expr::value(modified_at))
            .filter(scope.condition())
            .exec(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        debug!(rows = result.rows_affected, "Scaled working demand");
        Ok(result.rows_affected)
    }

    async fn append_audit(&mut self, entry: update_history::Model) -> Result<(), ServiceError> {
        let active = update_history::ActiveModel {
            id: Set(entry.id),
            month_year: Set(entry.month_year),
            product_id: Set(entry.product_id),
            customer_id: Set(entry.customer_id),
            percentage: Set(entry.percentage),
            description: Set(entry.description),
            records_affected: Set(entry.records_affected),
            change_summary: Set(entry.change_summary),
            created_at: Set(entry.created_at),
        };

        update_history::Entity::insert(active)
            .exec_without_returning(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    async fn working_rows(&mut self) -> Result<Vec<working_demand::Model>, ServiceError> {
        working_demand::Entity::find()
            .order_by_asc(working_demand::Column::Id)
            .all(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn aggregate_rows(&mut self) -> Result<Vec<forecast_aggregate::Model>, ServiceError> {
        forecast_aggregate::Entity::find()
            .order_by_asc(forecast_aggregate::Column::Period)
            .order_by_asc(forecast_aggregate::Column::ProductId)
            .all(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn parameter_rows(&mut self) -> Result<Vec<product_parameters::Model>, ServiceError> {
        product_parameters::Entity::find()
            .order_by_asc(product_parameters::Column::ProductId)
            .all(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn replace_aggregate(
        &mut self,
        rows: Vec<forecast_aggregate::Model>,
    ) -> Result<u64, ServiceError> {
        let deleted = forecast_aggregate::Entity::delete_many()
            .exec(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        debug!(rows = deleted.rows_affected, "Cleared forecast aggregate");

        let mut inserted = 0u64;
        for chunk in rows.chunks(self.batch_size) {
            let models = chunk.iter().map(|row| forecast_aggregate::ActiveModel {
                period: Set(row.period),
                product_id: Set(row.product_id.clone()),
                product_name: Set(row.product_name.clone()),
                quantity: Set(row.quantity),
            });
            forecast_aggregate::Entity::insert_many(models)
                .exec_without_returning(&self.txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            inserted += chunk.len() as u64;
        }

        Ok(inserted)
    }

    async fn write_parameters(&mut self, updates: &[ParameterUpdate]) -> Result<u64, ServiceError> {
        let mut written = 0u64;
        for update in updates {
            let result = product_parameters::Entity::update_many()
                .col_expr(product_parameters::Column::Forecast, Expr::value(update.forecast))
                .col_expr(product_parameters::Column::DmdStdev, Expr::value(update.dmd_stdev))
                .col_expr(product_parameters::Column::Dl, Expr::value(update.dl))
                .col_expr(product_parameters::Column::Eoq, Expr::value(update.eoq))
                .col_expr(product_parameters::Column::Ss, Expr::value(update.ss))
                .col_expr(product_parameters::Column::Rop, Expr::value(update.rop))
                .col_expr(
                    product_parameters::Column::UpdatedAt,
                    Expr::value(update.updated_at),
                )
                .filter(product_parameters::Column::ProductId.eq(update.product_id.clone()))
                .exec(&self.txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            if result.rows_affected == 0 {
                warn!(product_id = %update.product_id, "No product row to update");
            }
            written += result.rows_affected;
        }
        Ok(written)
    }

    async fn reset_dataset(&mut self) -> Result<(), ServiceError> {
        original_demand::Entity::delete_many()
            .exec(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        working_demand::Entity::delete_many()
            .exec(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        product_parameters::Entity::delete_many()
            .exec(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        forecast_aggregate::Entity::delete_many()
            .exec(&self.txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    async fn insert_demand(
        &mut self,
        records: &[NewDemandRecord],
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let mut inserted = 0u64;
        for chunk in records.chunks(self.batch_size) {
            let originals = chunk.iter().map(|r| original_demand::ActiveModel {
                demand_date: Set(r.demand_date),
                product_id: Set(r.product_id.clone()),
                product_name: Set(r.product_name.clone()),
                customer_id: Set(r.customer_id.clone()),
                customer_name: Set(r.customer_name.clone()),
                quantity: Set(r.quantity),
                created_at: Set(now),
                modified_at: Set(now),
                ..Default::default()
            });
            original_demand::Entity::insert_many(originals)
                .exec_without_returning(&self.txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            let working = chunk.iter().map(|r| working_demand::ActiveModel {
                demand_date: Set(r.demand_date),
                product_id: Set(r.product_id.clone()),
                product_name: Set(r.product_name.clone()),
                customer_id: Set(r.customer_id.clone()),
                customer_name: Set(r.customer_name.clone()),
                quantity: Set(r.quantity),
                created_at: Set(now),
                modified_at: Set(now),
                ..Default::default()
            });
            working_demand::Entity::insert_many(working)
                .exec_without_returning(&self.txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            inserted += chunk.len() as u64;
        }
        Ok(inserted)
    }

    async fn insert_products(
        &mut self,
        products: &[NewProduct],
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let mut inserted = 0u64;
        for chunk in products.chunks(self.batch_size) {
            let models = chunk.iter().map(|p| {
                let row = product_row(p, now);
                product_parameters::ActiveModel {
                    product_id: Set(row.product_id),
                    product_name: Set(row.product_name),
                    cost: Set(row.cost),
                    lead_time_months: Set(row.lead_time_months),
                    ordering_cost: Set(row.ordering_cost),
                    holding_cost: Set(row.holding_cost),
                    eoq: Set(row.eoq),
                    rop: Set(row.rop),
                    ss: Set(row.ss),
                    dl: Set(row.dl),
                    forecast: Set(row.forecast),
                    dmd_stdev: Set(row.dmd_stdev),
                    updated_at: Set(row.updated_at),
                }
            });
            product_parameters::Entity::insert_many(models)
                .exec_without_returning(&self.txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            inserted += chunk.len() as u64;
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
        let started = self.started;
        match self.txn.commit().await {
            Ok(()) => {
                counter!("demand_planner_db.transaction.committed", 1);
                histogram!(
                    "demand_planner_db.transaction.duration_ms",
                    started.elapsed().as_secs_f64() * 1000.0
                );
                Ok(())
            }
            Err(e) => {
                counter!("demand_planner_db.transaction.commit_failures", 1);
                Err(ServiceError::DatabaseError(e))
            }
        }
    }

    async fn rollback(self: Box<Self>) -> Result<(), ServiceError> {
        counter!("demand_planner_db.transaction.rolled_back", 1);
        self.txn
            .rollback()
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
