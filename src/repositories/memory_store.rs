use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use serde::Serialize;
use std::sync::Arc;
use strum::Display;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{product_row, DemandStore, DemandUnitOfWork, ParameterUpdate};
use crate::entities::{
    forecast_aggregate, original_demand, product_parameters, update_history, working_demand,
};
use crate::errors::ServiceError;
use crate::models::{DemandScope, NewDemandRecord, NewProduct};

/// Full contents of the demand tables
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemandTables {
    pub original_demand: Vec<original_demand::Model>,
    pub working_demand: Vec<working_demand::Model>,
    pub forecast_aggregate: Vec<forecast_aggregate::Model>,
    pub product_parameters: Vec<product_parameters::Model>,
    pub update_history: Vec<update_history::Model>,
}

impl DemandTables {
    fn next_id(ids: impl Iterator<Item = i32>) -> i32 {
        ids.max().unwrap_or(0) + 1
    }
}

/// Store operation at which [`InMemoryDemandStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailPoint {
    Count,
    Scale,
    Audit,
    ReadWorking,
    ReplaceAggregate,
    WriteParameters,
    Reset,
    InsertDemand,
    InsertProducts,
    Commit,
}

/// [`DemandStore`] holding every table in memory.
///
/// A unit of work locks the tables for its whole lifetime and edits a staged
/// copy, so uncommitted changes are never observable and a failed or dropped
/// unit of work leaves the tables untouched.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDemandStore {
    tables: Arc<Mutex<DemandTables>>,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl InMemoryDemandStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: DemandTables) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables)),
            fail_point: Arc::default(),
        }
    }

    /// Makes every later unit of work fail when it reaches `point`.
    pub async fn fail_at(&self, point: Option<FailPoint>) {
        *self.fail_point.lock().await = point;
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> DemandTables {
        self.tables.lock().await.clone()
    }
}

#[async_trait]
impl DemandStore for InMemoryDemandStore {
    async fn begin(&self) -> Result<Box<dyn DemandUnitOfWork>, ServiceError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        let fail_point = *self.fail_point.lock().await;

        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            fail_point,
        }))
    }

    async fn read_aggregate(&self) -> Result<Vec<forecast_aggregate::Model>, ServiceError> {
        let mut rows = self.tables.lock().await.forecast_aggregate.clone();
        rows.sort_by(|a, b| (a.period, &a.product_id).cmp(&(b.period, &b.product_id)));
        Ok(rows)
    }

    async fn product_parameters(&self) -> Result<Vec<product_parameters::Model>, ServiceError> {
        let mut rows = self.tables.lock().await.product_parameters.clone();
        rows.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(rows)
    }

    async fn update_history(&self) -> Result<Vec<update_history::Model>, ServiceError> {
        let mut rows = self.tables.lock().await.update_history.clone();
        // stable sort keeps insertion order for equal timestamps, so reverse first
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn working_demand(&self) -> Result<Vec<working_demand::Model>, ServiceError> {
        let mut rows = self.tables.lock().await.working_demand.clone();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn original_demand(&self) -> Result<Vec<original_demand::Model>, ServiceError> {
        let mut rows = self.tables.lock().await.original_demand.clone();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<DemandTables>,
    staged: DemandTables,
    fail_point: Option<FailPoint>,
}

impl MemoryUnitOfWork {
    fn check(&self, point: FailPoint) -> Result<(), ServiceError> {
        if self.fail_point == Some(point) {
            debug!(%point, "Injected store failure");
            return Err(ServiceError::DatabaseError(DbErr::Custom(format!(
                "injected failure at {}",
                point
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl DemandUnitOfWork for MemoryUnitOfWork {
    async fn count_scope(&mut self, scope: &DemandScope) -> Result<u64, ServiceError> {
        self.check(FailPoint::Count)?;
        Ok(self
            .staged
            .working_demand
            .iter()
            .filter(|row| scope.matches(row))
            .count() as u64)
    }

    async fn scale_scope(
        &mut self,
        scope: &DemandScope,
        multiplier: f64,
        modified_at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        self.check(FailPoint::Scale)?;
        let mut changed = 0u64;
        for row in self
            .staged
            .working_demand
            .iter_mut()
            .filter(|row| scope.matches(row))
        {
            row.quantity *= multiplier;
            row.modified_at = modified_at;
            changed += 1;
        }
        Ok(changed)
    }

    async fn append_audit(&mut self, entry: update_history::Model) -> Result<(), ServiceError> {
        self.check(FailPoint::Audit)?;
        if self.staged.update_history.iter().any(|e| e.id == entry.id) {
            return Err(ServiceError::DatabaseError(DbErr::Custom(format!(
                "duplicate update_history id {}",
                entry.id
            ))));
        }
        self.staged.update_history.push(entry);
        Ok(())
    }

    async fn working_rows(&mut self) -> Result<Vec<working_demand::Model>, ServiceError> {
        self.check(FailPoint::ReadWorking)?;
        let mut rows = self.staged.working_demand.clone();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn aggregate_rows(&mut self) -> Result<Vec<forecast_aggregate::Model>, ServiceError> {
        let mut rows = self.staged.forecast_aggregate.clone();
        rows.sort_by(|a, b| (a.period, &a.product_id).cmp(&(b.period, &b.product_id)));
        Ok(rows)
    }

    async fn parameter_rows(&mut self) -> Result<Vec<product_parameters::Model>, ServiceError> {
        let mut rows = self.staged.product_parameters.clone();
        rows.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(rows)
    }

    async fn replace_aggregate(
        &mut self,
        rows: Vec<forecast_aggregate::Model>,
    ) -> Result<u64, ServiceError> {
        self.check(FailPoint::ReplaceAggregate)?;
        let inserted = rows.len() as u64;
        self.staged.forecast_aggregate = rows;
        Ok(inserted)
    }

    async fn write_parameters(&mut self, updates: &[ParameterUpdate]) -> Result<u64, ServiceError> {
        self.check(FailPoint::WriteParameters)?;
        let mut written = 0u64;
        for update in updates {
            if let Some(row) = self
                .staged
                .product_parameters
                .iter_mut()
                .find(|p| p.product_id == update.product_id)
            {
                row.forecast = update.forecast;
                row.dmd_stdev = update.dmd_stdev;
                row.dl = update.dl;
                row.eoq = update.eoq;
                row.ss = update.ss;
                row.rop = update.rop;
                row.updated_at = update.updated_at;
                written += 1;
            }
        }
        Ok(written)
    }

    async fn reset_dataset(&mut self) -> Result<(), ServiceError> {
        self.check(FailPoint::Reset)?;
        self.staged.original_demand.clear();
        self.staged.working_demand.clear();
        self.staged.product_parameters.clear();
        self.staged.forecast_aggregate.clear();
        Ok(())
    }

    async fn insert_demand(
        &mut self,
        records: &[NewDemandRecord],
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        self.check(FailPoint::InsertDemand)?;
        let mut original_id =
            DemandTables::next_id(self.staged.original_demand.iter().map(|r| r.id));
        let mut working_id =
            DemandTables::next_id(self.staged.working_demand.iter().map(|r| r.id));

        for r in records {
            self.staged.original_demand.push(original_demand::Model {
                id: original_id,
                demand_date: r.demand_date,
                product_id: r.product_id.clone(),
                product_name: r.product_name.clone(),
                customer_id: r.customer_id.clone(),
                customer_name: r.customer_name.clone(),
                quantity: r.quantity,
                created_at: now,
                modified_at: now,
            });
            self.staged.working_demand.push(working_demand::Model {
                id: working_id,
                demand_date: r.demand_date,
                product_id: r.product_id.clone(),
                product_name: r.product_name.clone(),
                customer_id: r.customer_id.clone(),
                customer_name: r.customer_name.clone(),
                quantity: r.quantity,
                created_at: now,
                modified_at: now,
            });
            original_id += 1;
            working_id += 1;
        }
        Ok(records.len() as u64)
    }

    async fn insert_products(
        &mut self,
        products: &[NewProduct],
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        self.check(FailPoint::InsertProducts)?;
        for product in products {
            if self
                .staged
                .product_parameters
                .iter()
                .any(|p| p.product_id == product.product_id)
            {
                return Err(ServiceError::DatabaseError(DbErr::Custom(format!(
                    "duplicate product_parameters id {}",
                    product.product_id
                ))));
            }
            self.staged.product_parameters.push(product_row(product, now));
        }
        Ok(products.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
        self.check(FailPoint::Commit)?;
        let MemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), ServiceError> {
        Ok(())
    }
}
