//! Storage port for the demand planning tables.
//!
//! Operations that write go through a [`DemandUnitOfWork`]: everything done on
//! one unit of work becomes visible together on [`DemandUnitOfWork::commit`],
//! and is discarded on [`DemandUnitOfWork::rollback`] or when the unit of work
//! is dropped without committing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{
    forecast_aggregate, original_demand, product_parameters, update_history, working_demand,
};
use crate::errors::ServiceError;
use crate::models::{DemandScope, NewDemandRecord, NewProduct};

pub mod memory_store;
pub mod sea_orm_store;

pub use memory_store::{DemandTables, FailPoint, InMemoryDemandStore};
pub use sea_orm_store::SeaOrmDemandStore;

/// Forecast-derived columns written back to one `product_parameters` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub product_id: String,
    pub forecast: f64,
    pub dmd_stdev: f64,
    pub dl: f64,
    pub eoq: Option<f64>,
    pub ss: Option<f64>,
    pub rop: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Entry point to the store: read-only queries plus transaction start.
#[async_trait]
pub trait DemandStore: Send + Sync {
    /// Opens a unit of work. Reads issued on the store itself while a unit of
    /// work is open may wait for it to finish.
    async fn begin(&self) -> Result<Box<dyn DemandUnitOfWork>, ServiceError>;

    /// Aggregate rows ordered by period, then product id
    async fn read_aggregate(&self) -> Result<Vec<forecast_aggregate::Model>, ServiceError>;

    /// Product rows ordered by product id
    async fn product_parameters(&self) -> Result<Vec<product_parameters::Model>, ServiceError>;

    /// Audit entries, newest first
    async fn update_history(&self) -> Result<Vec<update_history::Model>, ServiceError>;

    /// Working rows ordered by id
    async fn working_demand(&self) -> Result<Vec<working_demand::Model>, ServiceError>;

    /// Original rows ordered by id
    async fn original_demand(&self) -> Result<Vec<original_demand::Model>, ServiceError>;
}

/// One atomic unit of work against the demand tables.
#[async_trait]
pub trait DemandUnitOfWork: Send {
    /// Number of working rows inside `scope`
    async fn count_scope(&mut self, scope: &DemandScope) -> Result<u64, ServiceError>;

    /// Multiplies the quantity of every working row inside `scope` and stamps
    /// `modified_at`. Returns the number of rows the store reports as changed.
    async fn scale_scope(
        &mut self,
        scope: &DemandScope,
        multiplier: f64,
        modified_at: DateTime<Utc>,
    ) -> Result<u64, ServiceError>;

    async fn append_audit(&mut self, entry: update_history::Model) -> Result<(), ServiceError>;

    /// Entire working table as seen inside this unit of work
    async fn working_rows(&mut self) -> Result<Vec<working_demand::Model>, ServiceError>;

    async fn aggregate_rows(&mut self) -> Result<Vec<forecast_aggregate::Model>, ServiceError>;

    async fn parameter_rows(&mut self) -> Result<Vec<product_parameters::Model>, ServiceError>;

    /// Deletes every aggregate row, then inserts `rows`. Returns rows inserted.
    async fn replace_aggregate(
        &mut self,
        rows: Vec<forecast_aggregate::Model>,
    ) -> Result<u64, ServiceError>;

    /// Returns the number of product rows updated
    async fn write_parameters(&mut self, updates: &[ParameterUpdate]) -> Result<u64, ServiceError>;

    /// Clears both demand tables, the products and the aggregate. The audit log is kept.
    async fn reset_dataset(&mut self) -> Result<(), ServiceError>;

    /// Inserts each record into both `original_demand` and `working_demand`
    async fn insert_demand(
        &mut self,
        records: &[NewDemandRecord],
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError>;

    async fn insert_products(
        &mut self,
        products: &[NewProduct],
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError>;

    async fn commit(self: Box<Self>) -> Result<(), ServiceError>;

    async fn rollback(self: Box<Self>) -> Result<(), ServiceError>;
}

/// Initial `product_parameters` row for an imported product
pub(crate) fn product_row(product: &NewProduct, now: DateTime<Utc>) -> product_parameters::Model {
    product_parameters::Model {
        product_id: product.product_id.clone(),
        product_name: product.product_name.clone(),
        cost: product.cost,
        lead_time_months: product.lead_time_months,
        ordering_cost: product.ordering_cost,
        holding_cost: product.holding_cost,
        eoq: product.eoq,
        rop: product.rop,
        ss: product.ss,
        dl: product.dl.unwrap_or(0.0),
        forecast: product.forecast.unwrap_or(0.0),
        dmd_stdev: product.dmd_stdev.unwrap_or(0.0),
        updated_at: now,
    }
}
