//! Numerical core of demand planning.
//!
//! Everything in here is pure: no I/O, no clocks, no store access.
//! - [`huber`]: robust location/scale estimation of noisy demand
//! - [`inventory`]: lead-time demand, EOQ, safety stock and reorder point
//! - [`aggregator`]: monthly per-product projection of working demand

pub mod aggregator;
pub mod huber;
pub mod inventory;

pub use aggregator::ForecastAggregator;
pub use huber::{HuberEstimator, RobustEstimate};
pub use inventory::{
    InventoryInputs, InventoryParameterCalculator, InventoryParameters, NumericDomainError,
    SERVICE_LEVEL_Z,
};
