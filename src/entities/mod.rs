pub mod forecast_aggregate;
pub mod original_demand;
pub mod product_parameters;
pub mod update_history;
pub mod working_demand;
