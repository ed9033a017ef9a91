pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_demand_tables;
mod m20250601_000002_create_forecast_aggregate_table;
mod m20250601_000003_create_product_parameters_table;
mod m20250601_000004_create_update_history_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_demand_tables::Migration),
            Box::new(m20250601_000002_create_forecast_aggregate_table::Migration),
            Box::new(m20250601_000003_create_product_parameters_table::Migration),
            Box::new(m20250601_000004_create_update_history_table::Migration),
        ]
    }
}
