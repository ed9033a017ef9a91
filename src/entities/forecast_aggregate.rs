use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monthly per-product totals of `working_demand`.
///
/// The table is a projection: it is deleted and rebuilt as a whole, never patched.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "forecast_aggregate")]
pub struct Model {
    /// First day of the month
    #[sea_orm(primary_key, auto_increment = false)]
    pub period: Date,
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: String,
    pub product_name: String,
    #[sea_orm(column_type = "Double")]
    pub quantity: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
