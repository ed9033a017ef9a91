use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Demand rows that bulk adjustments scale in place.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "working_demand")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub demand_date: DateTimeUtc,
    pub product_id: String,
    pub product_name: String,
    pub customer_id: String,
    pub customer_name: String,
    #[sea_orm(column_type = "Double")]
    pub quantity: f64,
    pub created_at: DateTimeUtc,
    pub modified_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
