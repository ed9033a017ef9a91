use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_parameters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: String,
    pub product_name: String,
    #[sea_orm(column_type = "Double")]
    pub cost: f64,
    #[sea_orm(column_type = "Double")]
    pub lead_time_months: f64,
    #[sea_orm(column_type = "Double")]
    pub ordering_cost: f64,
    #[sea_orm(column_type = "Double")]
    pub holding_cost: f64,
    #[sea_orm(column_type = "Double", nullable)]
    pub eoq: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub rop: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub ss: Option<f64>,
    #[sea_orm(column_type = "Double")]
    pub dl: f64,
    #[sea_orm(column_type = "Double")]
    pub forecast: f64,
    #[sea_orm(column_type = "Double")]
    pub dmd_stdev: f64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
