use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit log, one row per committed bulk adjustment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "update_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `YYYY-MM`, when the adjustment was scoped to a month
    pub month_year: Option<String>,
    pub product_id: Option<String>,
    pub customer_id: Option<String>,
    #[sea_orm(column_type = "Double")]
    pub percentage: f64,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub records_affected: i64,
    #[sea_orm(column_type = "Text")]
    pub change_summary: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
