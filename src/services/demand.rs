use chrono::{DateTime, Datelike, Month, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

use crate::commands::demand::{
    BulkUpdateCommand, BulkUpdateResult, ImportDatasetCommand, ImportDatasetResult,
};
use crate::commands::forecasting::ProcessForecastCommand;
use crate::commands::Command;
use crate::entities::{original_demand, update_history};
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::models::{DemandDataset, DemandScope};
use crate::repositories::DemandStore;
use crate::services::forecasting::ForecastRun;

/// Tolerance below which two quantities count as unchanged
const QUANTITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductForecastSummary {
    pub product_id: String,
    pub product_name: String,
    pub forecast: f64,
    pub dmd_stdev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMonthDifference {
    pub product_id: String,
    pub product_name: String,
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub original_quantity: f64,
    pub modified_quantity: f64,
    pub difference: f64,
    pub percentage_change: f64,
}

/// Original vs working demand, overall and per product-month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandDifference {
    pub total_original: f64,
    pub total_modified: f64,
    pub difference: f64,
    pub percentage_change: f64,
    pub records_changed: u64,
    pub records_total: u64,
    pub product_month_differences: Vec<ProductMonthDifference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyDemand {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDemandByMonth {
    pub product_id: String,
    pub product_name: String,
    pub monthly_demand: Vec<MonthlyDemand>,
}

/// Overview of the imported demand history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSummary {
    pub total_records: u64,
    pub total_quantity: f64,
    pub unique_products: u64,
    pub unique_customers: u64,
    /// Earliest and latest `demand_date`; `None` when there is no data
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Ordered by product name, then year and month
    pub product_demand_by_month: Vec<ProductDemandByMonth>,
}

/// Entry point for collaborators: runs the commands and serves the reads.
#[derive(Clone)]
pub struct DemandService {
    store: Arc<dyn DemandStore>,
    event_sender: Arc<EventSender>,
}

impl DemandService {
    pub fn new(store: Arc<dyn DemandStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Scales working demand inside `scope` by `percentage` percent.
    #[instrument(skip(self, description))]
    pub async fn apply_bulk_change(
        &self,
        scope: DemandScope,
        percentage: f64,
        description: &str,
    ) -> Result<BulkUpdateResult, ServiceError> {
        BulkUpdateCommand::new(scope, percentage, description)
            .execute(self.store.clone(), self.event_sender.clone())
            .await
    }

    pub async fn run_forecast(&self) -> Result<ForecastRun, ServiceError> {
        ProcessForecastCommand::default()
            .execute(self.store.clone(), self.event_sender.clone())
            .await
    }

    pub async fn import_dataset(
        &self,
        dataset: DemandDataset,
    ) -> Result<ImportDatasetResult, ServiceError> {
        ImportDatasetCommand::new(dataset)
            .execute(self.store.clone(), self.event_sender.clone())
            .await
    }

    /// Audit entries, newest first
    pub async fn update_history(&self) -> Result<Vec<update_history::Model>, ServiceError> {
        self.store.update_history().await
    }

    pub async fn product_forecasts(&self) -> Result<Vec<ProductForecastSummary>, ServiceError> {
        Ok(self
            .store
            .product_parameters()
            .await?
            .into_iter()
            .map(|p| ProductForecastSummary {
                product_id: p.product_id,
                product_name: p.product_name,
                forecast: p.forecast,
                dmd_stdev: p.dmd_stdev,
            })
            .collect())
    }

    /// Totals, distinct counts, date range and monthly demand per product,
    /// computed over the original (imported) demand.
    #[instrument(skip(self))]
    pub async fn demand_summary(&self) -> Result<DemandSummary, ServiceError> {
        let original = self.store.original_demand().await?;
        Ok(summarize(&original))
    }

    #[instrument(skip(self))]
    pub async fn demand_difference(&self) -> Result<DemandDifference, ServiceError> {
        let original = self.store.original_demand().await?;
        let working = self.store.working_demand().await?;

        let original_rows: Vec<DemandPoint<'_>> = original
            .iter()
            .map(|r| DemandPoint {
                key: (
                    r.demand_date.timestamp_micros(),
                    r.product_id.as_str(),
                    r.customer_id.as_str(),
                ),
                product_name: r.product_name.as_str(),
                year: r.demand_date.year(),
                month: r.demand_date.month(),
                quantity: r.quantity,
            })
            .collect();
        let working_rows: Vec<DemandPoint<'_>> = working
            .iter()
            .map(|r| DemandPoint {
                key: (
                    r.demand_date.timestamp_micros(),
                    r.product_id.as_str(),
                    r.customer_id.as_str(),
                ),
                product_name: r.product_name.as_str(),
                year: r.demand_date.year(),
                month: r.demand_date.month(),
                quantity: r.quantity,
            })
            .collect();

        Ok(compare(&original_rows, &working_rows))
    }
}

struct DemandPoint<'a> {
    key: (i64, &'a str, &'a str),
    product_name: &'a str,
    year: i32,
    month: u32,
    quantity: f64,
}

fn differs(a: f64, b: f64) -> bool {
    (a - b).abs() > QUANTITY_EPSILON
}

fn percentage_of(difference: f64, base: f64) -> f64 {
    if base > 0.0 {
        difference / base * 100.0
    } else {
        0.0
    }
}

fn compare(original: &[DemandPoint<'_>], working: &[DemandPoint<'_>]) -> DemandDifference {
    let total_original: f64 = original.iter().map(|p| p.quantity).sum();
    let total_modified: f64 = working.iter().map(|p| p.quantity).sum();
    let difference = total_modified - total_original;

    // Rows sharing a key are paired up in id order. A leftover row has no
    // counterpart and is compared against zero.
    let mut by_key: HashMap<(i64, &str, &str), (Vec<f64>, Vec<f64>)> = HashMap::new();
    for p in original {
        by_key.entry(p.key).or_default().0.push(p.quantity);
    }
    for p in working {
        by_key.entry(p.key).or_default().1.push(p.quantity);
    }

    let mut records_changed = 0u64;
    let mut records_total = 0u64;
    for (before, after) in by_key.values() {
        let paired = before.len().min(after.len());
        records_total += before.len().max(after.len()) as u64;
        records_changed += before
            .iter()
            .zip(after)
            .filter(|(a, b)| differs(**a, **b))
            .count() as u64;
        records_changed += before[paired..]
            .iter()
            .chain(&after[paired..])
            .filter(|q| differs(**q, 0.0))
            .count() as u64;
    }

    struct MonthTotals<'a> {
        product_name: &'a str,
        original: f64,
        modified: f64,
    }

    let mut months: BTreeMap<(&str, i32, u32), MonthTotals<'_>> = BTreeMap::new();
    for p in original {
        months
            .entry((p.key.1, p.year, p.month))
            .or_insert_with(|| MonthTotals {
                product_name: p.product_name,
                original: 0.0,
                modified: 0.0,
            })
            .original += p.quantity;
    }
    for p in working {
        months
            .entry((p.key.1, p.year, p.month))
            .or_insert_with(|| MonthTotals {
                product_name: p.product_name,
                original: 0.0,
                modified: 0.0,
            })
            .modified += p.quantity;
    }

    let mut product_month_differences: Vec<ProductMonthDifference> = months
        .into_iter()
        .filter(|(_, totals)| differs(totals.original, totals.modified))
        .map(|((product_id, year, month), totals)| {
            let difference = totals.modified - totals.original;
            ProductMonthDifference {
                product_id: product_id.to_string(),
                product_name: totals.product_name.to_string(),
                year,
                month,
                month_name: month_name(month),
                original_quantity: totals.original,
                modified_quantity: totals.modified,
                difference,
                percentage_change: percentage_of(difference, totals.original),
            }
        })
        .collect();
    product_month_differences.sort_by(|a, b| {
        (&a.product_name, a.year, a.month, &a.product_id).cmp(&(
            &b.product_name,
            b.year,
            b.month,
            &b.product_id,
        ))
    });

    DemandDifference {
        total_original,
        total_modified,
        difference,
        percentage_change: percentage_of(difference, total_original),
        records_changed,
        records_total,
        product_month_differences,
    }
}

fn summarize(rows: &[original_demand::Model]) -> DemandSummary {
    struct ProductMonths<'a> {
        name: &'a str,
        months: BTreeMap<(i32, u32), f64>,
    }

    let mut products: HashMap<&str, ProductMonths<'_>> = HashMap::new();
    let mut customers = HashSet::new();
    let mut total_quantity = 0.0;

    for row in rows {
        total_quantity += row.quantity;
        customers.insert(row.customer_id.as_str());

        let entry = products
            .entry(row.product_id.as_str())
            .or_insert_with(|| ProductMonths {
                name: row.product_name.as_str(),
                months: BTreeMap::new(),
            });
        if row.product_name.as_str() < entry.name {
            entry.name = row.product_name.as_str();
        }
        *entry
            .months
            .entry((row.demand_date.year(), row.demand_date.month()))
            .or_insert(0.0) += row.quantity;
    }

    let unique_products = products.len() as u64;
    let mut product_demand_by_month: Vec<ProductDemandByMonth> = products
        .into_iter()
        .map(|(product_id, group)| ProductDemandByMonth {
            product_id: product_id.to_string(),
            product_name: group.name.to_string(),
            monthly_demand: group
                .months
                .into_iter()
                .map(|((year, month), total_quantity)| MonthlyDemand {
                    year,
                    month,
                    month_name: month_name(month),
                    total_quantity,
                })
                .collect(),
        })
        .collect();
    product_demand_by_month.sort_by(|a, b| {
        (&a.product_name, &a.product_id).cmp(&(&b.product_name, &b.product_id))
    });

    DemandSummary {
        total_records: rows.len() as u64,
        total_quantity,
        unique_products,
        unique_customers: customers.len() as u64,
        start_date: rows.iter().map(|r| r.demand_date).min(),
        end_date: rows.iter().map(|r| r.demand_date).max(),
        product_demand_by_month,
    }
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}
