use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, instrument, warn};

use crate::entities::{forecast_aggregate, product_parameters};
use crate::errors::ServiceError;
use crate::forecasting::{
    HuberEstimator, InventoryInputs, InventoryParameterCalculator, InventoryParameters,
};
use crate::repositories::{DemandStore, ParameterUpdate};

/// Forecast and derived parameters for one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductForecast {
    pub product_id: String,
    pub product_name: String,
    pub forecast: f64,
    pub dmd_stdev: f64,
    /// `None` when the product has no `product_parameters` row
    pub parameters: Option<InventoryParameters>,
    /// Aggregate periods that fed the estimate
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRun {
    pub results: Vec<ProductForecast>,
    pub parameters_written: u64,
    pub processed_at: DateTime<Utc>,
}

/// Turns the monthly aggregate into per-product forecasts and inventory
/// parameters, and writes them to `product_parameters`.
///
/// The aggregate and the product rows are read once, every product is
/// estimated in memory, and all writes go out in a single transaction.
#[derive(Debug, Clone, Default)]
pub struct ForecastProcessor {
    estimator: HuberEstimator,
}

struct ProductSamples<'a> {
    name: &'a str,
    quantities: Vec<f64>,
}

impl ForecastProcessor {
    pub fn new(estimator: HuberEstimator) -> Self {
        Self { estimator }
    }

    /// Pure part of a run: one result per product present in `aggregate`,
    /// ordered by product id.
    pub fn evaluate(
        &self,
        aggregate: &[forecast_aggregate::Model],
        products: &[product_parameters::Model],
    ) -> Vec<ProductForecast> {
        let mut samples: BTreeMap<&str, ProductSamples<'_>> = BTreeMap::new();
        for row in aggregate {
            let entry = samples
                .entry(row.product_id.as_str())
                .or_insert_with(|| ProductSamples {
                    name: row.product_name.as_str(),
                    quantities: Vec::new(),
                });
            if row.product_name.as_str() < entry.name {
                entry.name = row.product_name.as_str();
            }
            if row.quantity.is_finite() {
                entry.quantities.push(row.quantity);
            } else {
                warn!(
                    product_id = %row.product_id,
                    period = %row.period,
                    "Skipping non-finite aggregate quantity"
                );
            }
        }

        let by_id: HashMap<&str, &product_parameters::Model> = products
            .iter()
            .map(|p| (p.product_id.as_str(), p))
            .collect();

        samples
            .into_iter()
            .map(|(product_id, group)| {
                let estimate = self.estimator.estimate(&group.quantities);
                if !estimate.converged {
                    debug!(
                        product_id,
                        iterations = estimate.iterations,
                        "Estimator hit the iteration cap"
                    );
                }

                let parameters = by_id.get(product_id).map(|stored| {
                    let params = InventoryParameterCalculator::calculate(&InventoryInputs {
                        forecast: estimate.location,
                        dmd_stdev: estimate.scale,
                        lead_time_months: stored.lead_time_months,
                        ordering_cost: stored.ordering_cost,
                        holding_cost: stored.holding_cost,
                    });
                    for domain_error in &params.domain_errors {
                        warn!(product_id, "Inventory parameter left undefined: {}", domain_error);
                    }
                    params
                });

                if parameters.is_none() {
                    warn!(product_id, "No product parameters row; forecast not stored");
                }

                ProductForecast {
                    product_id: product_id.to_string(),
                    product_name: group.name.to_string(),
                    forecast: estimate.location,
                    dmd_stdev: estimate.scale,
                    parameters,
                    sample_count: group.quantities.len(),
                }
            })
            .collect()
    }

    /// Reads the aggregate, estimates every product and stores the results.
    #[instrument(skip(self, store))]
    pub async fn run(&self, store: &dyn DemandStore) -> Result<ForecastRun, ServiceError> {
        let processed_at = Utc::now();
        let mut uow = store.begin().await.map_err(|e| e.in_transaction("Begin"))?;

        let outcome = async {
            let aggregate = uow.aggregate_rows().await?;
            let products = uow.parameter_rows().await?;
            let results = self.evaluate(&aggregate, &products);

            let updates: Vec<ParameterUpdate> = results
                .iter()
                .filter_map(|r| {
                    r.parameters.as_ref().map(|p| ParameterUpdate {
                        product_id: r.product_id.clone(),
                        forecast: r.forecast,
                        dmd_stdev: r.dmd_stdev,
                        dl: p.dl,
                        eoq: p.eoq,
                        ss: p.ss,
                        rop: p.rop,
                        updated_at: processed_at,
                    })
                })
                .collect();

            let written = uow.write_parameters(&updates).await?;
            Ok::<_, ServiceError>((results, written))
        }
        .await;

        let (results, parameters_written) = match outcome {
            Ok(done) => {
                uow.commit().await.map_err(|e| e.in_transaction("Commit"))?;
                done
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    error!("Rollback after failed forecast run also failed: {}", rollback_err);
                }
                counter!("demand_planner.forecast.failed", 1);
                return Err(e.in_transaction("ForecastProcessing"));
            }
        };

        counter!("demand_planner.forecast.runs", 1);
        gauge!("demand_planner.forecast.products", results.len() as f64);
        info!(
            products = results.len(),
            parameters_written, "Forecast processing complete"
        );

        Ok(ForecastRun {
            results,
            parameters_written,
            processed_at,
        })
    }
}
