use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

/// One customer demand observation, as delivered by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewDemandRecord {
    pub demand_date: DateTime<Utc>,
    #[validate(custom = "validate_not_blank")]
    pub product_id: String,
    #[validate(custom = "validate_not_blank")]
    pub product_name: String,
    #[validate(custom = "validate_not_blank")]
    pub customer_id: String,
    #[validate(custom = "validate_not_blank")]
    pub customer_name: String,
    #[validate(custom = "validate_quantity")]
    pub quantity: f64,
}

/// Static cost and lead-time inputs for one product.
///
/// The derived columns are optional; when absent they start out as zero
/// (`dl`, `forecast`, `dmd_stdev`) or NULL (`eoq`, `rop`, `ss`) until the
/// first forecast run fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(custom = "validate_not_blank")]
    pub product_id: String,
    #[validate(custom = "validate_not_blank")]
    pub product_name: String,
    #[validate(custom = "validate_finite")]
    pub cost: f64,
    #[validate(custom = "validate_finite")]
    pub lead_time_months: f64,
    #[validate(custom = "validate_finite")]
    pub ordering_cost: f64,
    #[validate(custom = "validate_finite")]
    pub holding_cost: f64,
    #[serde(default)]
    #[validate(custom = "validate_finite")]
    pub eoq: Option<f64>,
    #[serde(default)]
    #[validate(custom = "validate_finite")]
    pub rop: Option<f64>,
    #[serde(default)]
    #[validate(custom = "validate_finite")]
    pub ss: Option<f64>,
    #[serde(default)]
    #[validate(custom = "validate_finite")]
    pub dl: Option<f64>,
    #[serde(default)]
    #[validate(custom = "validate_finite")]
    pub forecast: Option<f64>,
    #[serde(default)]
    #[validate(custom = "validate_finite")]
    pub dmd_stdev: Option<f64>,
}

/// A complete ingestion payload: the demand history plus the product sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandDataset {
    pub demand: Vec<NewDemandRecord>,
    pub products: Vec<NewProduct>,
}

impl DemandDataset {
    /// Checks every row before anything is written.
    ///
    /// Row numbers in error messages are 1-based and count a header row,
    /// so the first data row is row 2.
    pub fn validate_rows(&self) -> Result<(), ServiceError> {
        if self.demand.is_empty() {
            return Err(ServiceError::ValidationError(
                "Dataset contains no demand rows".to_string(),
            ));
        }
        if self.products.is_empty() {
            return Err(ServiceError::ValidationError(
                "Dataset contains no product rows".to_string(),
            ));
        }

        for (i, row) in self.demand.iter().enumerate() {
            row.validate().map_err(|e| {
                ServiceError::ValidationError(format!(
                    "Error processing demand row {}: {}",
                    i + 2,
                    e
                ))
            })?;
        }

        let mut seen = HashSet::new();
        for (i, row) in self.products.iter().enumerate() {
            row.validate().map_err(|e| {
                ServiceError::ValidationError(format!(
                    "Error processing product row {}: {}",
                    i + 2,
                    e
                ))
            })?;
            if !seen.insert(row.product_id.trim()) {
                return Err(ServiceError::ValidationError(format!(
                    "Error processing product row {}: duplicate product id '{}'",
                    i + 2,
                    row.product_id
                )));
            }
        }

        Ok(())
    }

    /// Trims surrounding whitespace from every identifier and name.
    pub fn normalized(mut self) -> Self {
        for row in &mut self.demand {
            trim_in_place(&mut row.product_id);
            trim_in_place(&mut row.product_name);
            trim_in_place(&mut row.customer_id);
            trim_in_place(&mut row.customer_name);
        }
        for row in &mut self.products {
            trim_in_place(&mut row.product_id);
            trim_in_place(&mut row.product_name);
        }
        self
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

fn validate_quantity(quantity: f64) -> Result<(), ValidationError> {
    if !quantity.is_finite() || quantity < 0.0 {
        let mut err = ValidationError::new("quantity");
        err.message = Some("quantity must be a non-negative number".into());
        return Err(err);
    }
    Ok(())
}

fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        let mut err = ValidationError::new("not_finite");
        err.message = Some("must be a finite number".into());
        return Err(err);
    }
    Ok(())
}
