use serde::Serialize;
use thiserror::Error;

/// z-score of a 95% cycle service level
pub const SERVICE_LEVEL_Z: f64 = 1.96;

/// Why a derived inventory parameter could not be computed
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum NumericDomainError {
    #[error("holding cost must be positive to compute EOQ, got {0}")]
    NonPositiveHoldingCost(f64),

    #[error("forecast x ordering cost is negative ({forecast} x {ordering_cost}), EOQ undefined")]
    NegativeOrderDemand { forecast: f64, ordering_cost: f64 },

    #[error("lead time must not be negative, got {0} months")]
    NegativeLeadTime(f64),

    #[error("{0} is not a finite number")]
    NonFinite(&'static str),
}

/// Per-product inputs of the inventory formulas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InventoryInputs {
    pub forecast: f64,
    pub dmd_stdev: f64,
    pub lead_time_months: f64,
    pub ordering_cost: f64,
    pub holding_cost: f64,
}

/// Derived inventory parameters.
///
/// `eoq`, `ss` and `rop` are `None` when their formula is undefined for the
/// inputs; the reason is listed in `domain_errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryParameters {
    /// Lead-time demand
    pub dl: f64,
    /// Economic order quantity
    pub eoq: Option<f64>,
    /// Safety stock
    pub ss: Option<f64>,
    /// Reorder point
    pub rop: Option<f64>,
    pub domain_errors: Vec<NumericDomainError>,
}

impl InventoryParameters {
    pub fn is_complete(&self) -> bool {
        self.domain_errors.is_empty()
    }
}

pub struct InventoryParameterCalculator;

impl InventoryParameterCalculator {
    /// dl = forecast x L, eoq = sqrt(2 x forecast x S / H),
    /// ss = z x stdev x sqrt(L), rop = ss + dl.
    pub fn calculate(inputs: &InventoryInputs) -> InventoryParameters {
        let mut domain_errors = Vec::new();

        let dl = inputs.forecast * inputs.lead_time_months;
        let dl_defined = dl.is_finite();
        if !dl_defined {
            domain_errors.push(NumericDomainError::NonFinite("lead-time demand"));
        }

        let eoq = Self::try_eoq(inputs.forecast, inputs.ordering_cost, inputs.holding_cost)
            .map_err(|e| domain_errors.push(e))
            .ok();

        let ss = Self::try_safety_stock(inputs.dmd_stdev, inputs.lead_time_months)
            .map_err(|e| domain_errors.push(e))
            .ok();

        let rop = ss.filter(|_| dl_defined).map(|ss| ss + dl);
        // the column is NOT NULL; a non-finite product is flagged via domain_errors
        let dl = if dl_defined { dl } else { 0.0 };

        InventoryParameters {
            dl,
            eoq,
            ss,
            rop,
            domain_errors,
        }
    }

    pub fn try_eoq(
        forecast: f64,
        ordering_cost: f64,
        holding_cost: f64,
    ) -> Result<f64, NumericDomainError> {
        if !forecast.is_finite() {
            return Err(NumericDomainError::NonFinite("forecast"));
        }
        if !ordering_cost.is_finite() {
            return Err(NumericDomainError::NonFinite("ordering cost"));
        }
        if !holding_cost.is_finite() {
            return Err(NumericDomainError::NonFinite("holding cost"));
        }
        if holding_cost <= 0.0 {
            return Err(NumericDomainError::NonPositiveHoldingCost(holding_cost));
        }

        let annual = 2.0 * forecast * ordering_cost;
        if annual < 0.0 {
            return Err(NumericDomainError::NegativeOrderDemand {
                forecast,
                ordering_cost,
            });
        }
        Ok((annual / holding_cost).sqrt())
    }

    pub fn try_safety_stock(
        dmd_stdev: f64,
        lead_time_months: f64,
    ) -> Result<f64, NumericDomainError> {
        if !dmd_stdev.is_finite() {
            return Err(NumericDomainError::NonFinite("demand standard deviation"));
        }
        if !lead_time_months.is_finite() {
            return Err(NumericDomainError::NonFinite("lead time"));
        }
        if lead_time_months < 0.0 {
            return Err(NumericDomainError::NegativeLeadTime(lead_time_months));
        }
        Ok(SERVICE_LEVEL_Z * dmd_stdev * lead_time_months.sqrt())
    }
}
