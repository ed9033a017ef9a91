use crate::entities::working_demand;
use crate::errors::ServiceError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month in UTC, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ServiceError> {
        if !(1..=12).contains(&month) {
            return Err(ServiceError::InvalidInput(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(ServiceError::InvalidInput(format!(
                "Year must be between 1 and 9999, got {}",
                year
            )));
        }
        Ok(Self { year, month })
    }

    /// The month a timestamp falls in
    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Inclusive lower bound of the month
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.first_day().and_time(NaiveTime::default()))
    }

    /// Exclusive upper bound of the month
    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start() && *timestamp < self.end()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || {
            ServiceError::InvalidInput(format!(
                "Invalid month '{}': expected format YYYY-MM",
                s
            ))
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(malformed)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Which working-demand rows a bulk adjustment touches.
///
/// Each present filter narrows the scope; the filters combine with AND.
/// A scope with no filters covers every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandScope {
    pub month: Option<YearMonth>,
    pub product_id: Option<String>,
    pub customer_id: Option<String>,
}

impl DemandScope {
    /// Scope covering the entire working table
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a scope from raw caller filters.
    ///
    /// Empty or whitespace-only filters count as absent.
    pub fn from_filters(
        month: Option<&str>,
        product_id: Option<&str>,
        customer_id: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let month = match non_blank(month) {
            Some(raw) => Some(raw.parse::<YearMonth>()?),
            None => None,
        };

        Ok(Self {
            month,
            product_id: non_blank(product_id).map(str::to_string),
            customer_id: non_blank(customer_id).map(str::to_string),
        })
    }

    pub fn with_month(mut self, month: YearMonth) -> Self {
        self.month = Some(month);
        self
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        let product_id = product_id.into();
        self.product_id = non_blank(Some(&product_id)).map(str::to_string);
        self
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        let customer_id = customer_id.into();
        self.customer_id = non_blank(Some(&customer_id)).map(str::to_string);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.month.is_none() && self.product_id.is_none() && self.customer_id.is_none()
    }

    /// Query condition over `working_demand` with every filter as a bound value.
    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(month) = &self.month {
            condition = condition
                .add(working_demand::Column::DemandDate.gte(month.start()))
                .add(working_demand::Column::DemandDate.lt(month.end()));
        }
        if let Some(product_id) = &self.product_id {
            condition = condition.add(working_demand::Column::ProductId.eq(product_id.clone()));
        }
        if let Some(customer_id) = &self.customer_id {
            condition = condition.add(working_demand::Column::CustomerId.eq(customer_id.clone()));
        }

        condition
    }

    /// Evaluates the same predicate as [`DemandScope::condition`] against a loaded row.
    pub fn matches(&self, row: &working_demand::Model) -> bool {
        self.month
            .as_ref()
            .map_or(true, |month| month.contains(&row.demand_date))
            && self
                .product_id
                .as_ref()
                .map_or(true, |id| *id == row.product_id)
            && self
                .customer_id
                .as_ref()
                .map_or(true, |id| *id == row.customer_id)
    }

    /// Human-readable form of the scope, e.g. `month = 2024-01 and product_id = 'P1'`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(month) = &self.month {
            parts.push(format!("month = {}", month));
        }
        if let Some(product_id) = &self.product_id {
            parts.push(format!("product_id = '{}'", product_id));
        }
        if let Some(customer_id) = &self.customer_id {
            parts.push(format!("customer_id = '{}'", customer_id));
        }

        if parts.is_empty() {
            "all records".to_string()
        } else {
            parts.join(" and ")
        }
    }

    /// Text stored in the audit log for a change applied to this scope.
    pub fn change_summary(&self, percentage: f64, multiplier: f64) -> String {
        if self.is_unbounded() {
            format!(
                "scaled quantity by {:+}% (x{}) across all records",
                percentage, multiplier
            )
        } else {
            format!(
                "scaled quantity by {:+}% (x{}) where {}",
                percentage,
                multiplier,
                self.describe()
            )
        }
    }
}

impl fmt::Display for DemandScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{EntityTrait, QueryFilter, QueryTrait, DbBackend};

    fn row(date: &str, product: &str, customer: &str) -> working_demand::Model {
        let ts = DateTime::parse_from_rfc3339(date).unwrap().with_timezone(&Utc);
        working_demand::Model {
            id: 1,
            demand_date: ts,
            product_id: product.into(),
            product_name: format!("{} name", product),
            customer_id: customer.into(),
            customer_name: format!("{} name", customer),
            quantity: 1.0,
            created_at: ts,
            modified_at: ts,
        }
    }

    #[test]
    fn year_month_parses_and_bounds() {
        let month: YearMonth = "2024-12".parse().unwrap();
        assert_eq!(month.to_string(), "2024-12");
        assert_eq!(month.next().to_string(), "2025-01");
        assert_eq!(month.start().to_rfc3339(), "2024-12-01T00:00:00+00:00");
        assert_eq!(month.end().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn year_month_rejects_malformed_input() {
        for raw in ["2024-13", "2024-00", "24-01", "2024/01", "2024-1", "abcd-ef", ""] {
            assert!(raw.parse::<YearMonth>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn malformed_month_filter_is_invalid_input() {
        for raw in ["2024-13", "2024/01"] {
            let err = DemandScope::from_filters(Some(raw), None, None).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)), "{raw}: {err:?}");
            assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn month_is_half_open() {
        let month: YearMonth = "2024-01".parse().unwrap();
        let inside = DateTime::parse_from_rfc3339("2024-01-31T23:59:59Z").unwrap().with_timezone(&Utc);
        let boundary = DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z").unwrap().with_timezone(&Utc);
        assert!(month.contains(&month.start()));
        assert!(month.contains(&inside));
        assert!(!month.contains(&boundary));
    }

    #[test]
    fn blank_filters_are_absent() {
        let scope = DemandScope::from_filters(Some("  "), Some(""), None).unwrap();
        assert!(scope.is_unbounded());
        assert_eq!(scope.describe(), "all records");
    }

    #[test]
    fn filters_combine_conjunctively() {
        let scope = DemandScope::from_filters(Some("2024-01"), Some("P1"), Some("C1")).unwrap();
        assert!(scope.matches(&row("2024-01-15T00:00:00Z", "P1", "C1")));
        assert!(!scope.matches(&row("2024-02-15T00:00:00Z", "P1", "C1")));
        assert!(!scope.matches(&row("2024-01-15T00:00:00Z", "P2", "C1")));
        assert!(!scope.matches(&row("2024-01-15T00:00:00Z", "P1", "C2")));
    }

    #[test]
    fn change_summary_is_plain_text() {
        let scope = DemandScope::all()
            .with_month("2024-01".parse().unwrap())
            .with_product("P1");
        assert_eq!(
            scope.change_summary(10.0, 1.1),
            "scaled quantity by +10% (x1.1) where month = 2024-01 and product_id = 'P1'"
        );
        assert_eq!(
            DemandScope::all().change_summary(-25.0, 0.75),
            "scaled quantity by -25% (x0.75) across all records"
        );
    }

    #[test]
    fn condition_binds_values_instead_of_inlining_them() {
        let scope = DemandScope::all().with_customer("x' OR '1'='1");
        let stmt = working_demand::Entity::find()
            .filter(scope.condition())
            .build(DbBackend::Sqlite);
        assert!(!stmt.sql.contains("OR '1'='1"));
        assert_eq!(stmt.values.map(|v| v.0.len()), Some(1));
    }
}
