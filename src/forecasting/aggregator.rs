use crate::entities::{forecast_aggregate, working_demand};
use crate::models::YearMonth;
use std::collections::BTreeMap;

/// Rebuilds `forecast_aggregate` from the full working table.
///
/// Rows are grouped by (calendar month of `demand_date`, `product_id`) and
/// their quantities summed. When one product id carries several names, the
/// lexicographically smallest one is kept so the key stays unique.
/// Output is sorted by period, then product id, which makes the rebuild
/// deterministic and idempotent.
pub struct ForecastAggregator;

impl ForecastAggregator {
    pub fn rebuild<'a, I>(rows: I) -> Vec<forecast_aggregate::Model>
    where
        I: IntoIterator<Item = &'a working_demand::Model>,
    {
        let mut groups: BTreeMap<(YearMonth, String), forecast_aggregate::Model> = BTreeMap::new();

        for row in rows {
            let month = YearMonth::of(&row.demand_date);
            groups
                .entry((month, row.product_id.clone()))
                .and_modify(|agg| {
                    agg.quantity += row.quantity;
                    if row.product_name < agg.product_name {
                        agg.product_name = row.product_name.clone();
                    }
                })
                .or_insert_with(|| forecast_aggregate::Model {
                    period: month.first_day(),
                    product_id: row.product_id.clone(),
                    product_name: row.product_name.clone(),
                    quantity: row.quantity,
                });
        }

        groups.into_values().collect()
    }
}
