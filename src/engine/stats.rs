//! Dashboard aggregates in the labels/series layout chart widgets consume.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::product::{OrderStatus, Product};

const NO_REGION: &str = "None";

#[derive(Debug, Serialize, PartialEq)]
pub struct Series {
    pub name: String,
    pub data: Vec<u64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SeriesChart {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DonutChart {
    pub labels: Vec<String>,
    pub series: Vec<u64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Dashboard {
    pub line_chart: SeriesChart,
    pub donut_chart: DonutChart,
    pub bar_chart: SeriesChart,
    pub area_chart: SeriesChart,
}

#[derive(Default)]
struct MonthCounts {
    pending: u64,
    delivered: u64,
}

/// Builds every chart in one pass over `products`.
///
/// `region_names` maps region ids to display names; products whose region is
/// unset or unknown are counted under `"None"`, listed after named regions.
/// A region actually named "None" keeps its own sorted entry.
pub fn build_dashboard<'a, I>(products: I, region_names: &HashMap<u64, String>) -> Dashboard
where
    I: IntoIterator<Item = &'a Product>,
{
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut per_status: BTreeMap<OrderStatus, u64> = BTreeMap::new();
    let mut per_region: BTreeMap<String, u64> = BTreeMap::new();
    let mut without_region = 0u64;
    let mut per_month: BTreeMap<String, MonthCounts> = BTreeMap::new();

    for product in products {
        *per_day.entry(product.date).or_default() += 1;
        *per_status.entry(product.order_status).or_default() += 1;

        match product.region.and_then(|id| region_names.get(&id)) {
            Some(name) => *per_region.entry(name.clone()).or_default() += 1,
            None => without_region += 1,
        }

        let month = per_month
            .entry(product.date.format("%Y-%m").to_string())
            .or_default();
        match product.order_status {
            OrderStatus::Pending => month.pending += 1,
            OrderStatus::Delivered => month.delivered += 1,
            _ => {}
        }
    }

    let (day_labels, day_counts): (Vec<String>, Vec<u64>) = per_day
        .into_iter()
        .map(|(day, count)| (day.format("%Y-%m-%d").to_string(), count))
        .unzip();

    let (status_labels, status_counts): (Vec<String>, Vec<u64>) = per_status
        .into_iter()
        .map(|(status, count)| (status.to_string(), count))
        .unzip();

    let (mut region_labels, mut region_counts): (Vec<String>, Vec<u64>) =
        per_region.into_iter().unzip();
    if without_region > 0 {
        region_labels.push(NO_REGION.to_string());
        region_counts.push(without_region);
    }

    let month_labels: Vec<String> = per_month.keys().cloned().collect();
    let pending = per_month.values().map(|counts| counts.pending).collect();
    let delivered = per_month.values().map(|counts| counts.delivered).collect();

    Dashboard {
        line_chart: SeriesChart {
            labels: day_labels,
            series: vec![Series {
                name: "Orders created".to_string(),
                data: day_counts,
            }],
        },
        donut_chart: DonutChart {
            labels: status_labels,
            series: status_counts,
        },
        bar_chart: SeriesChart {
            labels: region_labels,
            series: vec![Series {
                name: "Orders by region".to_string(),
                data: region_counts,
            }],
        },
        area_chart: SeriesChart {
            labels: month_labels,
            series: vec![
                Series {
                    name: OrderStatus::Pending.to_string(),
                    data: pending,
                },
                Series {
                    name: OrderStatus::Delivered.to_string(),
                    data: delivered,
                },
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::build_dashboard;
    use crate::models::product::{OrderStatus, Product};

    fn product(id: u64, date: (i32, u32, u32), status: OrderStatus, region: Option<u64>) -> Product {
        Product {
            id,
            name: "item".to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            order_number: format!("N-{id}"),
            weight: Decimal::ONE,
            address: String::new(),
            phone_number: String::new(),
            order_status: status,
            city: None,
            region,
            assigned_to: None,
            secret_key: format!("{id:010}"),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn two_days_one_month() {
        let products = vec![
            product(1, (2025, 1, 5), OrderStatus::Pending, None),
            product(2, (2025, 1, 6), OrderStatus::Delivered, None),
        ];

        let dashboard = build_dashboard(&products, &HashMap::new());

        assert_eq!(dashboard.line_chart.labels, vec!["2025-01-05", "2025-01-06"]);
        assert_eq!(dashboard.line_chart.series[0].data, vec![1, 1]);
        assert_eq!(dashboard.area_chart.labels, vec!["2025-01"]);
        assert_eq!(dashboard.area_chart.series[0].name, "Pending");
        assert_eq!(dashboard.area_chart.series[0].data, vec![1]);
        assert_eq!(dashboard.area_chart.series[1].name, "Delivered");
        assert_eq!(dashboard.area_chart.series[1].data, vec![1]);
    }

    #[test]
    fn month_with_only_other_statuses_still_gets_zero_entries() {
        let products = vec![
            product(1, (2025, 1, 5), OrderStatus::Pending, None),
            product(2, (2025, 3, 2), OrderStatus::Dispatched, None),
        ];

        let dashboard = build_dashboard(&products, &HashMap::new());

        assert_eq!(dashboard.area_chart.labels, vec!["2025-01", "2025-03"]);
        assert_eq!(dashboard.area_chart.series[0].data, vec![1, 0]);
        assert_eq!(dashboard.area_chart.series[1].data, vec![0, 0]);
    }

    #[test]
    fn regions_sorted_by_name_with_missing_region_last() {
        let regions = HashMap::from([(1, "Tashkent".to_string()), (2, "Andijan".to_string())]);
        let products = vec![
            product(1, (2025, 1, 5), OrderStatus::Pending, Some(1)),
            product(2, (2025, 1, 5), OrderStatus::Pending, None),
            product(3, (2025, 1, 5), OrderStatus::Delivered, Some(2)),
            product(4, (2025, 1, 5), OrderStatus::Delivered, Some(1)),
        ];

        let dashboard = build_dashboard(&products, &regions);

        assert_eq!(dashboard.bar_chart.labels, vec!["Andijan", "Tashkent", "None"]);
        assert_eq!(dashboard.bar_chart.series[0].data, vec![1, 2, 1]);
        assert_eq!(dashboard.donut_chart.labels, vec!["Pending", "Delivered"]);
        assert_eq!(dashboard.donut_chart.series, vec![2, 2]);
    }

    #[test]
    fn region_named_none_is_not_merged_with_missing_regions() {
        let regions = HashMap::from([(1, "None".to_string()), (2, "Zarafshan".to_string())]);
        let products = vec![
            product(1, (2025, 1, 5), OrderStatus::Pending, Some(1)),
            product(2, (2025, 1, 5), OrderStatus::Pending, Some(2)),
            product(3, (2025, 1, 5), OrderStatus::Pending, None),
            product(4, (2025, 1, 5), OrderStatus::Pending, None),
        ];

        let dashboard = build_dashboard(&products, &regions);

        assert_eq!(dashboard.bar_chart.labels, vec!["None", "Zarafshan", "None"]);
        assert_eq!(dashboard.bar_chart.series[0].data, vec![1, 1, 2]);
    }
}
