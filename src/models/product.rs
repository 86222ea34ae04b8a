use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Delivery status of a product.
///
/// `Received` is set by the receipt confirmation endpoint; it sits between
/// `Dispatched` and `Delivered`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    Pending,
    Dispatched,
    Received,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Dispatched,
        OrderStatus::Received,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Dispatched => "Dispatched",
            OrderStatus::Received => "Received",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown order status: {raw}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub date: NaiveDate,
    pub order_number: String,
    pub weight: Decimal,
    pub address: String,
    pub phone_number: String,
    pub order_status: OrderStatus,
    pub city: Option<u64>,
    pub region: Option<u64>,
    pub assigned_to: Option<u64>,
    pub secret_key: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
