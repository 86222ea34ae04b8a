//! Courier coverage rules and the "assigned" filters.
//!
//! "Assigned" means two different things here: a courier is assigned when it
//! covers at least one city, a product is assigned when it has a courier.

use dashmap::DashMap;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::geography::City;
use crate::models::product::{OrderStatus, Product};
use crate::models::user::{Role, User};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Assigned,
    Unassigned,
}

impl Assignment {
    /// Parses the `assigned` query value; anything unrecognised disables the filter.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "assigned" => Some(Assignment::Assigned),
            "unassigned" => Some(Assignment::Unassigned),
            _ => None,
        }
    }

    fn accepts(self, assigned: bool) -> bool {
        match self {
            Assignment::Assigned => assigned,
            Assignment::Unassigned => !assigned,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CourierFilter {
    pub assigned: Option<String>,
    pub region: Option<u64>,
    pub city: Option<u64>,
}

impl CourierFilter {
    pub fn matches(&self, courier: &Courier, cities: &DashMap<u64, City>) -> bool {
        if let Some(assignment) = self.assigned.as_deref().and_then(Assignment::parse) {
            if !assignment.accepts(courier.is_assigned()) {
                return false;
            }
        }

        if let Some(city) = self.city {
            if !courier.covered_cities.contains(&city) {
                return false;
            }
        }

        if let Some(region) = self.region {
            let covers_region = courier.covered_cities.iter().any(|city_id| {
                cities
                    .get(city_id)
                    .is_some_and(|city| city.region == region)
            });
            if !covers_region {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub assigned: Option<String>,
    pub region: Option<u64>,
    pub city: Option<u64>,
    pub order_status: Option<OrderStatus>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(assignment) = self.assigned.as_deref().and_then(Assignment::parse) {
            if !assignment.accepts(product.assigned_to.is_some()) {
                return false;
            }
        }

        self.region.is_none_or(|region| product.region == Some(region))
            && self.city.is_none_or(|city| product.city == Some(city))
            && self
                .order_status
                .is_none_or(|status| product.order_status == status)
    }
}

/// Checks a product creation made by a Courier Boss.
///
/// The target courier must share at least one covered city with the boss's own
/// courier record. Other roles pass unchecked, and updates never call this.
pub fn check_boss_assignment(
    state: &AppState,
    requester: &User,
    assigned_to: Option<u64>,
) -> Result<(), AppError> {
    if requester.role != Role::CourierBoss {
        return Ok(());
    }

    let courier_id = assigned_to
        .ok_or_else(|| AppError::BadRequest("assigned_to: This field is required.".to_string()))?;

    let target = state
        .couriers
        .get(&courier_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| {
            AppError::BadRequest(format!("assigned_to: courier {courier_id} does not exist."))
        })?;

    let own = state.courier_for_user(requester.id).ok_or_else(coverage_denied)?;

    if target.shares_coverage_with(&own) {
        Ok(())
    } else {
        tracing::warn!(
            requester = requester.id,
            courier_id,
            "courier boss tried to assign courier outside shared coverage"
        );
        Err(coverage_denied())
    }
}

fn coverage_denied() -> AppError {
    AppError::Forbidden("This courier does not cover the required city.".to_string())
}
