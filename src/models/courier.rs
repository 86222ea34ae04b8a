use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: u64,
    pub user: u64,
    pub covered_cities: BTreeSet<u64>,
}

impl Courier {
    /// A courier counts as assigned once it covers at least one city,
    /// whether or not any product is routed to it.
    pub fn is_assigned(&self) -> bool {
        !self.covered_cities.is_empty()
    }

    pub fn shares_coverage_with(&self, other: &Courier) -> bool {
        !self.covered_cities.is_disjoint(&other.covered_cities)
    }
}
