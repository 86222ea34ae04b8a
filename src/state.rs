use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use crate::auth::JwtKeys;
use crate::config::Config;
use crate::models::courier::Courier;
use crate::models::geography::{City, Region};
use crate::models::product::Product;
use crate::models::user::User;
use crate::notify::SmsGateway;
use crate::observability::metrics::Metrics;

/// Monotonic id source, one per entity table.
#[derive(Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Default)]
pub struct Sequences {
    pub users: Sequence,
    pub regions: Sequence,
    pub cities: Sequence,
    pub couriers: Sequence,
    pub products: Sequence,
}

pub struct AppState {
    pub config: Config,
    pub jwt: JwtKeys,
    pub users: DashMap<u64, User>,
    pub usernames: DashMap<String, u64>,
    pub regions: DashMap<u64, Region>,
    pub cities: DashMap<u64, City>,
    pub couriers: DashMap<u64, Courier>,
    /// user id -> courier id
    pub courier_users: DashMap<u64, u64>,
    pub products: DashMap<u64, Product>,
    /// order number -> product id
    pub order_numbers: DashMap<String, u64>,
    /// secret key -> product id
    pub secret_keys: DashMap<String, u64>,
    /// `jti`s of refresh tokens revoked through logout
    pub revoked_tokens: DashSet<String>,
    pub ids: Sequences,
    pub sms: Arc<dyn SmsGateway>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config, sms: Arc<dyn SmsGateway>) -> Self {
        Self {
            jwt: JwtKeys::from_config(&config),
            config,
            users: DashMap::new(),
            usernames: DashMap::new(),
            regions: DashMap::new(),
            cities: DashMap::new(),
            couriers: DashMap::new(),
            courier_users: DashMap::new(),
            products: DashMap::new(),
            order_numbers: DashMap::new(),
            secret_keys: DashMap::new(),
            revoked_tokens: DashSet::new(),
            ids: Sequences::default(),
            sms,
            metrics: Metrics::new(),
        }
    }

    pub fn courier_for_user(&self, user_id: u64) -> Option<Courier> {
        let courier_id = *self.courier_users.get(&user_id)?.value();
        self.couriers.get(&courier_id).map(|entry| entry.value().clone())
    }

    /// Stores a courier unless its user already has one. Returns `false` on
    /// a duplicate without touching either table.
    pub fn insert_courier(&self, courier: Courier) -> bool {
        match self.courier_users.entry(courier.user) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(courier.id);
                self.couriers.insert(courier.id, courier);
                true
            }
        }
    }

    pub fn product(&self, id: u64) -> Option<Product> {
        self.products.get(&id).map(|entry| entry.value().clone())
    }

    pub fn delete_product(&self, id: u64) -> Option<Product> {
        let (_, product) = self.products.remove(&id)?;
        self.order_numbers.remove(&product.order_number);
        self.secret_keys.remove(&product.secret_key);
        Some(product)
    }

    /// Removes a courier and unassigns its products.
    pub fn delete_courier(&self, id: u64) -> Option<Courier> {
        let (_, courier) = self.couriers.remove(&id)?;
        self.courier_users.remove(&courier.user);
        for mut product in self.products.iter_mut() {
            if product.assigned_to == Some(id) {
                product.assigned_to = None;
            }
        }
        Some(courier)
    }

    /// Removes a user together with its courier record.
    pub fn delete_user(&self, id: u64) -> Option<User> {
        let (_, user) = self.users.remove(&id)?;
        self.usernames.remove(&user.username.to_lowercase());

        let courier_id = self.courier_users.get(&id).map(|entry| *entry.value());
        if let Some(courier_id) = courier_id {
            self.delete_courier(courier_id);
        }
        Some(user)
    }

    /// Removes a city, dropping it from courier coverage and nulling product references.
    pub fn delete_city(&self, id: u64) -> Option<City> {
        let (_, city) = self.cities.remove(&id)?;
        for mut courier in self.couriers.iter_mut() {
            courier.covered_cities.remove(&id);
        }
        for mut product in self.products.iter_mut() {
            if product.city == Some(id) {
                product.city = None;
            }
        }
        Some(city)
    }

    /// Removes a region and every city inside it.
    pub fn delete_region(&self, id: u64) -> Option<Region> {
        let (_, region) = self.regions.remove(&id)?;

        let city_ids: Vec<u64> = self
            .cities
            .iter()
            .filter(|entry| entry.value().region == id)
            .map(|entry| *entry.key())
            .collect();
        for city_id in city_ids {
            self.delete_city(city_id);
        }

        for mut product in self.products.iter_mut() {
            if product.region == Some(id) {
                product.region = None;
            }
        }
        Some(region)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::AppState;
    use crate::config::Config;
    use crate::models::courier::Courier;
    use crate::models::geography::{City, Region};
    use crate::models::product::{OrderStatus, Product};
    use crate::notify::DisabledGateway;

    fn state() -> AppState {
        AppState::new(Config::default(), Arc::new(DisabledGateway))
    }

    fn product(id: u64, city: u64, region: u64, courier: u64) -> Product {
        Product {
            id,
            name: "parcel".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            order_number: format!("ORD-{id}"),
            weight: Decimal::new(150, 2),
            address: "1 Main St".to_string(),
            phone_number: "+998900000000".to_string(),
            order_status: OrderStatus::Pending,
            city: Some(city),
            region: Some(region),
            assigned_to: Some(courier),
            secret_key: format!("{id:010}"),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn deleting_region_cascades_to_cities_but_not_products() {
        let state = state();
        state.regions.insert(1, Region { id: 1, name: "Tashkent".to_string() });
        state.cities.insert(10, City { id: 10, name: "Chilanzar".to_string(), region: 1 });
        state.insert_courier(Courier { id: 5, user: 50, covered_cities: BTreeSet::from([10]) });
        state.products.insert(100, product(100, 10, 1, 5));

        state.delete_region(1);

        assert!(state.cities.is_empty());
        assert!(state.couriers.get(&5).unwrap().covered_cities.is_empty());
        let kept = state.product(100).unwrap();
        assert_eq!(kept.city, None);
        assert_eq!(kept.region, None);
        assert_eq!(kept.assigned_to, Some(5));
    }

    #[test]
    fn deleting_courier_unassigns_products() {
        let state = state();
        state.insert_courier(Courier { id: 5, user: 50, covered_cities: BTreeSet::new() });
        state.products.insert(100, product(100, 10, 1, 5));

        state.delete_courier(5);

        assert_eq!(state.product(100).unwrap().assigned_to, None);
        assert!(state.courier_for_user(50).is_none());
    }

    #[test]
    fn second_courier_for_same_user_is_refused() {
        let state = state();
        assert!(state.insert_courier(Courier { id: 1, user: 50, covered_cities: BTreeSet::new() }));
        assert!(!state.insert_courier(Courier { id: 2, user: 50, covered_cities: BTreeSet::new() }));

        assert_eq!(state.couriers.len(), 1);
        assert_eq!(state.courier_for_user(50).unwrap().id, 1);
    }

    #[test]
    fn deleting_user_removes_its_courier() {
        let state = state();
        state.users.insert(
            50,
            crate::models::user::User {
                id: 50,
                username: "rider".to_string(),
                password_hash: String::new(),
                role: crate::models::user::Role::Courier,
                first_name: String::new(),
                last_name: String::new(),
                phone_number: String::new(),
                date_joined: chrono::Utc::now(),
            },
        );
        state.insert_courier(Courier { id: 5, user: 50, covered_cities: BTreeSet::new() });

        state.delete_user(50);

        assert!(state.couriers.is_empty());
        assert!(state.courier_users.is_empty());
    }
}
