//! Product creation, edits and the courier-driven status transitions.

use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::info;
use validator::Validate;

use crate::error::AppError;
use crate::models::product::{OrderStatus, Product};
use crate::models::user::User;
use crate::state::AppState;

const SECRET_KEY_DIGITS: usize = 10;
const MAX_WEIGHT: i64 = 10_000;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 50))]
    pub order_number: String,
    pub weight: Decimal,
    #[validate(length(max = 255))]
    pub address: String,
    #[validate(length(max = 15))]
    pub phone_number: String,
    pub order_status: Option<OrderStatus>,
    pub city: Option<u64>,
    pub region: Option<u64>,
    pub assigned_to: Option<u64>,
}

/// Partial product edit. Nullable references distinguish "absent" from `null`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 50))]
    pub order_number: Option<String>,
    pub weight: Option<Decimal>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 15))]
    pub phone_number: Option<String>,
    pub order_status: Option<OrderStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<u64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub region: Option<Option<u64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<u64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub longitude: Option<Option<f64>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Receipt,
    Delivery,
}

impl Confirmation {
    pub fn target(self) -> OrderStatus {
        match self {
            Confirmation::Receipt => OrderStatus::Received,
            Confirmation::Delivery => OrderStatus::Delivered,
        }
    }

    pub fn detail(self) -> &'static str {
        match self {
            Confirmation::Receipt => "Product receipt confirmed.",
            Confirmation::Delivery => "Product delivery confirmed.",
        }
    }
}

/// Field checks that need no other records. Expects a trimmed order number.
pub fn validate_draft(draft: &ProductDraft) -> Result<(), AppError> {
    draft.validate()?;
    validate_weight(draft.weight)
}

pub fn create_product(state: &AppState, mut draft: ProductDraft) -> Result<Product, AppError> {
    draft.order_number = draft.order_number.trim().to_string();
    validate_draft(&draft)?;
    check_references(state, draft.city, draft.region, draft.assigned_to)?;

    let order_number = draft.order_number.clone();
    let id = state.ids.products.next();
    reserve_order_number(state, &order_number, id)?;
    let secret_key = reserve_secret_key(state, id);

    let product = Product {
        id,
        name: draft.name,
        date: draft.date.unwrap_or_else(|| Utc::now().date_naive()),
        order_number,
        weight: draft.weight,
        address: draft.address,
        phone_number: draft.phone_number,
        order_status: draft.order_status.unwrap_or(OrderStatus::Pending),
        city: draft.city,
        region: draft.region,
        assigned_to: draft.assigned_to,
        secret_key,
        latitude: None,
        longitude: None,
    };

    state.products.insert(id, product.clone());
    info!(product_id = id, order_number = %product.order_number, "product created");
    Ok(product)
}

pub fn update_product(
    state: &AppState,
    id: u64,
    mut update: ProductUpdate,
) -> Result<Product, AppError> {
    update.order_number = update.order_number.map(|number| number.trim().to_string());
    update.validate()?;
    if let Some(weight) = update.weight {
        validate_weight(weight)?;
    }
    check_references(
        state,
        update.city.flatten(),
        update.region.flatten(),
        update.assigned_to.flatten(),
    )?;

    let current = state
        .product(id)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    if let Some(order_number) = update.order_number.as_deref() {
        if order_number != current.order_number {
            reserve_order_number(state, order_number, id)?;
            state.order_numbers.remove(&current.order_number);
        }
    }

    let mut product = state
        .products
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    if let Some(name) = update.name {
        product.name = name;
    }
    if let Some(date) = update.date {
        product.date = date;
    }
    if let Some(order_number) = update.order_number {
        product.order_number = order_number;
    }
    if let Some(weight) = update.weight {
        product.weight = weight;
    }
    if let Some(address) = update.address {
        product.address = address;
    }
    if let Some(phone_number) = update.phone_number {
        product.phone_number = phone_number;
    }
    if let Some(status) = update.order_status {
        product.order_status = status;
    }
    if let Some(city) = update.city {
        product.city = city;
    }
    if let Some(region) = update.region {
        product.region = region;
    }
    if let Some(assigned_to) = update.assigned_to {
        product.assigned_to = assigned_to;
    }
    if let Some(latitude) = update.latitude {
        product.latitude = latitude;
    }
    if let Some(longitude) = update.longitude {
        product.longitude = longitude;
    }

    Ok(product.clone())
}

/// Moves a product to `Received` or `Delivered` on behalf of its courier.
///
/// Prior status is not checked unless `require_receipt_before_delivery` is set.
pub fn confirm(
    state: &AppState,
    user: &User,
    product_id: Option<u64>,
    confirmation: Confirmation,
) -> Result<Product, AppError> {
    let product_id = product_id
        .filter(|id| *id != 0)
        .ok_or_else(|| AppError::BadRequest("Product ID is required.".to_string()))?;

    if !state.products.contains_key(&product_id) {
        return Err(AppError::NotFound("No Product matches the given query.".to_string()));
    }

    let courier = state.courier_for_user(user.id).ok_or_else(|| {
        AppError::Forbidden("You are not authorized as a courier.".to_string())
    })?;

    let mut product = state
        .products
        .get_mut(&product_id)
        .ok_or_else(|| AppError::NotFound("No Product matches the given query.".to_string()))?;

    if product.assigned_to != Some(courier.id) {
        return Err(AppError::Forbidden(
            "You are not assigned to this product.".to_string(),
        ));
    }

    if confirmation == Confirmation::Delivery
        && state.config.require_receipt_before_delivery
        && product.order_status != OrderStatus::Received
    {
        return Err(AppError::BadRequest("Product must be received first.".to_string()));
    }

    let previous = product.order_status;
    product.order_status = confirmation.target();

    state
        .metrics
        .status_transitions_total
        .with_label_values(&[confirmation.target().as_str()])
        .inc();
    info!(
        product_id,
        courier_id = courier.id,
        from = %previous,
        to = %product.order_status,
        "product status confirmed"
    );

    Ok(product.clone())
}

/// Recipient-side geolocation update keyed by the product's secret key.
pub fn update_location(
    state: &AppState,
    secret_key: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Product, AppError> {
    let secret_key = secret_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::BadRequest("Secret key is required.".to_string()))?;

    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Err(AppError::BadRequest(
            "Both latitude and longitude are required.".to_string(),
        ));
    };

    let product_id = find_by_secret_key(state, secret_key)?;
    let mut product = state
        .products
        .get_mut(&product_id)
        .ok_or_else(|| AppError::NotFound("Product not found.".to_string()))?;

    product.latitude = Some(latitude);
    product.longitude = Some(longitude);
    info!(product_id, "recipient location updated");

    Ok(product.clone())
}

pub fn find_by_secret_key(state: &AppState, secret_key: &str) -> Result<u64, AppError> {
    state
        .secret_keys
        .get(secret_key)
        .map(|entry| *entry.value())
        .ok_or_else(|| AppError::NotFound("Product not found.".to_string()))
}

fn validate_weight(weight: Decimal) -> Result<(), AppError> {
    if weight.is_sign_negative() {
        return Err(AppError::BadRequest("weight: must not be negative.".to_string()));
    }
    if weight.normalize().scale() > 2 {
        return Err(AppError::BadRequest(
            "weight: Ensure that there are no more than 2 decimal places.".to_string(),
        ));
    }
    if weight >= Decimal::from(MAX_WEIGHT) {
        return Err(AppError::BadRequest(
            "weight: Ensure that there are no more than 4 digits before the decimal point."
                .to_string(),
        ));
    }
    Ok(())
}

fn check_references(
    state: &AppState,
    city: Option<u64>,
    region: Option<u64>,
    courier: Option<u64>,
) -> Result<(), AppError> {
    if let Some(city) = city.filter(|id| !state.cities.contains_key(id)) {
        return Err(AppError::BadRequest(format!("city: city {city} does not exist.")));
    }
    if let Some(region) = region.filter(|id| !state.regions.contains_key(id)) {
        return Err(AppError::BadRequest(format!(
            "region: region {region} does not exist."
        )));
    }
    if let Some(courier) = courier.filter(|id| !state.couriers.contains_key(id)) {
        return Err(AppError::BadRequest(format!(
            "assigned_to: courier {courier} does not exist."
        )));
    }
    Ok(())
}

fn reserve_order_number(state: &AppState, order_number: &str, id: u64) -> Result<(), AppError> {
    match state.order_numbers.entry(order_number.to_string()) {
        Entry::Occupied(_) => Err(AppError::Conflict(format!(
            "product with order number {order_number} already exists."
        ))),
        Entry::Vacant(slot) => {
            slot.insert(id);
            Ok(())
        }
    }
}

fn reserve_secret_key(state: &AppState, id: u64) -> String {
    loop {
        let candidate = generate_secret_key();
        if let Entry::Vacant(slot) = state.secret_keys.entry(candidate.clone()) {
            slot.insert(id);
            return candidate;
        }
    }
}

fn generate_secret_key() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_KEY_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::config::Config;
    use crate::models::courier::Courier;
    use crate::models::user::Role;
    use crate::notify::DisabledGateway;

    fn state(config: Config) -> AppState {
        AppState::new(config, Arc::new(DisabledGateway))
    }

    fn draft(order_number: &str) -> ProductDraft {
        ProductDraft {
            name: "Phone case".to_string(),
            date: None,
            order_number: order_number.to_string(),
            weight: Decimal::new(125, 2),
            address: "12 Amir Temur".to_string(),
            phone_number: "+998901112233".to_string(),
            order_status: None,
            city: None,
            region: None,
            assigned_to: None,
        }
    }

    fn courier_user(state: &AppState, user_id: u64, courier_id: u64) -> User {
        state.insert_courier(Courier {
            id: courier_id,
            user: user_id,
            covered_cities: BTreeSet::new(),
        });
        User {
            id: user_id,
            username: format!("courier{user_id}"),
            password_hash: String::new(),
            role: Role::Courier,
            first_name: String::new(),
            last_name: String::new(),
            phone_number: String::new(),
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn created_product_gets_ten_digit_secret_key_and_pending_status() {
        let state = state(Config::default());
        let product = create_product(&state, draft("A-1")).unwrap();

        assert_eq!(product.secret_key.len(), 10);
        assert!(product.secret_key.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(product.order_status, OrderStatus::Pending);
        assert_eq!(find_by_secret_key(&state, &product.secret_key).unwrap(), product.id);
    }

    #[test]
    fn duplicate_order_number_is_a_conflict() {
        let state = state(Config::default());
        create_product(&state, draft("A-1")).unwrap();

        let err = create_product(&state, draft("A-1")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(state.products.len(), 1);
    }

    #[test]
    fn weight_with_three_decimals_is_rejected() {
        let state = state(Config::default());
        let mut bad = draft("A-2");
        bad.weight = Decimal::new(1255, 3);

        assert!(matches!(create_product(&state, bad), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn blank_order_number_is_rejected() {
        let state = state(Config::default());

        let err = create_product(&state, draft("   ")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(state.products.is_empty());
        assert!(state.order_numbers.is_empty());
    }

    #[test]
    fn order_number_is_stored_trimmed() {
        let state = state(Config::default());
        let product = create_product(&state, draft("  A-7 ")).unwrap();

        assert_eq!(product.order_number, "A-7");
        assert!(matches!(
            create_product(&state, draft("A-7")),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn blank_order_number_is_rejected_on_update() {
        let state = state(Config::default());
        let product = create_product(&state, draft("KEEP")).unwrap();

        let update = ProductUpdate {
            order_number: Some("  ".to_string()),
            ..ProductUpdate::default()
        };
        let err = update_product(&state, product.id, update).unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(state.product(product.id).unwrap().order_number, "KEEP");
        assert!(state.order_numbers.contains_key("KEEP"));
    }

    #[test]
    fn renaming_order_number_frees_the_old_one() {
        let state = state(Config::default());
        let product = create_product(&state, draft("OLD")).unwrap();

        let update = ProductUpdate {
            order_number: Some("NEW".to_string()),
            ..ProductUpdate::default()
        };
        update_product(&state, product.id, update).unwrap();

        assert!(create_product(&state, draft("OLD")).is_ok());
        assert!(matches!(
            create_product(&state, draft("NEW")),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn receipt_is_forced_regardless_of_prior_status() {
        let state = state(Config::default());
        let user = courier_user(&state, 7, 70);
        let mut assigned = draft("A-3");
        assigned.assigned_to = Some(70);
        assigned.order_status = Some(OrderStatus::Delivered);
        let product = create_product(&state, assigned).unwrap();

        let confirmed = confirm(&state, &user, Some(product.id), Confirmation::Receipt).unwrap();
        assert_eq!(confirmed.order_status, OrderStatus::Received);
    }

    #[test]
    fn delivery_guard_applies_only_when_configured() {
        let strict = state(Config {
            require_receipt_before_delivery: true,
            ..Config::default()
        });
        let user = courier_user(&strict, 7, 70);
        let mut assigned = draft("A-4");
        assigned.assigned_to = Some(70);
        let product = create_product(&strict, assigned).unwrap();

        let err = confirm(&strict, &user, Some(product.id), Confirmation::Delivery).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        confirm(&strict, &user, Some(product.id), Confirmation::Receipt).unwrap();
        let delivered = confirm(&strict, &user, Some(product.id), Confirmation::Delivery).unwrap();
        assert_eq!(delivered.order_status, OrderStatus::Delivered);
    }

    #[test]
    fn confirmation_failures_are_checked_in_order() {
        let state = state(Config::default());
        let courier = courier_user(&state, 7, 70);
        let product = create_product(&state, draft("A-5")).unwrap();
        let stranger = User {
            id: 8,
            ..courier.clone()
        };

        assert!(matches!(
            confirm(&state, &courier, None, Confirmation::Receipt),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            confirm(&state, &courier, Some(999), Confirmation::Receipt),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            confirm(&state, &stranger, Some(product.id), Confirmation::Receipt),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            confirm(&state, &courier, Some(product.id), Confirmation::Delivery),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(state.product(product.id).unwrap().order_status, OrderStatus::Pending);
    }

    #[test]
    fn location_update_requires_known_key_and_both_coordinates() {
        let state = state(Config::default());
        let product = create_product(&state, draft("A-6")).unwrap();

        assert!(matches!(
            update_location(&state, Some(&product.secret_key), Some(41.3), None),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            update_location(&state, Some("0000000000x"), Some(41.3), Some(69.2)),
            Err(AppError::NotFound(_))
        ));

        let updated =
            update_location(&state, Some(&product.secret_key), Some(41.3), Some(69.2)).unwrap();
        assert_eq!(updated.latitude, Some(41.3));
        assert_eq!(updated.longitude, Some(69.2));
    }
}
