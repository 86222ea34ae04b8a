//! Spreadsheet order import.
//!
//! Column layout of the first worksheet (row 1 is a header):
//!
//! | col | content |
//! |-----|---------|
//! | 0 | serial number, ignored |
//! | 1 | status marker, `确认订单` means the order is confirmed |
//! | 2 | creation timestamp |
//! | 3 | order number |
//! | 4 | weight, comma or dot decimal separator |
//! | 5 | English name |
//! | 6 | Chinese name |
//! | 7 | address |
//! | 8 | city, `Province/City` style values keep the last segment |
//! | 9 | region, same normalisation as city |
//! | 10 | phone number |
//!
//! Every non-empty row yields exactly one message; a bad row never stops the batch.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::lifecycle::{create_product, validate_draft, ProductDraft};
use crate::error::AppError;
use crate::models::geography::{City, Region};
use crate::models::product::{OrderStatus, Product};
use crate::notify::{SmsError, SmsMessage};
use crate::state::AppState;

const CONFIRMED_MARKER: &str = "确认订单";
const NAME_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook has no worksheets")]
    NoWorksheet,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub messages: Vec<String>,
}

/// Reads the first worksheet, dropping the header row.
pub fn read_rows(bytes: Vec<u8>) -> Result<Vec<Vec<Data>>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoWorksheet)??;

    Ok(range.rows().skip(1).map(<[Data]>::to_vec).collect())
}

pub async fn import_workbook(
    state: &AppState,
    bytes: Vec<u8>,
    send_sms: bool,
) -> Result<ImportReport, ImportError> {
    let rows = read_rows(bytes)?;
    Ok(import_rows(state, rows, send_sms).await)
}

/// Imports already-read data rows. Row numbers in messages are spreadsheet
/// row numbers, so the first data row is row 2.
pub async fn import_rows(state: &AppState, rows: Vec<Vec<Data>>, send_sms: bool) -> ImportReport {
    let mut report = ImportReport {
        created: 0,
        messages: Vec::with_capacity(rows.len()),
    };

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 2;
        if row.iter().all(|cell| cell_text(cell).is_empty()) {
            continue;
        }

        let (product, notes) = match parse_row(row).and_then(|parsed| store_row(state, parsed)) {
            Ok(stored) => stored,
            Err(reason) => {
                state
                    .metrics
                    .imported_rows_total
                    .with_label_values(&["failed"])
                    .inc();
                warn!(row = row_number, reason = %reason, "import row rejected");
                report.messages.push(format!("Row {row_number}: {reason}"));
                continue;
            }
        };

        state
            .metrics
            .imported_rows_total
            .with_label_values(&["created"])
            .inc();
        report.created += 1;

        let mut message = format!(
            "Row {row_number}: product {} imported.",
            product.order_number
        );
        for note in notes {
            message.push(' ');
            message.push_str(&note);
        }
        if send_sms {
            message.push(' ');
            message.push_str(&notify_recipient(state, &product).await);
        }
        report.messages.push(message);
    }

    info!(
        created = report.created,
        rows = report.messages.len(),
        "spreadsheet import finished"
    );
    report
}

#[derive(Debug, Clone, PartialEq)]
struct ParsedRow {
    status: OrderStatus,
    date: NaiveDate,
    order_number: String,
    weight: Decimal,
    name: String,
    address: String,
    city: Option<String>,
    region: Option<String>,
    phone_number: String,
}

fn parse_row(row: &[Data]) -> Result<ParsedRow, String> {
    let text = |idx: usize| row.get(idx).map(cell_text).unwrap_or_default();

    let order_number = text(3);
    if order_number.is_empty() {
        return Err("order number is missing.".to_string());
    }

    let weight = row
        .get(4)
        .ok_or_else(|| format!("order {order_number}: weight is missing."))
        .and_then(|cell| {
            parse_weight(cell).map_err(|reason| format!("order {order_number}: {reason}"))
        })?;

    let date = match row.get(2) {
        Some(cell) => parse_date(cell)
            .map_err(|reason| format!("order {order_number}: {reason}"))?
            .unwrap_or_else(|| Utc::now().date_naive()),
        None => Utc::now().date_naive(),
    };

    let status = if text(1) == CONFIRMED_MARKER {
        OrderStatus::Dispatched
    } else {
        OrderStatus::Pending
    };

    let name = [text(5), text(6)]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_else(|| "Unnamed".to_string())
        .chars()
        .take(NAME_LIMIT)
        .collect();

    Ok(ParsedRow {
        status,
        date,
        order_number,
        weight,
        name,
        address: text(7),
        city: normalize_place(&text(8)),
        region: normalize_place(&text(9)),
        phone_number: text(10).replace(' ', ""),
    })
}

/// Stores one parsed row. Field checks run before any region or city is
/// created, so a rejected row leaves no places behind. The returned notes
/// describe data that was dropped from an otherwise imported row.
fn store_row(state: &AppState, row: ParsedRow) -> Result<(Product, Vec<String>), String> {
    let failure = |err: AppError| format!("order {}: {}", row.order_number, err.message());

    let mut draft = ProductDraft {
        name: row.name.clone(),
        date: Some(row.date),
        order_number: row.order_number.clone(),
        weight: row.weight,
        address: row.address.clone(),
        phone_number: row.phone_number.clone(),
        order_status: Some(row.status),
        city: None,
        region: None,
        assigned_to: None,
    };
    validate_draft(&draft).map_err(failure)?;
    if state.order_numbers.contains_key(&draft.order_number) {
        return Err(format!(
            "order {0}: product with order number {0} already exists.",
            row.order_number
        ));
    }

    let mut notes = Vec::new();
    draft.region = row
        .region
        .as_deref()
        .map(|name| resolve_region(state, name));
    if let Some(name) = row.city.as_deref() {
        draft.city = resolve_city(state, name, draft.region);
        if draft.city.is_none() {
            notes.push(format!("City \"{name}\" skipped: no region given."));
        }
    }

    let product = create_product(state, draft).map_err(failure)?;
    Ok((product, notes))
}

async fn notify_recipient(state: &AppState, product: &Product) -> String {
    if product.phone_number.is_empty() {
        return "SMS skipped: no phone number.".to_string();
    }

    let message = SmsMessage {
        sms_id: product.id.to_string(),
        phone: product.phone_number.clone(),
        text: format!(
            "Your order {} is registered. Share your delivery location: {}?secret_key={}",
            product.order_number, state.config.tracking_url_base, product.secret_key
        ),
    };

    let (outcome, note) = match state.sms.send(&message).await {
        Ok(_) => ("sent", "SMS sent.".to_string()),
        Err(SmsError::Disabled) => ("skipped", "SMS skipped: gateway not configured.".to_string()),
        Err(err) => {
            warn!(product_id = product.id, error = %err, "sms notification failed");
            ("failed", format!("SMS failed: {err}"))
        }
    };
    state
        .metrics
        .sms_sent_total
        .with_label_values(&[outcome])
        .inc();
    note
}

fn resolve_region(state: &AppState, name: &str) -> u64 {
    if let Some(existing) = state
        .regions
        .iter()
        .find(|entry| entry.value().name.eq_ignore_ascii_case(name))
    {
        return *existing.key();
    }

    let id = state.ids.regions.next();
    state.regions.insert(
        id,
        Region {
            id,
            name: name.to_string(),
        },
    );
    info!(region_id = id, name, "region created by import");
    id
}

/// Finds a city by name, within `region` when one is known. New cities are
/// only created when a region is available to own them.
fn resolve_city(state: &AppState, name: &str, region: Option<u64>) -> Option<u64> {
    if let Some(existing) = state.cities.iter().find(|entry| {
        let city = entry.value();
        city.name.eq_ignore_ascii_case(name) && region.is_none_or(|id| city.region == id)
    }) {
        return Some(*existing.key());
    }

    let region = region?;
    let id = state.ids.cities.next();
    state.cities.insert(
        id,
        City {
            id,
            name: name.to_string(),
            region,
        },
    );
    info!(city_id = id, name, "city created by import");
    Some(id)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.trim().to_string(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        other => other.to_string().trim().to_string(),
    }
}

fn parse_weight(cell: &Data) -> Result<Decimal, String> {
    let weight = match cell {
        Data::Int(value) => Decimal::from(*value),
        Data::Float(value) => Decimal::try_from(*value)
            .map_err(|_| format!("invalid weight {value}."))?,
        Data::Empty => return Err("weight is missing.".to_string()),
        other => {
            let raw = cell_text(other).replace(',', ".");
            if raw.is_empty() {
                return Err("weight is missing.".to_string());
            }
            raw.parse::<Decimal>()
                .map_err(|_| format!("invalid weight {raw:?}."))?
        }
    };
    Ok(weight.round_dp(2))
}

/// `Ok(None)` for an empty cell, which the caller turns into today's date.
fn parse_date(cell: &Data) -> Result<Option<NaiveDate>, String> {
    match cell {
        Data::Empty => Ok(None),
        Data::DateTime(value) => value
            .as_datetime()
            .map(|timestamp| Some(timestamp.date()))
            .ok_or_else(|| "invalid creation date.".to_string()),
        other => {
            let raw = cell_text(other);
            if raw.is_empty() {
                return Ok(None);
            }
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
                .map(|timestamp| timestamp.date())
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S")
                        .map(|timestamp| timestamp.date())
                })
                .or_else(|_| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
                .map(Some)
                .map_err(|_| format!("invalid creation date {raw:?}."))
        }
    }
}

/// Keeps the segment after the last `/`, trimmed and title-cased.
fn normalize_place(raw: &str) -> Option<String> {
    let segment = raw.rsplit('/').next().unwrap_or(raw).trim();
    if segment.is_empty() {
        return None;
    }

    let mut titled = String::with_capacity(segment.len());
    let mut previous_alphabetic = false;
    for ch in segment.chars() {
        if previous_alphabetic {
            titled.extend(ch.to_lowercase());
        } else {
            titled.extend(ch.to_uppercase());
        }
        previous_alphabetic = ch.is_alphabetic();
    }
    Some(titled)
}
