//! Mapping raw trip records into [`Trip`]

use super::types::{
    timestamp, CostBreakdown, NewTrip, Trip, TripDocument, TripSource, TripStatus, WebhookTrip,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

pub const UNKNOWN: &str = "Unknown";
pub const UNASSIGNED: &str = "Unassigned";

/// One CSV data row keyed by header name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRow {
    /// 1-based position among the data rows
    pub row: usize,
    pub fields: HashMap<String, String>,
}

impl CsvRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn number(&self, column: &str) -> f64 {
        self.get(column).map(parse_number).unwrap_or(0.0)
    }
}

/// A trip record as received from one of the sources
#[derive(Debug, Clone, PartialEq)]
pub enum RawTrip {
    /// Document from the trips collection
    Internal(TripDocument),
    /// Document booked through the web-book portal
    WebBook(TripDocument),
    Webhook(WebhookTrip),
    Manual(NewTrip),
    Csv(CsvRow),
}

/// Produce a [`Trip`] with every missing field defaulted
pub fn normalize(raw: RawTrip, now: DateTime<Utc>) -> Trip {
    match raw {
        RawTrip::Internal(doc) => {
            let source = TripSource::from_import_source(doc.import_source.as_deref());
            let prefix = if source == TripSource::WebBook { "WB" } else { "TR" };
            from_document(doc, source, prefix, now)
        }
        RawTrip::WebBook(doc) => from_document(doc, TripSource::WebBook, "WB", now),
        RawTrip::Webhook(payload) => from_webhook(payload, now),
        RawTrip::Manual(input) => from_manual(input, now),
        RawTrip::Csv(row) => from_csv(row, now),
    }
}

fn from_document(doc: TripDocument, source: TripSource, prefix: &str, now: DateTime<Utc>) -> Trip {
    let (route_origin, route_destination) = split_route(doc.route.as_deref());
    let delivered = doc.delivered_status.unwrap_or(false);
    let status = doc.status.unwrap_or(if delivered {
        TripStatus::Completed
    } else {
        TripStatus::Active
    });
    let shipped = doc
        .shipped_status
        .unwrap_or(matches!(status, TripStatus::Shipped | TripStatus::Delivered));
    let delivered = delivered || status == TripStatus::Delivered;

    let external_id = match source {
        TripSource::WebBook => doc.external_id.or_else(|| Some(doc.id.clone())),
        _ => doc.external_id,
    };

    Trip {
        trip_number: text(doc.load_ref).unwrap_or_else(|| short_number(prefix, &doc.id)),
        customer: text(doc.customer),
        origin: text(doc.origin)
            .or(route_origin)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        destination: text(doc.destination)
            .or(route_destination)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        start_date: text(doc.start_time).unwrap_or_else(|| timestamp(now)),
        end_date: text(doc.end_time).unwrap_or_else(|| timestamp(now)),
        status,
        shipped,
        delivered,
        driver: text(doc.driver).unwrap_or_else(|| UNASSIGNED.to_string()),
        vehicle: text(doc.vehicle).unwrap_or_else(|| UNASSIGNED.to_string()),
        distance: doc.distance.unwrap_or(0.0),
        cost: doc.total_cost.unwrap_or(0.0),
        cost_breakdown: Some(doc.cost_breakdown.unwrap_or_default()),
        source,
        external_id,
        last_updated: text(doc.updated_at).unwrap_or_else(|| timestamp(now)),
        id: doc.id,
    }
}

fn from_webhook(payload: WebhookTrip, now: DateTime<Utc>) -> Trip {
    let status = payload.status.unwrap_or(TripStatus::Active);
    Trip {
        trip_number: text(payload.trip_number).unwrap_or_else(|| short_number("WH", &payload.id)),
        customer: text(payload.customer),
        origin: text(payload.origin).unwrap_or_else(|| UNKNOWN.to_string()),
        destination: text(payload.destination).unwrap_or_else(|| UNKNOWN.to_string()),
        start_date: text(payload.start_date).unwrap_or_else(|| timestamp(now)),
        end_date: text(payload.end_date).unwrap_or_else(|| timestamp(now)),
        shipped: matches!(status, TripStatus::Shipped | TripStatus::Delivered),
        delivered: status == TripStatus::Delivered,
        status,
        driver: text(payload.driver).unwrap_or_else(|| UNASSIGNED.to_string()),
        vehicle: text(payload.vehicle).unwrap_or_else(|| UNASSIGNED.to_string()),
        distance: payload.distance.unwrap_or(0.0),
        cost: payload.cost.unwrap_or(0.0),
        cost_breakdown: payload.cost_breakdown,
        source: TripSource::Webhook,
        external_id: text(payload.external_id),
        last_updated: text(payload.last_updated).unwrap_or_else(|| timestamp(now)),
        id: payload.id,
    }
}

fn from_manual(input: NewTrip, now: DateTime<Utc>) -> Trip {
    let id = text(input.id).unwrap_or_else(|| Uuid::new_v4().to_string());
    let cost = input
        .cost
        .or_else(|| input.cost_breakdown.map(|b| b.total()))
        .unwrap_or(0.0);
    Trip {
        trip_number: text(input.trip_number).unwrap_or_else(|| short_number("TR", &id)),
        customer: text(input.customer),
        origin: text(input.origin).unwrap_or_else(|| UNKNOWN.to_string()),
        destination: text(input.destination).unwrap_or_else(|| UNKNOWN.to_string()),
        start_date: text(input.start_date).unwrap_or_else(|| timestamp(now)),
        end_date: text(input.end_date).unwrap_or_else(|| timestamp(now)),
        status: input.status.unwrap_or(TripStatus::Active),
        shipped: false,
        delivered: false,
        driver: text(input.driver).unwrap_or_else(|| UNASSIGNED.to_string()),
        vehicle: text(input.vehicle).unwrap_or_else(|| UNASSIGNED.to_string()),
        distance: input.distance.unwrap_or(0.0),
        cost,
        cost_breakdown: input.cost_breakdown,
        source: TripSource::Internal,
        external_id: None,
        last_updated: timestamp(now),
        id,
    }
}

fn from_csv(row: CsvRow, now: DateTime<Utc>) -> Trip {
    let millis = now.timestamp_millis();
    let breakdown_columns = [
        "Fuel Cost",
        "Maintenance Cost",
        "Driver Cost",
        "Tolls",
        "Other Costs",
    ];
    let cost_breakdown = breakdown_columns
        .iter()
        .any(|c| row.get(c).is_some())
        .then(|| CostBreakdown {
            fuel: Some(row.number("Fuel Cost")),
            maintenance: Some(row.number("Maintenance Cost")),
            driver: Some(row.number("Driver Cost")),
            tolls: Some(row.number("Tolls")),
            other: Some(row.number("Other Costs")),
        });
    let field = |column: &str, default: &str| {
        row.get(column)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    };
    let now_text = timestamp(now);

    Trip {
        id: format!("imported-{}-{}", millis, row.row),
        trip_number: field("Trip Number", &format!("IMP-{}-{}", millis, row.row)),
        customer: row.get("Customer").map(str::to_string),
        origin: field("Origin", UNKNOWN),
        destination: field("Destination", UNKNOWN),
        start_date: field("Start Date", &now_text),
        end_date: field("End Date", &now_text),
        status: TripStatus::Active,
        shipped: false,
        delivered: false,
        driver: field("Driver", UNKNOWN),
        vehicle: field("Vehicle", UNKNOWN),
        distance: row.number("Distance"),
        cost: row.number("Cost"),
        cost_breakdown,
        source: TripSource::Internal,
        external_id: None,
        last_updated: now_text,
    }
}

/// Leading float of `value`, or 0 when there is none
fn parse_number(value: &str) -> f64 {
    let value = value.trim();
    let mut previous = None;
    let end = value
        .char_indices()
        .find(|&(i, c)| {
            let sign_allowed = i == 0 || matches!(previous, Some('e' | 'E'));
            previous = Some(c);
            !(c.is_ascii_digit()
                || matches!(c, '.' | 'e' | 'E')
                || (matches!(c, '-' | '+') && sign_allowed))
        })
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    let mut prefix = &value[..end];
    while !prefix.is_empty() {
        if let Ok(number) = prefix.parse::<f64>() {
            return number;
        }
        prefix = &prefix[..prefix.len() - 1];
    }
    0.0
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn short_number(prefix: &str, id: &str) -> String {
    let short: String = id.chars().take(8).collect();
    format!("{}-{}", prefix, short)
}

fn split_route(route: Option<&str>) -> (Option<String>, Option<String>) {
    match route.and_then(|r| r.split_once(" - ")) {
        Some((origin, destination)) => (
            text(Some(origin.trim().to_string())),
            text(Some(destination.trim().to_string())),
        ),
        None => (None, None),
    }
}
