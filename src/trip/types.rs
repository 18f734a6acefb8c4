//! Trip records and the raw shapes they are built from

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trip status.
///
/// Internal trips use `active`/`completed`/`scheduled`; web-book documents
/// also carry `shipped`/`delivered`. Anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TripStatus {
    Active,
    Completed,
    Scheduled,
    Shipped,
    Delivered,
    Other(String),
}

impl TripStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
            TripStatus::Scheduled => "scheduled",
            TripStatus::Shipped => "shipped",
            TripStatus::Delivered => "delivered",
            TripStatus::Other(s) => s,
        }
    }
}

impl From<&str> for TripStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => TripStatus::Active,
            "completed" => TripStatus::Completed,
            "scheduled" => TripStatus::Scheduled,
            "shipped" => TripStatus::Shipped,
            "delivered" => TripStatus::Delivered,
            _ => TripStatus::Other(value.to_string()),
        }
    }
}

impl From<String> for TripStatus {
    fn from(value: String) -> Self {
        TripStatus::from(value.as_str())
    }
}

impl From<TripStatus> for String {
    fn from(value: TripStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a trip came from. Drives display badges and the web-book filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripSource {
    #[default]
    Internal,
    Webhook,
    Api,
    WebBook,
}

impl TripSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripSource::Internal => "internal",
            TripSource::Webhook => "webhook",
            TripSource::Api => "api",
            TripSource::WebBook => "web_book",
        }
    }

    /// Map a document's `importSource` value
    pub fn from_import_source(value: Option<&str>) -> Self {
        match value {
            Some("web_book") => TripSource::WebBook,
            Some("webhook") => TripSource::Webhook,
            Some("api") => TripSource::Api,
            _ => TripSource::Internal,
        }
    }
}

/// Per-category trip costs. Nothing ties the sum to a trip's `cost`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolls: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<f64>,
}

impl CostBreakdown {
    pub fn new(fuel: f64, maintenance: f64, driver: f64, tolls: f64, other: f64) -> Self {
        Self {
            fuel: Some(fuel),
            maintenance: Some(maintenance),
            driver: Some(driver),
            tolls: Some(tolls),
            other: Some(other),
        }
    }

    /// Sum of the components that are present
    pub fn total(&self) -> f64 {
        [self.fuel, self.maintenance, self.driver, self.tolls, self.other]
            .iter()
            .flatten()
            .sum()
    }
}

/// Badge shown for a trip once both status vocabularies are reconciled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayStatus {
    Delivered,
    InTransit,
    Status(TripStatus),
}

impl DisplayStatus {
    pub fn label(&self) -> &str {
        match self {
            DisplayStatus::Delivered => "Delivered",
            DisplayStatus::InTransit => "In Transit",
            DisplayStatus::Status(status) => status.as_str(),
        }
    }
}

/// A trip in the unified display shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub trip_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    pub origin: String,
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub status: TripStatus,
    #[serde(default)]
    pub shipped: bool,
    #[serde(default)]
    pub delivered: bool,
    pub driver: String,
    pub vehicle: String,
    pub distance: f64,
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_breakdown: Option<CostBreakdown>,
    pub source: TripSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub last_updated: String,
}

impl Trip {
    pub fn is_web_book(&self) -> bool {
        self.source == TripSource::WebBook
    }

    /// Replace the breakdown and recompute `cost` from it
    pub fn apply_cost_edit(&mut self, breakdown: CostBreakdown, now: DateTime<Utc>) {
        self.cost = breakdown.total();
        self.cost_breakdown = Some(breakdown);
        self.last_updated = timestamp(now);
    }

    /// Starting value for a cost edit: the breakdown total, or `cost`
    /// when the breakdown is missing or sums to zero
    pub fn editable_cost(&self) -> f64 {
        let total = self.cost_breakdown.map(|b| b.total()).unwrap_or(0.0);
        if total != 0.0 {
            total
        } else {
            self.cost
        }
    }

    pub fn display_status(&self) -> DisplayStatus {
        if self.delivered || self.status == TripStatus::Delivered {
            DisplayStatus::Delivered
        } else if self.shipped || self.status == TripStatus::Shipped {
            DisplayStatus::InTransit
        } else {
            DisplayStatus::Status(self.status.clone())
        }
    }
}

/// A trip document as stored in the trips collection.
///
/// Older documents use `driverName`, `fleetNumber`, `distanceKm`,
/// `clientName`, `startDate`/`endDate` and a combined `route`; those are
/// accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripDocument {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_ref: Option<String>,
    #[serde(alias = "clientName", skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// `"<origin> - <destination>"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(alias = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(alias = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TripStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_status: Option<bool>,
    #[serde(alias = "driverName", skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(alias = "fleetNumber", skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(alias = "distanceKm", skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_breakdown: Option<CostBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Trip payload delivered by the inbound webhook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookTrip {
    pub id: String,
    pub trip_number: Option<String>,
    pub customer: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<TripStatus>,
    pub driver: Option<String>,
    pub vehicle: Option<String>,
    pub distance: Option<f64>,
    pub cost: Option<f64>,
    pub cost_breakdown: Option<CostBreakdown>,
    pub external_id: Option<String>,
    pub last_updated: Option<String>,
}

/// Trip entered by hand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTrip {
    /// Generated when absent
    pub id: Option<String>,
    pub trip_number: Option<String>,
    pub customer: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<TripStatus>,
    pub driver: Option<String>,
    pub vehicle: Option<String>,
    pub distance: Option<f64>,
    /// Defaults to the breakdown total
    pub cost: Option<f64>,
    pub cost_breakdown: Option<CostBreakdown>,
}

/// RFC 3339 timestamp used for defaulted dates and `lastUpdated`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn trip() -> Trip {
        Trip {
            id: "1".to_string(),
            trip_number: "TR-2023-001".to_string(),
            customer: None,
            origin: "Chicago, IL".to_string(),
            destination: "Indianapolis, IN".to_string(),
            start_date: "2025-07-15T08:00:00".to_string(),
            end_date: "2025-07-17T16:00:00".to_string(),
            status: TripStatus::Active,
            shipped: false,
            delivered: false,
            driver: "John Smith".to_string(),
            vehicle: "Truck 123".to_string(),
            distance: 295.0,
            cost: 1250.75,
            cost_breakdown: None,
            source: TripSource::Internal,
            external_id: None,
            last_updated: "2025-07-15T08:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_status_round_trip_keeps_unknown_values() {
        let status: TripStatus = serde_json::from_value(json!("Delivered")).unwrap();
        assert_eq!(status, TripStatus::Delivered);

        let status: TripStatus = serde_json::from_value(json!("pending")).unwrap();
        assert_eq!(status, TripStatus::Other("pending".to_string()));
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("pending"));
    }

    #[test]
    fn test_source_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(TripSource::WebBook).unwrap(),
            json!("web_book")
        );
        assert_eq!(
            TripSource::from_import_source(Some("manual")),
            TripSource::Internal
        );
    }

    #[test]
    fn test_breakdown_total_skips_missing() {
        let breakdown = CostBreakdown {
            fuel: Some(650.25),
            tolls: Some(75.0),
            ..Default::default()
        };
        assert_eq!(breakdown.total(), 725.25);
        assert_eq!(CostBreakdown::default().total(), 0.0);
    }

    #[test]
    fn test_apply_cost_edit_recomputes_cost() {
        let mut trip = trip();
        let now = Utc.with_ymd_and_hms(2025, 7, 16, 12, 0, 0).unwrap();
        trip.apply_cost_edit(CostBreakdown::new(600.0, 200.0, 300.0, 75.0, 25.0), now);
        assert_eq!(trip.cost, 1200.0);
        assert_eq!(trip.last_updated, "2025-07-16T12:00:00.000Z");
    }

    #[test]
    fn test_editable_cost_falls_back_to_cost() {
        let mut trip = trip();
        assert_eq!(trip.editable_cost(), 1250.75);

        trip.cost_breakdown = Some(CostBreakdown::default());
        assert_eq!(trip.editable_cost(), 1250.75);

        trip.cost_breakdown = Some(CostBreakdown::new(1.0, 2.0, 3.0, 4.0, 5.0));
        assert_eq!(trip.editable_cost(), 15.0);
    }

    #[test]
    fn test_display_status_reconciles_flags() {
        let mut trip = trip();
        assert_eq!(trip.display_status(), DisplayStatus::Status(TripStatus::Active));

        trip.shipped = true;
        assert_eq!(trip.display_status().label(), "In Transit");

        trip.delivered = true;
        assert_eq!(trip.display_status(), DisplayStatus::Delivered);

        let mut trip = self::trip();
        trip.status = TripStatus::Delivered;
        assert_eq!(trip.display_status(), DisplayStatus::Delivered);
    }

    #[test]
    fn test_document_accepts_legacy_names() {
        let doc: TripDocument = serde_json::from_value(json!({
            "id": "abc",
            "clientName": "Acme",
            "driverName": "Jane",
            "fleetNumber": "21H",
            "distanceKm": 420,
            "route": "Harare - Beitbridge",
            "importSource": "web_book",
            "shippedStatus": true
        }))
        .unwrap();
        assert_eq!(doc.customer.as_deref(), Some("Acme"));
        assert_eq!(doc.driver.as_deref(), Some("Jane"));
        assert_eq!(doc.vehicle.as_deref(), Some("21H"));
        assert_eq!(doc.distance, Some(420.0));
        assert_eq!(doc.shipped_status, Some(true));
        assert!(doc.status.is_none());
    }
}
