//! CSV trip import

use super::normalize::{normalize, CsvRow, RawTrip};
use super::types::Trip;
use crate::error::Error;
use chrono::{DateTime, Utc};
use log::{debug, info};

/// Column header used by trip spreadsheets
pub const CSV_COLUMNS: [&str; 14] = [
    "Trip Number",
    "Origin",
    "Destination",
    "Start Date",
    "End Date",
    "Driver",
    "Vehicle",
    "Distance",
    "Cost",
    "Fuel Cost",
    "Maintenance Cost",
    "Driver Cost",
    "Tolls",
    "Other Costs",
];

/// Result of a CSV import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub trips: Vec<Trip>,
    /// Rows dropped for having fewer fields than the header
    pub skipped: usize,
}

/// Parse `text` into trips.
///
/// The first row names the columns. Rows shorter than the header are
/// skipped, missing numbers become 0. Fails when no row yields a trip.
pub fn import_csv(text: &str, now: DateTime<Utc>) -> Result<ImportReport, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut trips = Vec::new();
    let mut skipped = 0;

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() < headers.len() {
            debug!(
                "Skipping CSV row {}: {} fields, expected {}",
                index + 1,
                record.len(),
                headers.len()
            );
            skipped += 1;
            continue;
        }

        let row = CsvRow {
            row: index + 1,
            fields: headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.to_string(), value.to_string()))
                .collect(),
        };
        trips.push(normalize(RawTrip::Csv(row), now));
    }

    if trips.is_empty() {
        return Err(Error::import("No valid trips found in the file."));
    }

    info!("Imported {} trips from CSV ({} skipped)", trips.len(), skipped);
    Ok(ImportReport { trips, skipped })
}
