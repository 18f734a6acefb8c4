//! Trip model, normalization, CSV import and aggregation

pub mod aggregate;
pub mod import;
pub mod normalize;
pub mod types;

pub use aggregate::{TripBoard, TripFilter, TripSources, TripSummary};
pub use import::{import_csv, ImportReport, CSV_COLUMNS};
pub use normalize::{normalize, CsvRow, RawTrip};
pub use types::{
    timestamp, CostBreakdown, DisplayStatus, NewTrip, Trip, TripDocument, TripSource, TripStatus,
    WebhookTrip,
};
