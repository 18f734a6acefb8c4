//! Merging and filtering the trip streams

use super::import::{import_csv, ImportReport};
use super::normalize::{normalize, RawTrip};
use super::types::{
    CostBreakdown, DisplayStatus, NewTrip, Trip, TripDocument, TripSource, TripStatus, WebhookTrip,
};
use crate::error::Error;
use chrono::{DateTime, Utc};
use log::debug;

/// The independent trip arrays shown on the trips board
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripSources {
    pub realtime: Vec<Trip>,
    pub web_book: Vec<Trip>,
    pub manual: Vec<Trip>,
    pub webhook: Vec<Trip>,
    pub csv: Vec<Trip>,
}

impl TripSources {
    /// Concatenate the arrays in source order.
    ///
    /// No sorting and no de-duplication: a trip held by two sources shows
    /// up twice.
    pub fn aggregate(&self) -> Vec<Trip> {
        self.realtime
            .iter()
            .chain(&self.web_book)
            .chain(&self.manual)
            .chain(&self.webhook)
            .chain(&self.csv)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.realtime.len()
            + self.web_book.len()
            + self.manual.len()
            + self.webhook.len()
            + self.csv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn local_mut(&mut self) -> [&mut Vec<Trip>; 3] {
        [&mut self.manual, &mut self.webhook, &mut self.csv]
    }
}

/// User-selected trip filter.
///
/// Applied to aggregated trips and pushed down to the store as a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TripFilter {
    pub status: Option<TripStatus>,
    pub only_web_book: bool,
}

impl TripFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn web_book_only() -> Self {
        Self {
            status: None,
            only_web_book: true,
        }
    }

    pub fn with_status(mut self, status: impl Into<TripStatus>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        if self.only_web_book && trip.source != TripSource::WebBook {
            return false;
        }
        match &self.status {
            Some(status) => &trip.status == status,
            None => true,
        }
    }

    pub fn apply(&self, trips: Vec<Trip>) -> Vec<Trip> {
        trips.into_iter().filter(|t| self.matches(t)).collect()
    }
}

/// Counts shown above the trips table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TripSummary {
    pub total: usize,
    pub web_book: usize,
    pub in_transit: usize,
    pub delivered: usize,
}

impl TripSummary {
    pub fn from_trips(trips: &[Trip]) -> Self {
        trips.iter().fold(Self::default(), |mut summary, trip| {
            summary.total += 1;
            if trip.is_web_book() {
                summary.web_book += 1;
            }
            match trip.display_status() {
                DisplayStatus::Delivered => summary.delivered += 1,
                DisplayStatus::InTransit => summary.in_transit += 1,
                DisplayStatus::Status(_) => {}
            }
            summary
        })
    }
}

/// Page-level trip state.
///
/// The realtime and web-book arrays mirror remote feeds and are replaced
/// wholesale; manual, webhook and CSV trips are held locally and can be
/// edited or removed.
#[derive(Debug, Clone, Default)]
pub struct TripBoard {
    sources: TripSources,
}

impl TripBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &TripSources {
        &self.sources
    }

    pub fn set_realtime(&mut self, docs: &[TripDocument], now: DateTime<Utc>) {
        self.sources.realtime = docs
            .iter()
            .map(|doc| normalize(RawTrip::Internal(doc.clone()), now))
            .collect();
    }

    pub fn set_web_book(&mut self, docs: &[TripDocument], now: DateTime<Utc>) {
        self.sources.web_book = docs
            .iter()
            .map(|doc| normalize(RawTrip::WebBook(doc.clone()), now))
            .collect();
    }

    pub fn set_webhook(&mut self, payloads: Vec<WebhookTrip>, now: DateTime<Utc>) {
        self.sources.webhook = payloads
            .into_iter()
            .map(|payload| normalize(RawTrip::Webhook(payload), now))
            .collect();
    }

    /// Add a hand-entered trip and return it
    pub fn add_manual(&mut self, input: NewTrip, now: DateTime<Utc>) -> Trip {
        let trip = normalize(RawTrip::Manual(input), now);
        self.sources.manual.push(trip.clone());
        trip
    }

    /// Parse `text` and append the trips to the CSV array
    pub fn import_csv(&mut self, text: &str, now: DateTime<Utc>) -> Result<ImportReport, Error> {
        let report = import_csv(text, now)?;
        self.sources.csv.extend(report.trips.iter().cloned());
        Ok(report)
    }

    /// Edit the costs of a locally held trip.
    ///
    /// Realtime and web-book trips are owned by the store; use
    /// [`TripStore::update_costs`](crate::store::TripStore::update_costs)
    /// for those.
    pub fn update_costs(
        &mut self,
        id: &str,
        breakdown: CostBreakdown,
        now: DateTime<Utc>,
    ) -> Result<Trip, Error> {
        for trips in self.sources.local_mut() {
            if let Some(trip) = trips.iter_mut().find(|t| t.id == id) {
                trip.apply_cost_edit(breakdown, now);
                debug!("Updated costs of trip {} to {}", id, trip.cost);
                return Ok(trip.clone());
            }
        }
        Err(Error::general(format!("Trip {} is not held locally", id)))
    }

    /// Remove a locally held trip from every local array, returning how
    /// many entries were dropped
    pub fn remove(&mut self, id: &str) -> usize {
        let mut removed = 0;
        for trips in self.sources.local_mut() {
            let before = trips.len();
            trips.retain(|t| t.id != id);
            removed += before - trips.len();
        }
        removed
    }

    pub fn trips(&self, filter: &TripFilter) -> Vec<Trip> {
        filter.apply(self.sources.aggregate())
    }

    pub fn summary(&self) -> TripSummary {
        TripSummary::from_trips(&self.sources.aggregate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 20, 9, 30, 0).unwrap()
    }

    fn trip(id: &str, status: TripStatus, source: TripSource) -> Trip {
        let mut trip = normalize(
            RawTrip::Manual(NewTrip {
                id: Some(id.to_string()),
                status: Some(status),
                ..Default::default()
            }),
            now(),
        );
        trip.source = source;
        trip
    }

    fn ids(trips: &[Trip]) -> Vec<&str> {
        trips.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_aggregate_keeps_concatenation_order() {
        let sources = TripSources {
            realtime: vec![trip("1", TripStatus::Active, TripSource::Internal)],
            web_book: vec![trip("2", TripStatus::Active, TripSource::WebBook)],
            manual: vec![],
            webhook: vec![trip("3", TripStatus::Active, TripSource::Webhook)],
            csv: vec![trip("0", TripStatus::Active, TripSource::Internal)],
        };
        assert_eq!(ids(&sources.aggregate()), vec!["1", "2", "3", "0"]);
        assert_eq!(sources.len(), 4);
    }

    #[test]
    fn test_duplicate_ids_are_not_merged() {
        let sources = TripSources {
            web_book: vec![trip("dup", TripStatus::Active, TripSource::WebBook)],
            webhook: vec![trip("dup", TripStatus::Active, TripSource::Webhook)],
            ..Default::default()
        };
        assert_eq!(ids(&sources.aggregate()), vec!["dup", "dup"]);
    }

    #[test]
    fn test_web_book_filter() {
        let trips = vec![
            trip("1", TripStatus::Active, TripSource::Internal),
            trip("2", TripStatus::Delivered, TripSource::WebBook),
            trip("3", TripStatus::Active, TripSource::Webhook),
        ];
        let filtered = TripFilter::web_book_only().apply(trips);
        assert_eq!(ids(&filtered), vec!["2"]);
    }

    #[test]
    fn test_status_filter() {
        let trips = vec![
            trip("1", TripStatus::Active, TripSource::Internal),
            trip("2", TripStatus::Completed, TripSource::WebBook),
            trip("3", TripStatus::Active, TripSource::WebBook),
        ];
        let filter = TripFilter::new().with_status("active");
        assert_eq!(ids(&filter.apply(trips.clone())), vec!["1", "3"]);

        let filter = TripFilter::web_book_only().with_status(TripStatus::Active);
        assert_eq!(ids(&filter.apply(trips)), vec!["3"]);
    }

    #[test]
    fn test_board_update_costs_on_local_trip() {
        let mut board = TripBoard::new();
        board.set_webhook(
            vec![WebhookTrip {
                id: "wh-1".to_string(),
                cost: Some(10.0),
                ..Default::default()
            }],
            now(),
        );

        let updated = board
            .update_costs("wh-1", CostBreakdown::new(1.0, 2.0, 3.0, 4.0, 5.0), now())
            .unwrap();
        assert_eq!(updated.cost, 15.0);
        assert_eq!(board.sources().webhook[0].cost, 15.0);
    }

    #[test]
    fn test_board_update_costs_rejects_remote_trip() {
        let mut board = TripBoard::new();
        board.set_realtime(
            &[TripDocument {
                id: "remote".to_string(),
                ..Default::default()
            }],
            now(),
        );
        assert!(board
            .update_costs("remote", CostBreakdown::default(), now())
            .is_err());
    }

    #[test]
    fn test_board_remove_and_summary() {
        let mut board = TripBoard::new();
        board.set_web_book(
            &[TripDocument {
                id: "wb".to_string(),
                shipped_status: Some(true),
                ..Default::default()
            }],
            now(),
        );
        board.add_manual(
            NewTrip {
                id: Some("m1".to_string()),
                ..Default::default()
            },
            now(),
        );
        board
            .import_csv("Trip Number,Origin\nTR-1,Denver\n", now())
            .unwrap();

        let summary = board.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.web_book, 1);
        assert_eq!(summary.in_transit, 1);
        assert_eq!(summary.delivered, 0);

        assert_eq!(board.remove("m1"), 1);
        assert_eq!(board.remove("wb"), 0);
        assert_eq!(board.trips(&TripFilter::new()).len(), 2);
    }
}
