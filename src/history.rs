use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::availability::departure_on;
use crate::clock::Clock;
use crate::entities::{BookingHistoryEntry, BookingStatus, Ride};
use crate::error::Error;
use crate::store::Store;

pub const HISTORY_KEY: &str = "booking_history";

/// Owns booking records independent of the ride lifecycle. Entries are
/// snapshots; a ride leaving the available view never invalidates history.
pub struct BookingLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    entries: Mutex<Vec<BookingHistoryEntry>>,
    feed: watch::Sender<Vec<BookingHistoryEntry>>,
}

impl BookingLedger {
    #[tracing::instrument(name = "BookingLedger::new", skip_all)]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let entries: Vec<BookingHistoryEntry> = match store.get(HISTORY_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        tracing::info!("loaded {} booking history entries...", entries.len());

        let (feed, _) = watch::channel(entries.clone());

        Ok(Self {
            store,
            clock,
            entries: Mutex::new(entries),
            feed,
        })
    }

    /// Status is classified once, against the clock at booking time, and is
    /// never re-evaluated afterwards.
    #[tracing::instrument(skip(self, ride))]
    pub fn add_to_history(&self, ride: Ride, employee_id: &str) -> Result<(), Error> {
        let now = self.clock.now();
        let status = ride_status(&ride, now);

        let mut entries = self.entries.lock().unwrap();

        let mut next = entries.clone();
        next.push(BookingHistoryEntry::new(
            ride,
            employee_id.to_string(),
            now,
            status,
        ));

        self.store.set(HISTORY_KEY, &serde_json::to_string(&next)?)?;

        *entries = next;
        self.feed.send_replace(entries.clone());

        tracing::info!("booking recorded as {}...", status.name());

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn cancel_booking(&self, ride_id: Uuid, employee_id: &str) -> Result<bool, Error> {
        let mut entries = self.entries.lock().unwrap();

        let mut next = entries.clone();

        let index = next
            .iter()
            .position(|entry| entry.matches(ride_id, employee_id) && entry.is_upcoming());

        let index = match index {
            Some(index) => index,
            None => {
                tracing::warn!("no upcoming booking matches, nothing to cancel...");
                return Ok(false);
            }
        };

        next[index].cancel();

        self.store.set(HISTORY_KEY, &serde_json::to_string(&next)?)?;

        *entries = next;
        self.feed.send_replace(entries.clone());

        tracing::info!("booking history entry cancelled...");

        Ok(true)
    }

    pub fn history(&self) -> watch::Receiver<Vec<BookingHistoryEntry>> {
        self.feed.subscribe()
    }

    pub fn history_by_employee(&self, employee_id: &str) -> Vec<BookingHistoryEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.employee_id == employee_id)
            .cloned()
            .collect()
    }
}

pub fn ride_status(ride: &Ride, now: DateTime<Utc>) -> BookingStatus {
    match departure_on(now, ride.departure_time) < now {
        true => BookingStatus::Completed,
        false => BookingStatus::Upcoming,
    }
}

pub fn filter_by_status(
    entries: &[BookingHistoryEntry],
    status: Option<BookingStatus>,
) -> Vec<BookingHistoryEntry> {
    entries
        .iter()
        .filter(|entry| status.map_or(true, |wanted| entry.status == wanted))
        .cloned()
        .collect()
}

/// Case-insensitive substring match on the booker or the ride's provider.
pub fn search_by_employee(entries: &[BookingHistoryEntry], query: &str) -> Vec<BookingHistoryEntry> {
    let needle = query.trim().to_lowercase();

    if needle.is_empty() {
        return entries.to_vec();
    }

    entries
        .iter()
        .filter(|entry| {
            entry.employee_id.to_lowercase().contains(&needle)
                || entry
                    .ride_snapshot
                    .provider_id
                    .to_lowercase()
                    .contains(&needle)
        })
        .cloned()
        .collect()
}

pub fn recent_first(entries: &mut [BookingHistoryEntry]) {
    entries.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
}

#[cfg(test)]
fn test_ride(departure_time: chrono::NaiveTime) -> Ride {
    use crate::entities::{RideDraft, VehicleType};

    Ride::new(
        RideDraft {
            provider_id: "E1".into(),
            vehicle_type: VehicleType::Car,
            vehicle_number: "KA-01".into(),
            vacant_seats: 3,
            departure_time,
            pick_up_point: "Gate 1".into(),
            destination: "Tech Park".into(),
        },
        Utc::now(),
    )
}

#[cfg(test)]
fn test_ledger() -> (BookingLedger, Arc<crate::store::MemoryStore>) {
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap(),
    ));
    let ledger = BookingLedger::new(store.clone(), clock).unwrap();

    (ledger, store)
}

#[test]
fn test_status_classified_at_booking_time() {
    use chrono::NaiveTime;

    let (ledger, _) = test_ledger();

    let evening = test_ride(NaiveTime::from_hms_opt(23, 0, 0).unwrap());
    ledger.add_to_history(evening, "E2").unwrap();

    let mut morning = test_ride(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    morning.vehicle_number = "KA-02".into();
    ledger.add_to_history(morning, "E2").unwrap();

    let entries = ledger.history().borrow().clone();
    assert_eq!(entries[0].status, BookingStatus::Upcoming);
    assert_eq!(entries[1].status, BookingStatus::Completed);
}

#[test]
fn test_cancel_requires_upcoming_entry() {
    use chrono::NaiveTime;

    let (ledger, _) = test_ledger();

    let completed = test_ride(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    let completed_id = completed.id;
    ledger.add_to_history(completed, "E2").unwrap();

    assert!(!ledger.cancel_booking(completed_id, "E2").unwrap());
    let entries = ledger.history().borrow().clone();
    assert_eq!(entries[0].status, BookingStatus::Completed);

    let upcoming = test_ride(NaiveTime::from_hms_opt(23, 0, 0).unwrap());
    let upcoming_id = upcoming.id;
    ledger.add_to_history(upcoming, "E3").unwrap();

    assert!(!ledger.cancel_booking(upcoming_id, "E9").unwrap());
    assert!(ledger.cancel_booking(upcoming_id, "E3").unwrap());
    assert!(!ledger.cancel_booking(upcoming_id, "E3").unwrap());

    let entries = ledger.history().borrow().clone();
    assert_eq!(entries[1].status, BookingStatus::Cancelled);
}

#[test]
fn test_snapshot_outlives_the_booking() {
    use chrono::NaiveTime;

    let (ledger, _) = test_ledger();

    let ride = test_ride(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    ledger.add_to_history(ride.clone(), "E2").unwrap();

    let entries = ledger.history_by_employee("E2");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ride_id, ride.id);
    assert_eq!(entries[0].ride_snapshot.vacant_seats, 3);
    assert_eq!(entries[0].ride_snapshot.destination, "Tech Park");
}

#[test]
fn test_history_by_employee_filters_bookers() {
    use chrono::NaiveTime;

    let (ledger, _) = test_ledger();

    let ride = test_ride(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    ledger.add_to_history(ride.clone(), "E2").unwrap();
    ledger.add_to_history(ride, "E3").unwrap();

    assert_eq!(ledger.history_by_employee("E2").len(), 1);
    assert_eq!(ledger.history_by_employee("E3").len(), 1);
    assert_eq!(ledger.history_by_employee("E1").len(), 0);
}

#[test]
fn test_persists_and_reloads() {
    use crate::clock::FixedClock;
    use chrono::{NaiveTime, TimeZone};

    let (ledger, store) = test_ledger();

    let ride = test_ride(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    ledger.add_to_history(ride, "E2").unwrap();

    let raw = store.get(HISTORY_KEY).unwrap().unwrap();
    assert!(raw.contains("\"rideSnapshot\""));
    assert!(raw.contains("\"upcoming\""));

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap(),
    ));
    let reloaded = BookingLedger::new(store, clock).unwrap();
    let entries = reloaded.history().borrow().clone();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].employee_id, "E2");
    assert_eq!(entries[0].status, BookingStatus::Upcoming);
}

#[test]
fn test_presentation_filters() {
    use chrono::NaiveTime;

    let (ledger, _) = test_ledger();

    let upcoming = test_ride(NaiveTime::from_hms_opt(23, 0, 0).unwrap());
    ledger.add_to_history(upcoming, "emp-42").unwrap();

    let completed = test_ride(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    ledger.add_to_history(completed, "emp-7").unwrap();

    let entries = ledger.history().borrow().clone();

    assert_eq!(filter_by_status(&entries, None).len(), 2);
    assert_eq!(
        filter_by_status(&entries, Some(BookingStatus::Completed)).len(),
        1
    );
    assert_eq!(
        filter_by_status(&entries, Some(BookingStatus::Cancelled)).len(),
        0
    );

    // Matches the booker id or the provider id, case-insensitively.
    assert_eq!(search_by_employee(&entries, "EMP-42").len(), 1);
    assert_eq!(search_by_employee(&entries, "e1").len(), 2);
    assert_eq!(search_by_employee(&entries, "  ").len(), 2);
    assert_eq!(search_by_employee(&entries, "nobody").len(), 0);
}

#[test]
fn test_recent_first_orders_by_booked_at() {
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{NaiveTime, TimeZone};

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap(),
    ));
    let ledger = BookingLedger::new(store, clock.clone()).unwrap();

    let first = test_ride(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    ledger.add_to_history(first, "E2").unwrap();

    clock.set(Utc.with_ymd_and_hms(2024, 5, 6, 10, 5, 0).unwrap());
    let second = test_ride(NaiveTime::from_hms_opt(10, 45, 0).unwrap());
    ledger.add_to_history(second, "E3").unwrap();

    let mut entries = ledger.history().borrow().clone();
    recent_first(&mut entries);

    assert_eq!(entries[0].employee_id, "E3");
    assert_eq!(entries[1].employee_id, "E2");
}
