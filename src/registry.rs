use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use uuid::Uuid;

use crate::availability::is_available;
use crate::clock::Clock;
use crate::entities::{Ride, RideDraft, RideFilter};
use crate::error::Error;
use crate::history::BookingLedger;
use crate::store::Store;

pub const RIDES_KEY: &str = "transport_rides";

/// Owns the ride list and its invariants. Every mutation is
/// copy-validate-persist-commit: the candidate list is written to the store
/// first, and only a successful write is installed and published, so a store
/// failure never leaves memory ahead of disk.
pub struct RideRegistry {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ledger: Arc<BookingLedger>,
    buffer_minutes: i64,
    rides: Mutex<Vec<Ride>>,
    feed: watch::Sender<Vec<Ride>>,
}

impl RideRegistry {
    #[tracing::instrument(name = "RideRegistry::new", skip_all)]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        ledger: Arc<BookingLedger>,
        buffer_minutes: i64,
    ) -> Result<Self, Error> {
        let rides: Vec<Ride> = match store.get(RIDES_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        tracing::info!("loaded {} rides...", rides.len());

        let (feed, _) = watch::channel(rides.clone());

        Ok(Self {
            store,
            clock,
            ledger,
            buffer_minutes,
            rides: Mutex::new(rides),
            feed,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn add_ride(&self, draft: RideDraft) -> Result<bool, Error> {
        let mut rides = self.rides.lock().unwrap();

        if rides.iter().any(|ride| ride.conflicts_with(&draft)) {
            tracing::warn!("provider or vehicle already has an active ride, rejecting...");
            return Ok(false);
        }

        let mut next = rides.clone();
        next.push(Ride::new(draft, self.clock.now()));

        self.store.set(RIDES_KEY, &serde_json::to_string(&next)?)?;

        *rides = next;
        self.feed.send_replace(rides.clone());

        tracing::info!("ride added...");

        Ok(true)
    }

    /// On success the ledger receives the ride as the booker observed it,
    /// seats not yet decremented by this booking.
    #[tracing::instrument(skip(self))]
    pub fn book_ride(&self, ride_id: Uuid, employee_id: &str) -> Result<bool, Error> {
        let mut rides = self.rides.lock().unwrap();

        let mut next = rides.clone();

        let ride = match next.iter_mut().find(|ride| ride.id == ride_id) {
            Some(ride) => ride,
            None => {
                tracing::warn!("ride not found, rejecting booking...");
                return Ok(false);
            }
        };

        let snapshot = ride.clone();

        if !ride.book(employee_id) {
            tracing::warn!("ride is full, self-booked or already booked, rejecting...");
            return Ok(false);
        }

        self.ledger.add_to_history(snapshot, employee_id)?;

        self.store.set(RIDES_KEY, &serde_json::to_string(&next)?)?;

        *rides = next;
        self.feed.send_replace(rides.clone());

        tracing::info!("seat booked...");

        Ok(true)
    }

    /// Frees the seat only; reconciling the history ledger is the
    /// orchestration layer's job.
    #[tracing::instrument(skip(self))]
    pub fn cancel_booking(&self, ride_id: Uuid, employee_id: &str) -> Result<bool, Error> {
        let mut rides = self.rides.lock().unwrap();

        let mut next = rides.clone();

        let ride = match next.iter_mut().find(|ride| ride.id == ride_id) {
            Some(ride) => ride,
            None => {
                tracing::warn!("ride not found, nothing to cancel...");
                return Ok(false);
            }
        };

        if !ride.release_seat(employee_id) {
            tracing::warn!("employee holds no seat on this ride, nothing to cancel...");
            return Ok(false);
        }

        self.store.set(RIDES_KEY, &serde_json::to_string(&next)?)?;

        *rides = next;
        self.feed.send_replace(rides.clone());

        tracing::info!("booking cancelled, seat released...");

        Ok(true)
    }

    pub fn rides(&self) -> watch::Receiver<Vec<Ride>> {
        self.feed.subscribe()
    }

    pub fn available_rides(&self, filter: Option<RideFilter>) -> AvailableRides {
        AvailableRides {
            feed: self.feed.subscribe(),
            clock: self.clock.clone(),
            filter,
            buffer_minutes: self.buffer_minutes,
        }
    }
}

/// A live view over the ride feed: the availability predicate is re-applied
/// to the latest snapshot at every read.
#[derive(Clone)]
pub struct AvailableRides {
    feed: watch::Receiver<Vec<Ride>>,
    clock: Arc<dyn Clock>,
    filter: Option<RideFilter>,
    buffer_minutes: i64,
}

impl AvailableRides {
    pub fn current(&self) -> Vec<Ride> {
        let now = self.clock.now();

        self.feed
            .borrow()
            .iter()
            .filter(|ride| is_available(ride, now, self.filter.as_ref(), self.buffer_minutes))
            .cloned()
            .collect()
    }

    /// Waits for the next snapshot; false when the registry is gone.
    pub async fn changed(&mut self) -> bool {
        self.feed.changed().await.is_ok()
    }
}

#[cfg(test)]
fn test_draft(provider_id: &str, vehicle_number: &str, vacant_seats: u32) -> RideDraft {
    use crate::entities::VehicleType;

    RideDraft {
        provider_id: provider_id.into(),
        vehicle_type: VehicleType::Car,
        vehicle_number: vehicle_number.into(),
        vacant_seats,
        departure_time: chrono::NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        pick_up_point: "Gate 1".into(),
        destination: "Tech Park".into(),
    }
}

#[cfg(test)]
fn test_registry() -> (RideRegistry, Arc<BookingLedger>, Arc<crate::store::MemoryStore>) {
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap(),
    ));
    let ledger = Arc::new(BookingLedger::new(store.clone(), clock.clone()).unwrap());
    let registry = RideRegistry::new(store.clone(), clock, ledger.clone(), 60).unwrap();

    (registry, ledger, store)
}

#[test]
fn test_add_ride_mints_fresh_rides() {
    use chrono::{TimeZone, Utc};

    let (registry, _, _) = test_registry();

    assert!(registry.add_ride(test_draft("E1", "KA-01", 3)).unwrap());
    assert!(registry.add_ride(test_draft("E2", "KA-02", 1)).unwrap());

    let rides = registry.rides().borrow().clone();
    assert_eq!(rides.len(), 2);
    assert_ne!(rides[0].id, rides[1].id);
    assert_eq!(rides[0].vacant_seats, 3);
    assert!(rides[0].booked_by.is_empty());
    assert_eq!(
        rides[0].created_at,
        Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap()
    );
}

#[test]
fn test_add_ride_rejects_duplicate_provider_or_vehicle() {
    let (registry, _, _) = test_registry();

    assert!(registry.add_ride(test_draft("E1", "KA-01", 3)).unwrap());

    assert!(!registry.add_ride(test_draft("E1", "KA-09", 2)).unwrap());
    assert!(!registry.add_ride(test_draft("E9", "KA-01", 2)).unwrap());

    assert_eq!(registry.rides().borrow().len(), 1);
}

#[test]
fn test_booking_scenario_conserves_seats() {
    let (registry, _, _) = test_registry();

    registry.add_ride(test_draft("E0", "KA-01", 3)).unwrap();
    let ride_id = registry.rides().borrow()[0].id;

    assert!(registry.book_ride(ride_id, "E1").unwrap());
    assert_eq!(registry.rides().borrow()[0].vacant_seats, 2);

    assert!(!registry.book_ride(ride_id, "E1").unwrap());
    assert_eq!(registry.rides().borrow()[0].vacant_seats, 2);

    assert!(registry.book_ride(ride_id, "E2").unwrap());
    assert!(registry.book_ride(ride_id, "E3").unwrap());
    assert!(!registry.book_ride(ride_id, "E4").unwrap());

    let rides = registry.rides().borrow().clone();
    assert_eq!(rides[0].vacant_seats, 0);
    assert_eq!(rides[0].booked_by, vec!["E1", "E2", "E3"]);
    assert_eq!(
        rides[0].vacant_seats + rides[0].booked_by.len() as u32,
        3,
        "seats are conserved"
    );
}

#[test]
fn test_book_ride_refusals() {
    let (registry, _, _) = test_registry();

    registry.add_ride(test_draft("E1", "KA-01", 2)).unwrap();
    let ride_id = registry.rides().borrow()[0].id;

    assert!(!registry.book_ride(Uuid::new_v4(), "E2").unwrap());
    assert!(!registry.book_ride(ride_id, "E1").unwrap(), "self-booking");

    let rides = registry.rides().borrow().clone();
    assert_eq!(rides[0].vacant_seats, 2);
    assert!(rides[0].booked_by.is_empty());
}

#[test]
fn test_cancel_booking_releases_the_seat() {
    let (registry, _, _) = test_registry();

    registry.add_ride(test_draft("E1", "KA-01", 2)).unwrap();
    let ride_id = registry.rides().borrow()[0].id;

    registry.book_ride(ride_id, "E2").unwrap();
    assert!(registry.cancel_booking(ride_id, "E2").unwrap());

    let rides = registry.rides().borrow().clone();
    assert_eq!(rides[0].vacant_seats, 2);
    assert!(rides[0].booked_by.is_empty());

    assert!(!registry.cancel_booking(ride_id, "E2").unwrap());
    assert!(!registry.cancel_booking(Uuid::new_v4(), "E2").unwrap());
}

#[test]
fn test_booking_snapshots_seats_as_the_booker_saw_them() {
    let (registry, ledger, _) = test_registry();

    registry.add_ride(test_draft("E1", "KA-01", 3)).unwrap();
    let ride_id = registry.rides().borrow()[0].id;

    registry.book_ride(ride_id, "E2").unwrap();

    let entries = ledger.history_by_employee("E2");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ride_snapshot.vacant_seats, 3);
    assert!(entries[0].ride_snapshot.booked_by.is_empty());

    assert_eq!(registry.rides().borrow()[0].vacant_seats, 2);
}

#[test]
fn test_persists_and_reloads() {
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    let (registry, _, store) = test_registry();

    registry.add_ride(test_draft("E1", "KA-01", 3)).unwrap();
    let ride_id = registry.rides().borrow()[0].id;
    registry.book_ride(ride_id, "E2").unwrap();

    let raw = store.get(RIDES_KEY).unwrap().unwrap();
    assert!(raw.contains("\"providerId\":\"E1\""));
    assert!(raw.contains("\"vehicleNumber\":\"KA-01\""));

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 11, 0, 0).unwrap(),
    ));
    let ledger = Arc::new(BookingLedger::new(store.clone(), clock.clone()).unwrap());
    let reloaded = RideRegistry::new(store, clock, ledger, 60).unwrap();

    let rides = reloaded.rides().borrow().clone();
    assert_eq!(rides.len(), 1);
    assert_eq!(rides[0].id, ride_id);
    assert_eq!(rides[0].vacant_seats, 2);
    assert_eq!(rides[0].booked_by, vec!["E2"]);
}

#[test]
fn test_failed_store_write_leaves_state_unchanged() {
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::clock::FixedClock;
    use crate::error::storage_error;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl Store for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), Error> {
            if self.down.load(Ordering::SeqCst) {
                return Err(storage_error("store offline"));
            }
            self.inner.set(key, value)
        }
    }

    let store = Arc::new(FlakyStore::default());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap(),
    ));
    let ledger = Arc::new(BookingLedger::new(store.clone(), clock.clone()).unwrap());
    let registry = RideRegistry::new(store.clone(), clock, ledger.clone(), 60).unwrap();

    registry.add_ride(test_draft("E1", "KA-01", 3)).unwrap();
    let ride_id = registry.rides().borrow()[0].id;

    store.down.store(true, Ordering::SeqCst);

    assert!(registry.add_ride(test_draft("E2", "KA-02", 1)).is_err());
    assert_eq!(registry.rides().borrow().len(), 1);

    assert!(registry.book_ride(ride_id, "E2").is_err());
    let rides = registry.rides().borrow().clone();
    assert_eq!(rides[0].vacant_seats, 3);
    assert!(rides[0].booked_by.is_empty());
    assert!(ledger.history_by_employee("E2").is_empty());

    store.down.store(false, Ordering::SeqCst);
    assert!(registry.book_ride(ride_id, "E2").unwrap());
}

#[test]
fn test_subscribers_replay_latest_and_see_updates() {
    use tokio_test::block_on;

    let (registry, _, _) = test_registry();

    let mut feed = registry.rides();
    assert!(feed.borrow().is_empty());

    registry.add_ride(test_draft("E1", "KA-01", 3)).unwrap();

    block_on(feed.changed()).unwrap();
    assert_eq!(feed.borrow().len(), 1);

    // A late subscriber immediately sees the latest snapshot.
    let late = registry.rides();
    assert_eq!(late.borrow().len(), 1);
}

#[test]
fn test_available_rides_view_tracks_clock_and_filter() {
    use crate::clock::FixedClock;
    use crate::entities::VehicleType;
    use crate::store::MemoryStore;
    use chrono::{NaiveTime, TimeZone, Utc};

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap(),
    ));
    let ledger = Arc::new(BookingLedger::new(store.clone(), clock.clone()).unwrap());
    let registry = RideRegistry::new(store, clock.clone(), ledger, 60).unwrap();

    let mut near = test_draft("E1", "KA-01", 2);
    near.departure_time = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
    registry.add_ride(near).unwrap();

    let mut far = test_draft("E2", "KA-02", 2);
    far.departure_time = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
    registry.add_ride(far).unwrap();

    let mut bike = test_draft("E3", "KA-03", 2);
    bike.vehicle_type = VehicleType::Bike;
    bike.departure_time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    registry.add_ride(bike).unwrap();

    let view = registry.available_rides(None);
    assert_eq!(view.current().len(), 2);

    let bikes_only = registry.available_rides(Some(RideFilter {
        vehicle_type: Some(VehicleType::Bike),
    }));
    assert_eq!(bikes_only.current().len(), 1);
    assert_eq!(bikes_only.current()[0].provider_id, "E3");

    // The evening ride enters the window once the clock reaches it.
    clock.set(Utc.with_ymd_and_hms(2024, 5, 6, 21, 30, 0).unwrap());
    let evening = view.current();
    assert_eq!(evening.len(), 1);
    assert_eq!(evening[0].provider_id, "E2");
}

#[test]
fn test_fully_booked_rides_drop_out_of_the_available_view() {
    let (registry, _, _) = test_registry();

    registry.add_ride(test_draft("E1", "KA-01", 1)).unwrap();
    let ride_id = registry.rides().borrow()[0].id;

    let view = registry.available_rides(None);
    assert_eq!(view.current().len(), 1);

    registry.book_ride(ride_id, "E2").unwrap();
    assert!(view.current().is_empty());

    registry.cancel_booking(ride_id, "E2").unwrap();
    assert_eq!(view.current().len(), 1);
}
