use tokio::sync::watch;

use super::Engine;
use crate::{api::HistoryAPI, entities::BookingHistoryEntry};

impl HistoryAPI for Engine {
    fn history(&self) -> watch::Receiver<Vec<BookingHistoryEntry>> {
        self.ledger.history()
    }

    fn history_by_employee(&self, employee_id: &str) -> Vec<BookingHistoryEntry> {
        self.ledger.history_by_employee(employee_id)
    }
}

#[test]
fn test_history_tracks_bookings() {
    use super::testkit;
    use crate::api::RideAPI;
    use crate::entities::{BookingStatus, RideDraft, VehicleType};
    use tokio_test::block_on;

    let (engine, _, _) = testkit::engine();

    let mut feed = engine.history();
    assert!(feed.borrow().is_empty());

    engine
        .add_ride(RideDraft {
            provider_id: "E1".into(),
            vehicle_type: VehicleType::Bike,
            vehicle_number: "KA-07".into(),
            vacant_seats: 1,
            departure_time: chrono::NaiveTime::from_hms_opt(10, 45, 0).unwrap(),
            pick_up_point: "Gate 2".into(),
            destination: "Main Office".into(),
        })
        .unwrap();

    let ride_id = engine.rides().borrow()[0].id;
    engine.book_ride(ride_id, "E2").unwrap();

    block_on(feed.changed()).unwrap();
    let entries = feed.borrow().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, BookingStatus::Upcoming);
    assert_eq!(entries[0].ride_snapshot.vehicle_number, "KA-07");

    assert_eq!(engine.history_by_employee("E2").len(), 1);
    assert!(engine.history_by_employee("E1").is_empty());
}
