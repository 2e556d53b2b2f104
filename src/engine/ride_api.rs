use tokio::sync::watch;
use uuid::Uuid;
use validator::Validate;

use super::Engine;
use crate::{
    api::RideAPI,
    entities::{Ride, RideDraft, RideFilter},
    error::Error,
    registry::AvailableRides,
};

impl RideAPI for Engine {
    #[tracing::instrument(skip(self))]
    fn add_ride(&self, draft: RideDraft) -> Result<bool, Error> {
        let draft = draft.trimmed();

        if draft.validate().is_err() {
            tracing::warn!("ride form is incomplete, rejecting...");
            self.notifier
                .warning("Please fill all required fields correctly.");
            return Ok(false);
        }

        if !self.registry.add_ride(draft)? {
            self.notifier.error(
                "Failed to add ride. Employee ID or Vehicle Number already exists. \
                 Please use different details.",
            );
            return Ok(false);
        }

        self.notifier
            .success("Ride added successfully! Your ride is now available for booking.");

        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    fn book_ride(&self, ride_id: Uuid, employee_id: &str) -> Result<bool, Error> {
        let employee_id = employee_id.trim();

        if employee_id.is_empty() {
            tracing::warn!("no employee id given, rejecting booking...");
            self.notifier
                .warning("Please enter your Employee ID to book the ride.");
            return Ok(false);
        }

        if !self.registry.book_ride(ride_id, employee_id)? {
            self.notifier.error(
                "Failed to book ride. Please check if the ride is still available \
                 or you have already booked it.",
            );
            return Ok(false);
        }

        self.notifier
            .success("Ride booked successfully! Your seat has been confirmed.");

        Ok(true)
    }

    /// Overall success requires both the seat release and the history
    /// transition; a half that already happened is not rolled back.
    #[tracing::instrument(skip(self))]
    fn cancel_booking(&self, ride_id: Uuid, employee_id: &str) -> Result<bool, Error> {
        let seat_released = self.registry.cancel_booking(ride_id, employee_id)?;
        let entry_cancelled = self.ledger.cancel_booking(ride_id, employee_id)?;

        if !(seat_released && entry_cancelled) {
            tracing::warn!(
                seat_released,
                entry_cancelled,
                "cancellation incomplete..."
            );
            self.notifier.error(
                "Cannot cancel this booking. It may be completed, already cancelled, \
                 or no longer available.",
            );
            return Ok(false);
        }

        self.notifier
            .success("Booking cancelled successfully! Your seat has been freed up.");

        Ok(true)
    }

    fn rides(&self) -> watch::Receiver<Vec<Ride>> {
        self.registry.rides()
    }

    fn available_rides(&self, filter: Option<RideFilter>) -> AvailableRides {
        self.registry.available_rides(filter)
    }
}

#[cfg(test)]
fn draft(provider_id: &str, vehicle_number: &str) -> RideDraft {
    use crate::entities::VehicleType;

    RideDraft {
        provider_id: provider_id.into(),
        vehicle_type: VehicleType::Car,
        vehicle_number: vehicle_number.into(),
        vacant_seats: 2,
        departure_time: chrono::NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        pick_up_point: "Gate 1".into(),
        destination: "Tech Park".into(),
    }
}

#[test]
fn test_add_ride_validates_before_the_registry() {
    use super::testkit;
    use crate::notify::Severity;

    let (engine, _, notifier) = testkit::engine();

    assert!(!engine.add_ride(draft("   ", "KA-01")).unwrap());
    assert_eq!(notifier.last().unwrap().0, Severity::Warning);
    assert!(engine.rides().borrow().is_empty());

    let mut seatless = draft("E1", "KA-01");
    seatless.vacant_seats = 0;
    assert!(!engine.add_ride(seatless).unwrap());
    assert!(engine.rides().borrow().is_empty());
}

#[test]
fn test_add_ride_reports_conflicts() {
    use super::testkit;
    use crate::notify::Severity;

    let (engine, _, notifier) = testkit::engine();

    assert!(engine.add_ride(draft("E1", "KA-01")).unwrap());
    assert_eq!(notifier.last().unwrap().0, Severity::Success);

    assert!(!engine.add_ride(draft("E1", "KA-02")).unwrap());
    let (severity, message) = notifier.last().unwrap();
    assert_eq!(severity, Severity::Error);
    assert!(message.starts_with("Failed to add ride."));
}

#[test]
fn test_book_ride_trims_the_employee_id() {
    use super::testkit;
    use crate::notify::Severity;

    let (engine, _, notifier) = testkit::engine();

    engine.add_ride(draft("E1", "KA-01")).unwrap();
    let ride_id = engine.rides().borrow()[0].id;

    assert!(!engine.book_ride(ride_id, "   ").unwrap());
    assert_eq!(notifier.last().unwrap().0, Severity::Warning);

    assert!(engine.book_ride(ride_id, "  E2  ").unwrap());
    assert_eq!(engine.rides().borrow()[0].booked_by, vec!["E2"]);

    // The trimmed id is the one on record, so a retry is a duplicate.
    assert!(!engine.book_ride(ride_id, "E2").unwrap());
    assert_eq!(notifier.last().unwrap().0, Severity::Error);
}

#[test]
fn test_cancel_booking_requires_both_halves() {
    use super::testkit;
    use crate::api::HistoryAPI;
    use crate::notify::Severity;

    let (engine, _, notifier) = testkit::engine();

    engine.add_ride(draft("E1", "KA-01")).unwrap();
    let ride_id = engine.rides().borrow()[0].id;
    engine.book_ride(ride_id, "E2").unwrap();

    assert!(engine.cancel_booking(ride_id, "E2").unwrap());
    assert_eq!(notifier.last().unwrap().0, Severity::Success);
    assert_eq!(engine.rides().borrow()[0].vacant_seats, 2);

    // Nothing left to cancel on either side.
    assert!(!engine.cancel_booking(ride_id, "E2").unwrap());
    assert_eq!(notifier.last().unwrap().0, Severity::Error);

    let history = engine.history_by_employee("E2");
    assert_eq!(history.len(), 1);
}

#[test]
fn test_cancel_booking_is_not_transactional() {
    use super::testkit;
    use crate::entities::BookingStatus;

    let (engine, _, _) = testkit::engine();

    engine.add_ride(draft("E1", "KA-01")).unwrap();
    let ride_id = engine.rides().borrow()[0].id;
    engine.book_ride(ride_id, "E2").unwrap();

    // The ledger half alone has already cancelled the entry.
    assert!(engine.ledger.cancel_booking(ride_id, "E2").unwrap());

    // The composed cancellation now fails overall, yet the seat it released
    // stays released.
    assert!(!engine.cancel_booking(ride_id, "E2").unwrap());
    assert_eq!(engine.rides().borrow()[0].vacant_seats, 2);
    assert_eq!(
        engine.ledger.history_by_employee("E2")[0].status,
        BookingStatus::Cancelled
    );
}

#[test]
fn test_booking_flow_feeds_the_available_view() {
    use super::testkit;
    use tokio_test::block_on;

    let (engine, _, _) = testkit::engine();

    let mut feed = engine.rides();

    engine.add_ride(draft("E1", "KA-01")).unwrap();
    block_on(feed.changed()).unwrap();

    let view = engine.available_rides(None);
    assert_eq!(view.current().len(), 1);

    let ride_id = feed.borrow()[0].id;
    engine.book_ride(ride_id, "E2").unwrap();
    engine.book_ride(ride_id, "E3").unwrap();

    assert!(view.current().is_empty(), "fully booked rides drop out");
}
