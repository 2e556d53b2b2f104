use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Ride;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingHistoryEntry {
    pub ride_id: Uuid,
    pub employee_id: String,
    pub booked_at: DateTime<Utc>,
    pub ride_snapshot: Ride,
    pub status: BookingStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn name(&self) -> String {
        match self {
            Self::Upcoming => "upcoming".into(),
            Self::Completed => "completed".into(),
            Self::Cancelled => "cancelled".into(),
        }
    }
}

impl BookingHistoryEntry {
    pub fn new(
        ride: Ride,
        employee_id: String,
        booked_at: DateTime<Utc>,
        status: BookingStatus,
    ) -> Self {
        Self {
            ride_id: ride.id,
            employee_id,
            booked_at,
            ride_snapshot: ride,
            status,
        }
    }

    pub fn is_upcoming(&self) -> bool {
        match self.status {
            BookingStatus::Upcoming => true,
            _ => false,
        }
    }

    pub fn matches(&self, ride_id: Uuid, employee_id: &str) -> bool {
        self.ride_id == ride_id && self.employee_id == employee_id
    }

    /// Only upcoming bookings can be cancelled; completed and cancelled
    /// entries never transition again.
    #[tracing::instrument]
    pub fn cancel(&mut self) -> bool {
        match self.status {
            BookingStatus::Upcoming => {
                self.status = BookingStatus::Cancelled;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
fn entry(status: BookingStatus) -> BookingHistoryEntry {
    use crate::entities::{RideDraft, VehicleType};

    let ride = Ride::new(
        RideDraft {
            provider_id: "E1".into(),
            vehicle_type: VehicleType::Bike,
            vehicle_number: "KA-07".into(),
            vacant_seats: 1,
            departure_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            pick_up_point: "Gate 2".into(),
            destination: "Main Office".into(),
        },
        Utc::now(),
    );

    BookingHistoryEntry::new(ride, "E2".into(), Utc::now(), status)
}

#[test]
fn test_cancel_only_from_upcoming() {
    let mut upcoming = entry(BookingStatus::Upcoming);
    assert!(upcoming.cancel());
    assert_eq!(upcoming.status, BookingStatus::Cancelled);
    assert!(!upcoming.cancel(), "already cancelled");

    let mut completed = entry(BookingStatus::Completed);
    assert!(!completed.cancel());
    assert_eq!(completed.status, BookingStatus::Completed);
}

#[test]
fn test_status_names() {
    assert_eq!(BookingStatus::Upcoming.name(), "upcoming");
    assert_eq!(BookingStatus::Completed.name(), "completed");
    assert_eq!(BookingStatus::Cancelled.name(), "cancelled");
}
