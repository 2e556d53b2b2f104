use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub provider_id: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub vacant_seats: u32,
    pub departure_time: NaiveTime,
    pub pick_up_point: String,
    pub destination: String,
    pub booked_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleType {
    Car,
    Bike,
}

impl VehicleType {
    pub fn name(&self) -> String {
        match self {
            Self::Car => "Car".into(),
            Self::Bike => "Bike".into(),
        }
    }
}

/// The validated add-request from which the registry mints a ride.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RideDraft {
    #[validate(length(min = 1))]
    pub provider_id: String,
    pub vehicle_type: VehicleType,
    #[validate(length(min = 1))]
    pub vehicle_number: String,
    #[validate(range(min = 1))]
    pub vacant_seats: u32,
    pub departure_time: NaiveTime,
    #[validate(length(min = 1))]
    pub pick_up_point: String,
    #[validate(length(min = 1))]
    pub destination: String,
}

impl RideDraft {
    /// Trims the free-text fields so blank-only input fails validation.
    pub fn trimmed(mut self) -> Self {
        self.provider_id = self.provider_id.trim().to_string();
        self.vehicle_number = self.vehicle_number.trim().to_string();
        self.pick_up_point = self.pick_up_point.trim().to_string();
        self.destination = self.destination.trim().to_string();
        self
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideFilter {
    pub vehicle_type: Option<VehicleType>,
}

impl Ride {
    pub fn new(draft: RideDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: draft.provider_id,
            vehicle_type: draft.vehicle_type,
            vehicle_number: draft.vehicle_number,
            vacant_seats: draft.vacant_seats,
            departure_time: draft.departure_time,
            pick_up_point: draft.pick_up_point,
            destination: draft.destination,
            booked_by: Vec::new(),
            created_at,
        }
    }

    pub fn is_booked_by(&self, employee_id: &str) -> bool {
        self.booked_by.iter().any(|id| id == employee_id)
    }

    /// An active ride blocks any draft reusing its provider or vehicle.
    pub fn conflicts_with(&self, draft: &RideDraft) -> bool {
        self.provider_id == draft.provider_id || self.vehicle_number == draft.vehicle_number
    }

    #[tracing::instrument]
    pub fn book(&mut self, employee_id: &str) -> bool {
        if self.vacant_seats == 0 {
            return false;
        }

        if employee_id == self.provider_id || self.is_booked_by(employee_id) {
            return false;
        }

        self.booked_by.push(employee_id.to_string());
        self.vacant_seats -= 1;

        true
    }

    #[tracing::instrument]
    pub fn release_seat(&mut self, employee_id: &str) -> bool {
        match self.booked_by.iter().position(|id| id == employee_id) {
            Some(index) => {
                self.booked_by.remove(index);
                self.vacant_seats += 1;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
fn draft(provider_id: &str, vehicle_number: &str, vacant_seats: u32) -> RideDraft {
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

#[test]
fn test_booking_conserves_seats() {
    let mut ride = Ride::new(draft("E1", "KA-01", 3), Utc::now());

    assert!(ride.book("E2"));
    assert!(ride.book("E3"));
    assert_eq!(ride.vacant_seats + ride.booked_by.len() as u32, 3);

    assert!(ride.release_seat("E2"));
    assert_eq!(ride.vacant_seats + ride.booked_by.len() as u32, 3);
    assert_eq!(ride.vacant_seats, 2);
}

#[test]
fn test_book_refusals() {
    let mut ride = Ride::new(draft("E1", "KA-01", 1), Utc::now());

    assert!(!ride.book("E1"), "provider cannot book own ride");

    assert!(ride.book("E2"));
    assert!(!ride.book("E2"), "no duplicate bookings");
    assert!(!ride.book("E3"), "no seats left");
    assert_eq!(ride.vacant_seats, 0);
    assert_eq!(ride.booked_by, vec!["E2".to_string()]);
}

#[test]
fn test_release_seat_requires_booking() {
    let mut ride = Ride::new(draft("E1", "KA-01", 2), Utc::now());

    assert!(!ride.release_seat("E2"));
    assert_eq!(ride.vacant_seats, 2);
}

#[test]
fn test_draft_validation() {
    assert!(draft("E1", "KA-01", 1).validate().is_ok());
    assert!(draft("", "KA-01", 1).validate().is_err());
    assert!(draft("E1", "KA-01", 0).validate().is_err());

    let blank = draft("   ", "KA-01", 1).trimmed();
    assert!(blank.validate().is_err());
}
