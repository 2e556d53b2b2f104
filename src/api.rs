use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::entities::{BookingHistoryEntry, Ride, RideDraft, RideFilter};
use crate::error::Error;
use crate::registry::AvailableRides;

pub trait RideAPI {
    fn add_ride(&self, draft: RideDraft) -> Result<bool, Error>;

    fn book_ride(&self, ride_id: Uuid, employee_id: &str) -> Result<bool, Error>;

    fn cancel_booking(&self, ride_id: Uuid, employee_id: &str) -> Result<bool, Error>;

    fn rides(&self) -> watch::Receiver<Vec<Ride>>;

    fn available_rides(&self, filter: Option<RideFilter>) -> AvailableRides;
}

pub trait HistoryAPI {
    fn history(&self) -> watch::Receiver<Vec<BookingHistoryEntry>>;

    fn history_by_employee(&self, employee_id: &str) -> Vec<BookingHistoryEntry>;
}

pub trait API: RideAPI + HistoryAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
