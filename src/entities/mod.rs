mod booking;
mod ride;

pub use booking::{BookingHistoryEntry, BookingStatus};
pub use ride::{Ride, RideDraft, RideFilter, VehicleType};
