use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::entities::{Ride, RideFilter};

pub const DEFAULT_BUFFER_MINUTES: i64 = 60;

/// Anchors a time-of-day on the current date; rides carry no date of their
/// own and are implicitly same-day.
pub fn departure_on(now: DateTime<Utc>, departure_time: NaiveTime) -> DateTime<Utc> {
    now.date_naive().and_time(departure_time).and_utc()
}

pub fn is_same_day(departure: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    departure.date_naive() == now.date_naive()
}

/// Symmetric window: near-past and near-future departures both qualify.
pub fn is_within_buffer(
    departure_time: NaiveTime,
    now: DateTime<Utc>,
    buffer_minutes: i64,
) -> bool {
    let departure = departure_on(now, departure_time);
    let offset = departure.signed_duration_since(now);

    offset.abs() <= Duration::minutes(buffer_minutes)
}

/// Total predicate behind the "bookable now" views.
pub fn is_available(
    ride: &Ride,
    now: DateTime<Utc>,
    filter: Option<&RideFilter>,
    buffer_minutes: i64,
) -> bool {
    let departure = departure_on(now, ride.departure_time);

    if !is_same_day(departure, now) {
        return false;
    }

    if !is_within_buffer(ride.departure_time, now, buffer_minutes) {
        return false;
    }

    if let Some(wanted) = filter.and_then(|f| f.vehicle_type) {
        if wanted != ride.vehicle_type {
            return false;
        }
    }

    ride.vacant_seats > 0
}

#[cfg(test)]
fn ride_at(departure_time: NaiveTime, vacant_seats: u32) -> Ride {
    use crate::entities::{RideDraft, VehicleType};

    Ride::new(
        RideDraft {
            provider_id: "E1".into(),
            vehicle_type: VehicleType::Car,
            vehicle_number: "KA-01".into(),
            vacant_seats,
            departure_time,
            pick_up_point: "Gate 1".into(),
            destination: "Tech Park".into(),
        },
        Utc::now(),
    )
}

#[test]
fn test_buffer_window_edges() {
    use chrono::TimeZone;

    let now = Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap();

    let edge = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
    assert!(is_within_buffer(edge, now, 60));

    let past_edge = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    assert!(is_within_buffer(past_edge, now, 60));

    let beyond = NaiveTime::from_hms_opt(11, 1, 0).unwrap();
    assert!(!is_within_buffer(beyond, now, 60));

    let long_gone = NaiveTime::from_hms_opt(8, 59, 0).unwrap();
    assert!(!is_within_buffer(long_gone, now, 60));
}

#[test]
fn test_same_day_comparison() {
    use chrono::TimeZone;

    let now = Utc.with_ymd_and_hms(2024, 5, 6, 23, 30, 0).unwrap();
    let tomorrow = Utc.with_ymd_and_hms(2024, 5, 7, 0, 15, 0).unwrap();

    assert!(is_same_day(now, now));
    assert!(!is_same_day(tomorrow, now));

    // A time-of-day anchored on today's date always lands on today.
    let anchored = departure_on(now, NaiveTime::from_hms_opt(0, 15, 0).unwrap());
    assert!(is_same_day(anchored, now));
}

#[test]
fn test_is_available_applies_all_conditions() {
    use crate::entities::{RideFilter, VehicleType};
    use chrono::TimeZone;

    let now = Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap();
    let in_window = NaiveTime::from_hms_opt(10, 30, 0).unwrap();

    let ride = ride_at(in_window, 2);
    assert!(is_available(&ride, now, None, 60));

    let out_of_window = ride_at(NaiveTime::from_hms_opt(22, 0, 0).unwrap(), 2);
    assert!(!is_available(&out_of_window, now, None, 60));

    let full = ride_at(in_window, 0);
    assert!(!is_available(&full, now, None, 60));

    let bike_only = RideFilter {
        vehicle_type: Some(VehicleType::Bike),
    };
    assert!(!is_available(&ride, now, Some(&bike_only), 60));

    let car_only = RideFilter {
        vehicle_type: Some(VehicleType::Car),
    };
    assert!(is_available(&ride, now, Some(&car_only), 60));

    let unfiltered = RideFilter::default();
    assert!(is_available(&ride, now, Some(&unfiltered), 60));
}
