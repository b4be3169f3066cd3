#![allow(dead_code)]

use std::collections::BTreeMap;

use dispatch_core::booking::{BookingHandle, BookingResult};
use dispatch_core::error::DispatchError;

/// Awaits every handle in submission order.
pub async fn join_all(handles: Vec<BookingHandle>) -> Vec<Result<BookingResult, DispatchError>> {
    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await);
    }
    outcomes
}

/// Unwraps every outcome, failing the test on the first error.
pub fn completed(outcomes: Vec<Result<BookingResult, DispatchError>>) -> Vec<BookingResult> {
    outcomes
        .into_iter()
        .map(|outcome| outcome.expect("booking should complete"))
        .collect()
}

/// Asserts no driver ever served two bookings at overlapping times.
pub fn assert_driver_exclusivity(results: &[BookingResult]) {
    let mut by_driver: BTreeMap<String, Vec<&BookingResult>> = BTreeMap::new();
    for result in results {
        let driver = result.driver.as_ref().expect("completed booking has a driver");
        by_driver.entry(driver.name().to_string()).or_default().push(result);
    }

    for (driver, mut trips) in by_driver {
        trips.sort_by_key(|r| r.timing.driver_acquired_at);
        for pair in trips.windows(2) {
            let previous_arrival = pair[0].timing.arrived_at.expect("arrived");
            let next_acquired = pair[1].timing.driver_acquired_at.expect("acquired");
            assert!(
                next_acquired >= previous_arrival,
                "driver {driver} was assigned to booking {} before booking {} arrived",
                pair[1].booking_id,
                pair[0].booking_id
            );
        }
    }
}
