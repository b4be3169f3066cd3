//! Test helpers for common test setup and utilities.
//!
//! Shared by the unit tests, the integration tests and the benchmarks so the
//! same fixtures are built the same way everywhere.

use std::sync::Arc;
use std::time::Duration;

use crate::agents::{Driver, Passenger};
use crate::config::DispatchConfig;
use crate::dispatch::Dispatch;
use crate::event_log::MemoryEventLog;

/// Seed used by every helper-built dispatch.
pub const TEST_SEED: u64 = 42;

/// A driver named `D-<index>` with the given pickup jitter.
pub fn test_driver(index: usize, max_delay_ms: u64) -> Driver {
    Driver::new(format!("D-{index}"), Duration::from_millis(max_delay_ms))
}

/// A passenger named `P-<index>` with the given trip duration.
pub fn test_passenger(index: usize, trip_ms: u64) -> Passenger {
    Passenger::new(format!("P-{index}"), Duration::from_millis(trip_ms))
}

/// One region called `city` with the given capacity.
pub fn city_config(capacity: usize) -> DispatchConfig {
    DispatchConfig::default()
        .with_region("city", capacity)
        .with_seed(TEST_SEED)
}

/// Builds a dispatch on the current runtime and seeds its pool with
/// `drivers` drivers (`D-0`, `D-1`, ...).
///
/// # Panics
///
/// Panics outside a tokio runtime or if the config is invalid.
pub fn dispatch_with_drivers(
    config: DispatchConfig,
    drivers: usize,
    max_delay_ms: u64,
) -> Dispatch {
    let dispatch = Dispatch::new(config).expect("test dispatch config should be valid");
    seed_drivers(&dispatch, drivers, max_delay_ms);
    dispatch
}

/// Same as [dispatch_with_drivers] with event logging on and captured in memory.
///
/// # Panics
///
/// Panics outside a tokio runtime or if the config is invalid.
pub fn logged_dispatch(
    config: DispatchConfig,
    drivers: usize,
    max_delay_ms: u64,
) -> (Dispatch, Arc<MemoryEventLog>) {
    let log = Arc::new(MemoryEventLog::new());
    let dispatch = Dispatch::with_event_log(config.with_log_events(true), log.clone())
        .expect("test dispatch config should be valid");
    seed_drivers(&dispatch, drivers, max_delay_ms);
    (dispatch, log)
}

fn seed_drivers(dispatch: &Dispatch, drivers: usize, max_delay_ms: u64) {
    for i in 0..drivers {
        dispatch
            .add_driver(test_driver(i, max_delay_ms))
            .expect("test pool should have room");
    }
}
