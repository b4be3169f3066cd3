pub mod agents;
pub mod booking;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event_log;
pub mod pool;
pub mod region;
pub mod telemetry;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
