use thiserror::Error;

use crate::booking::BookingId;

/// Outcomes that stop a booking from being accepted or from completing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown region `{0}`")]
    UnknownRegion(String),
    #[error("dispatch is shutting down, booking rejected")]
    DispatchShuttingDown,
    #[error("booking {booking_id} was cancelled before reaching its destination")]
    CancelledWait { booking_id: BookingId },
    #[error("driver pool is full ({capacity} idle drivers)")]
    PoolOverflow { capacity: usize },
    #[error("booking {booking_id} failed: {reason}")]
    BookingFailed { booking_id: BookingId, reason: String },
}

/// Errors raised while building a dispatch from its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one region must be configured")]
    NoRegions,
    #[error("region names cannot be empty")]
    EmptyRegionName,
    #[error("region `{region}` must allow at least one simultaneous booking")]
    ZeroCapacity { region: String },
    #[error("driver pool capacity must be positive")]
    ZeroDriverCapacity,
    #[error("dispatch must be created inside a tokio runtime")]
    NoRuntime,
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}
