//! Sinks for booking lifecycle events.

use parking_lot::Mutex;

use crate::booking::{Booking, BookingId, BookingState};

/// Receives `(booking, message)` pairs as bookings move through their states.
pub trait EventLog: Send + Sync {
    fn record(&self, booking: &Booking, message: &str);
}

/// Emits each event as a `tracing` info event, formatted `"<booking>: <message>"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn record(&self, booking: &Booking, message: &str) {
        tracing::info!(
            booking_id = booking.id(),
            region = booking.region(),
            state = ?booking.state(),
            "{booking}: {message}"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub booking_id: BookingId,
    pub state: BookingState,
    pub line: String,
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().clone()
    }

    pub fn for_booking(&self, booking_id: BookingId) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.booking_id == booking_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventLog for MemoryEventLog {
    fn record(&self, booking: &Booking, message: &str) {
        self.events.lock().push(LoggedEvent {
            booking_id: booking.id(),
            state: booking.state(),
            line: format!("{booking}: {message}"),
        });
    }
}
