//! One passenger's trip, from acceptance to arrival.
//!
//! A [Booking] runs as its own tokio task: it waits for an idle driver, sleeps
//! through pickup and travel, and hands the driver back. The submitter holds a
//! [BookingHandle] that resolves exactly once with the [BookingResult] or with
//! the reason the trip never finished.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::agents::{Driver, Passenger};
use crate::dispatch::DispatchShared;
use crate::error::DispatchError;

pub type BookingId = u64;

/// Hands out booking ids: unique, gap-free and increasing in allocation order,
/// whichever thread asks.
#[derive(Debug, Default)]
pub struct BookingIdGenerator {
    next: AtomicU64,
}

impl BookingIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> BookingId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of ids allocated so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BookingState {
    Created,
    WaitingForDriver,
    Pickup,
    Travel,
    Completed,
    Cancelled,
}

impl BookingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingState::Completed | BookingState::Cancelled)
    }
}

/// Milestones of a booking on the runtime clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripTiming {
    pub created_at: Instant,
    pub driver_acquired_at: Option<Instant>,
    pub arrived_at: Option<Instant>,
}

impl TripTiming {
    fn new(created_at: Instant) -> Self {
        Self {
            created_at,
            driver_acquired_at: None,
            arrived_at: None,
        }
    }

    /// Time from creation until a driver was assigned.
    pub fn wait_for_driver(&self) -> Option<Duration> {
        self.driver_acquired_at
            .map(|acquired| acquired.saturating_duration_since(self.created_at))
    }

    /// Time from driver assignment until arrival; zero until both are known.
    pub fn trip_duration(&self) -> Duration {
        match (self.driver_acquired_at, self.arrived_at) {
            (Some(acquired), Some(arrived)) => arrived.saturating_duration_since(acquired),
            _ => Duration::ZERO,
        }
    }
}

/// Final record of a finished booking.
#[derive(Debug, Clone)]
pub struct BookingResult {
    pub booking_id: BookingId,
    pub region: String,
    pub passenger: Passenger,
    pub driver: Option<Driver>,
    pub duration: Duration,
    pub timing: TripTiming,
}

impl BookingResult {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

pub struct Booking {
    id: BookingId,
    region: String,
    passenger: Passenger,
    driver: Option<Driver>,
    state: BookingState,
    timing: TripTiming,
    shared: Arc<DispatchShared>,
}

impl Booking {
    pub(crate) fn new(
        id: BookingId,
        region: String,
        passenger: Passenger,
        shared: Arc<DispatchShared>,
    ) -> Self {
        let booking = Self {
            id,
            region,
            passenger,
            driver: None,
            state: BookingState::Created,
            timing: TripTiming::new(Instant::now()),
            shared,
        };
        booking.shared.log_event(&booking, "Creating booking");
        booking
    }

    pub fn id(&self) -> BookingId {
        self.id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn passenger(&self) -> &Passenger {
        &self.passenger
    }

    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    pub fn state(&self) -> BookingState {
        self.state
    }

    pub fn timing(&self) -> &TripTiming {
        &self.timing
    }

    fn advance(&mut self, state: BookingState, message: &str) {
        self.state = state;
        self.shared.log_event(self, message);
    }

    /// Drives the booking to completion. Dropping the future part way through
    /// cancels the booking; see the `Drop` impl.
    pub(crate) async fn run(mut self) -> BookingResult {
        self.advance(BookingState::WaitingForDriver, "Waiting for a driver");
        let driver = self.shared.pool.acquire().await;
        self.timing.driver_acquired_at = Some(Instant::now());
        let pickup = self.shared.pickup_delay(&driver);
        self.driver = Some(driver);

        self.advance(BookingState::Pickup, "Starting, on way to passenger");
        sleep(pickup).await;

        self.advance(BookingState::Travel, "Collected passenger, on way to destination");
        sleep(self.passenger.trip_duration()).await;
        self.timing.arrived_at = Some(Instant::now());

        self.advance(BookingState::Completed, "At destination, driver is now free");
        self.finish()
    }

    fn finish(&mut self) -> BookingResult {
        let driver = self.driver.take();
        if let Some(driver) = &driver {
            self.shared.return_driver(driver.clone());
        }
        BookingResult {
            booking_id: self.id,
            region: self.region.clone(),
            passenger: self.passenger.clone(),
            driver,
            duration: self.timing.trip_duration(),
            timing: self.timing,
        }
    }
}

impl Drop for Booking {
    fn drop(&mut self) {
        if self.state == BookingState::Completed {
            return;
        }
        self.state = BookingState::Cancelled;
        self.shared.log_event(self, "Booking cancelled");
        if let Some(driver) = self.driver.take() {
            self.shared.return_driver(driver);
        }
    }
}

impl fmt::Display for Booking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let driver = self.driver.as_ref().map_or("null", |d| d.name());
        write!(f, "{}:{}:{}", self.id, driver, self.passenger.name())
    }
}

impl fmt::Debug for Booking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Booking")
            .field("id", &self.id)
            .field("region", &self.region)
            .field("passenger", &self.passenger)
            .field("driver", &self.driver)
            .field("state", &self.state)
            .finish()
    }
}

/// Pending result of an accepted booking.
///
/// Awaiting the handle yields the [BookingResult], or
/// [DispatchError::CancelledWait] if the booking was cancelled first.
#[derive(Debug)]
pub struct BookingHandle {
    booking_id: BookingId,
    region: String,
    task: JoinHandle<Result<BookingResult, DispatchError>>,
}

impl BookingHandle {
    pub(crate) fn new(
        booking_id: BookingId,
        region: String,
        task: JoinHandle<Result<BookingResult, DispatchError>>,
    ) -> Self {
        Self {
            booking_id,
            region,
            task,
        }
    }

    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Interrupts the booking wherever it is. A held driver goes back to the
    /// pool and the handle resolves to [DispatchError::CancelledWait].
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Future for BookingHandle {
    type Output = Result<BookingResult, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let booking_id = self.booking_id;
        let joined = ready!(Pin::new(&mut self.task).poll(cx));
        Poll::Ready(match joined {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => Err(DispatchError::CancelledWait { booking_id }),
            Err(err) => Err(DispatchError::BookingFailed {
                booking_id,
                reason: err.to_string(),
            }),
        })
    }
}
