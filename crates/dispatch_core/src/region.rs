//! Per-region admission control.
//!
//! Every accepted booking is spawned right away but must hold one of the
//! region's `capacity` worker slots before it asks for a driver, so at most
//! `capacity` bookings of a region are ever mid-trip or waiting on the pool.
//! Extra bookings queue on the slot semaphore in no guaranteed order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Semaphore;

use crate::agents::Passenger;
use crate::booking::{Booking, BookingHandle};
use crate::dispatch::DispatchShared;
use crate::error::DispatchError;
use crate::telemetry::RegionSnapshot;

/// Decrements without wrapping below zero; returns the previous value.
pub(crate) fn saturating_decrement(counter: &AtomicUsize) -> usize {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .unwrap_or(0)
}

#[derive(Debug, Default)]
struct RegionCounters {
    /// Accepted and not yet finished, queued bookings included.
    active: AtomicUsize,
    /// Holding a worker slot.
    running: AtomicUsize,
    peak_running: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Accounting for one accepted booking. Issued at acceptance, dropped exactly
/// once when the booking task ends, however it ends.
struct BookingTicket {
    counters: Arc<RegionCounters>,
    shared: Arc<DispatchShared>,
    completed: bool,
}

impl BookingTicket {
    fn issue(counters: Arc<RegionCounters>, shared: Arc<DispatchShared>) -> Self {
        counters.active.fetch_add(1, Ordering::AcqRel);
        shared.accept_booking();
        Self {
            counters,
            shared,
            completed: false,
        }
    }

    fn mark_completed(&mut self) {
        self.completed = true;
    }
}

impl Drop for BookingTicket {
    fn drop(&mut self) {
        if self.completed {
            self.counters.completed.fetch_add(1, Ordering::AcqRel);
        } else {
            self.counters.cancelled.fetch_add(1, Ordering::AcqRel);
        }
        saturating_decrement(&self.counters.active);
        self.shared.complete_booking();
    }
}

struct RunningGuard<'a> {
    counters: &'a RegionCounters,
}

impl<'a> RunningGuard<'a> {
    fn enter(counters: &'a RegionCounters) -> Self {
        let now = counters.running.fetch_add(1, Ordering::AcqRel) + 1;
        counters.peak_running.fetch_max(now, Ordering::AcqRel);
        Self { counters }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        saturating_decrement(&self.counters.running);
    }
}

pub struct Region {
    name: String,
    capacity: usize,
    slots: Arc<Semaphore>,
    counters: Arc<RegionCounters>,
    shutdown: RwLock<bool>,
    shared: Arc<DispatchShared>,
}

impl Region {
    pub(crate) fn new(name: String, capacity: usize, shared: Arc<DispatchShared>) -> Self {
        Self {
            name,
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(RegionCounters::default()),
            shutdown: RwLock::new(false),
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Accepts a booking for `passenger` unless the region or its dispatch is
    /// shutting down. No booking (and no booking id) is created on rejection.
    pub fn submit(&self, passenger: Passenger) -> Result<BookingHandle, DispatchError> {
        // Both flags stay read-locked until the booking is spawned, so a
        // concurrent shutdown either sees this booking counted or rejects it.
        let dispatch_closed = self.shared.shutdown_flag();
        let region_closed = self.shutdown.read();
        if *dispatch_closed || *region_closed {
            tracing::warn!(
                region = %self.name,
                passenger = %passenger,
                "booking rejected, region is shutting down"
            );
            return Err(DispatchError::DispatchShuttingDown);
        }

        let mut ticket = BookingTicket::issue(Arc::clone(&self.counters), Arc::clone(&self.shared));
        let booking = Booking::new(
            self.shared.ids.next_id(),
            self.name.clone(),
            passenger,
            Arc::clone(&self.shared),
        );
        let booking_id = booking.id();
        let slots = Arc::clone(&self.slots);
        let counters = Arc::clone(&self.counters);

        let task = self.shared.runtime.spawn(async move {
            let _slot = slots
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::DispatchShuttingDown)?;
            let _running = RunningGuard::enter(&counters);
            let result = booking.run().await;
            ticket.mark_completed();
            Ok(result)
        });

        Ok(BookingHandle::new(booking_id, self.name.clone(), task))
    }

    /// Bookings accepted here and not yet finished.
    pub fn active_count(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }

    /// Bookings currently holding a worker slot.
    pub fn running_count(&self) -> usize {
        self.counters.running.load(Ordering::Acquire)
    }

    /// Highest `running_count` observed since the region was created.
    pub fn peak_running(&self) -> usize {
        self.counters.peak_running.load(Ordering::Acquire)
    }

    pub fn completed_count(&self) -> usize {
        self.counters.completed.load(Ordering::Acquire)
    }

    pub fn cancelled_count(&self) -> usize {
        self.counters.cancelled.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.read()
    }

    /// Stops accepting bookings. Accepted bookings, queued ones included, run
    /// to completion.
    pub fn shutdown(&self) {
        let mut closed = self.shutdown.write();
        if *closed {
            return;
        }
        *closed = true;
        tracing::debug!(
            region = %self.name,
            active = self.active_count(),
            "region shutting down"
        );
    }

    pub fn snapshot(&self) -> RegionSnapshot {
        RegionSnapshot {
            name: self.name.clone(),
            capacity: self.capacity,
            active: self.active_count(),
            running: self.running_count(),
            peak_running: self.peak_running(),
            completed: self.completed_count(),
            cancelled: self.cancelled_count(),
            shutdown: self.is_shutdown(),
        }
    }
}
