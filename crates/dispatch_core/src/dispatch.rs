//! Central coordinator: owns the driver pool and the region registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::agents::{Driver, Passenger};
use crate::booking::{Booking, BookingHandle, BookingIdGenerator};
use crate::config::DispatchConfig;
use crate::error::{ConfigError, DispatchError};
use crate::event_log::{EventLog, TracingEventLog};
use crate::pool::DriverPool;
use crate::region::{saturating_decrement, Region};
use crate::telemetry::DispatchSnapshot;

/// State every region and booking of one dispatch shares.
pub(crate) struct DispatchShared {
    pub(crate) pool: DriverPool,
    pub(crate) ids: BookingIdGenerator,
    pub(crate) runtime: Handle,
    event_log: Option<Arc<dyn EventLog>>,
    rng: Mutex<StdRng>,
    pending: AtomicUsize,
    idle: Notify,
    shutdown: RwLock<bool>,
}

impl DispatchShared {
    pub(crate) fn shutdown_flag(&self) -> RwLockReadGuard<'_, bool> {
        self.shutdown.read()
    }

    pub(crate) fn log_event(&self, booking: &Booking, message: &str) {
        if let Some(log) = &self.event_log {
            log.record(booking, message);
        }
    }

    pub(crate) fn accept_booking(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Called once per finished booking, completed or cancelled.
    pub(crate) fn complete_booking(&self) {
        if saturating_decrement(&self.pending) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Uniform in `[0, driver.max_delay]`.
    pub(crate) fn pickup_delay(&self, driver: &Driver) -> Duration {
        let max_ms = driver.max_delay().as_millis() as u64;
        Duration::from_millis(self.rng.lock().gen_range(0..=max_ms))
    }

    pub(crate) fn return_driver(&self, driver: Driver) {
        let name = driver.name().to_string();
        if let Err(err) = self.pool.release(driver) {
            tracing::error!(driver = %name, %err, "driver could not be returned to the pool");
        }
    }
}

pub struct Dispatch {
    shared: Arc<DispatchShared>,
    regions: BTreeMap<String, Region>,
}

impl Dispatch {
    /// Builds a dispatch on the current tokio runtime.
    pub fn new(config: DispatchConfig) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Self::with_runtime(config, runtime)
    }

    /// Builds a dispatch whose bookings run on `runtime`; bookings can then be
    /// submitted from any thread.
    pub fn with_runtime(config: DispatchConfig, runtime: Handle) -> Result<Self, ConfigError> {
        Self::build(config, runtime, Arc::new(TracingEventLog))
    }

    /// Like [Dispatch::new] but routes booking events to `event_log`.
    /// Events are still dropped unless `config.log_events` is set.
    pub fn with_event_log(
        config: DispatchConfig,
        event_log: Arc<dyn EventLog>,
    ) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Self::build(config, runtime, event_log)
    }

    fn build(
        config: DispatchConfig,
        runtime: Handle,
        event_log: Arc<dyn EventLog>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let shared = Arc::new(DispatchShared {
            pool: DriverPool::new(config.max_drivers),
            ids: BookingIdGenerator::new(),
            runtime,
            event_log: config.log_events.then_some(event_log),
            rng: Mutex::new(rng),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
            shutdown: RwLock::new(false),
        });

        let regions = config
            .regions
            .into_iter()
            .map(|(name, capacity)| {
                let region = Region::new(name.clone(), capacity, Arc::clone(&shared));
                (name, region)
            })
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(
            regions = regions.len(),
            max_drivers = config.max_drivers,
            "dispatch created"
        );
        Ok(Self { shared, regions })
    }

    /// Adds an idle driver to the shared pool.
    pub fn add_driver(&self, driver: Driver) -> Result<(), DispatchError> {
        self.shared.pool.release(driver)
    }

    /// Books `passenger` into `region`. The booking counts as pending from
    /// this moment until its handle resolves.
    pub fn book_passenger(
        &self,
        passenger: Passenger,
        region: &str,
    ) -> Result<BookingHandle, DispatchError> {
        if self.is_shutdown() {
            tracing::warn!(region, passenger = %passenger, "booking rejected, dispatch is shutting down");
            return Err(DispatchError::DispatchShuttingDown);
        }
        let Some(target) = self.regions.get(region) else {
            tracing::warn!(region, passenger = %passenger, "booking rejected, unknown region");
            return Err(DispatchError::UnknownRegion(region.to_string()));
        };
        target.submit(passenger)
    }

    /// Bookings accepted but not yet finished, summed over all regions.
    pub fn bookings_awaiting_driver(&self) -> usize {
        self.regions.values().map(Region::active_count).sum()
    }

    /// Accepted minus finished, as counted by the dispatch itself.
    pub fn pending_bookings(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn idle_drivers(&self) -> usize {
        self.shared.pool.idle_count()
    }

    /// Rejects every future booking. Accepted bookings keep running, including
    /// those still waiting for a driver.
    pub fn shutdown(&self) {
        {
            let mut closed = self.shared.shutdown.write();
            if !*closed {
                *closed = true;
                tracing::info!(pending = self.pending_bookings(), "dispatch shutting down");
            }
        }
        for region in self.regions.values() {
            region.shutdown();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shared.shutdown_flag()
    }

    /// Forwards to the event log when logging is enabled.
    pub fn log_event(&self, booking: &Booking, message: &str) {
        self.shared.log_event(booking, message);
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    /// Total booking ids handed out, i.e. bookings ever accepted.
    pub fn bookings_accepted(&self) -> u64 {
        self.shared.ids.issued()
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            pending: self.pending_bookings(),
            accepted: self.bookings_accepted(),
            idle_drivers: self.idle_drivers(),
            shutdown: self.is_shutdown(),
            regions: self.regions.values().map(Region::snapshot).collect(),
        }
    }

    /// Resolves once no booking is pending.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending_bookings() == 0 {
                return;
            }
            notified.await;
        }
    }
}
