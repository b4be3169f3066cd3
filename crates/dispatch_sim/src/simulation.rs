//! One simulation run: seed drivers, book passengers into random regions,
//! shut down, then poll until every booking has resolved.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context};
use dispatch_core::agents::{Driver, Passenger};
use dispatch_core::booking::{BookingHandle, BookingResult};
use dispatch_core::config::DispatchConfig;
use dispatch_core::dispatch::Dispatch;
use dispatch_core::error::DispatchError;
use dispatch_core::telemetry::DispatchSnapshot;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::Instant;

use crate::names::random_name;

/// Inputs of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub config: DispatchConfig,
    pub drivers: usize,
    pub passengers: usize,
    /// Upper bound for driver pickup jitter and passenger trip length.
    pub max_sleep: Duration,
    /// How often the progress line is refreshed.
    pub poll_interval: Duration,
    pub show_progress: bool,
}

impl SimulationParams {
    pub fn new(regions: BTreeMap<String, usize>, drivers: usize, passengers: usize) -> Self {
        Self {
            config: DispatchConfig::new(regions, false),
            drivers,
            passengers,
            max_sleep: Duration::from_millis(100),
            poll_interval: Duration::from_secs(1),
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub elapsed_ms: u64,
    pub booked: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub average_trip_ms: Option<u64>,
    pub longest_trip_ms: Option<u64>,
    pub snapshot: DispatchSnapshot,
}

pub async fn run_simulation(params: SimulationParams) -> anyhow::Result<SimulationReport> {
    let start = Instant::now();
    let mut rng = match params.config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let dispatch = Dispatch::new(params.config.clone()).context("failed to build dispatch")?;
    let region_names = dispatch
        .region_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    for _ in 0..params.drivers {
        let driver = Driver::new(format!("D-{}", random_name(&mut rng)), params.max_sleep);
        dispatch
            .add_driver(driver)
            .context("driver pool rejected a driver")?;
    }

    let max_sleep_ms = params.max_sleep.as_millis() as u64;
    let mut handles = Vec::with_capacity(params.passengers);
    for _ in 0..params.passengers {
        let trip = Duration::from_millis(rng.gen_range(0..=max_sleep_ms));
        let passenger = Passenger::new(format!("P-{}", random_name(&mut rng)), trip);
        let Some(region) = region_names.choose(&mut rng) else {
            bail!("no regions configured");
        };
        match dispatch.book_passenger(passenger, region) {
            Ok(handle) => handles.push(handle),
            Err(err) => tracing::warn!(%err, region = %region, "booking was not accepted"),
        }
    }
    let booked = handles.len();

    dispatch.shutdown();

    if let Some(region) = region_names.choose(&mut rng) {
        let late = Passenger::new("Test", params.max_sleep);
        if dispatch.book_passenger(late, region).is_ok() {
            bail!("dispatch accepted a booking after shutdown started");
        }
    }

    let outcomes = wait_for_bookings(&dispatch, handles, &params).await;

    let mut completed = Vec::new();
    let mut cancelled = 0;
    let mut failed = 0;
    for outcome in outcomes {
        match outcome {
            Ok(result) => completed.push(result),
            Err(DispatchError::CancelledWait { .. }) => cancelled += 1,
            Err(err) => {
                tracing::error!(%err, "booking failed");
                failed += 1;
            }
        }
    }

    let report = SimulationReport {
        elapsed_ms: start.elapsed().as_millis() as u64,
        booked,
        completed: completed.len(),
        cancelled,
        failed,
        average_trip_ms: average_trip_ms(&completed),
        longest_trip_ms: completed.iter().map(BookingResult::duration_ms).max(),
        snapshot: dispatch.snapshot(),
    };
    Ok(report)
}

async fn wait_for_bookings(
    dispatch: &Dispatch,
    mut handles: Vec<BookingHandle>,
    params: &SimulationParams,
) -> Vec<Result<BookingResult, DispatchError>> {
    let bar = params.show_progress.then(|| progress_bar(handles.len()));
    let mut outcomes = Vec::with_capacity(handles.len());

    loop {
        let (finished, waiting): (Vec<_>, Vec<_>) =
            handles.into_iter().partition(BookingHandle::is_finished);
        for handle in finished {
            outcomes.push(handle.await);
        }
        handles = waiting;

        let pending = dispatch.bookings_awaiting_driver();
        match &bar {
            Some(bar) => {
                bar.set_position(outcomes.len() as u64);
                bar.set_message(format!("pending: {pending}"));
            }
            None => tracing::info!(active = handles.len(), pending, "simulation progress"),
        }

        if handles.is_empty() {
            break;
        }
        tokio::time::sleep(params.poll_interval).await;
    }

    if let Some(bar) = bar {
        bar.finish_with_message("Completed");
    }
    outcomes
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(err) => tracing::debug!(%err, "falling back to default progress style"),
    }
    bar
}

fn average_trip_ms(results: &[BookingResult]) -> Option<u64> {
    if results.is_empty() {
        return None;
    }
    let total: u64 = results.iter().map(BookingResult::duration_ms).sum();
    Some(total / results.len() as u64)
}
