use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use dispatch_core::config::DispatchConfig;
use dispatch_sim::simulation::{run_simulation, SimulationParams, SimulationReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dispatch_sim",
    about = "Run a ride dispatch simulation across several regions",
    long_about = "Seeds a shared driver pool, books random passengers into random regions,\n\
                  shuts dispatch down and waits for every accepted booking to finish."
)]
struct Cli {
    /// Region as NAME=CAPACITY; repeat for several regions
    #[arg(long = "region", value_parser = parse_region)]
    regions: Vec<(String, usize)>,
    /// JSON dispatch config; --region entries are added on top of it
    #[arg(long, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Number of drivers in the pool
    #[arg(long, default_value_t = 10)]
    drivers: usize,
    /// Number of passengers to book
    #[arg(long, default_value_t = 30)]
    passengers: usize,
    /// Upper bound for pickup jitter and trip length, in milliseconds
    #[arg(long, default_value_t = 100)]
    max_sleep_ms: u64,
    /// Emit every booking lifecycle event
    #[arg(long)]
    log_events: bool,
    /// Seed for names, trips and pickup delays
    #[arg(long)]
    seed: Option<u64>,
    /// Progress refresh interval, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn parse_region(raw: &str) -> Result<(String, usize), String> {
    let (name, capacity) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=CAPACITY, got '{raw}'"))?;
    let capacity = capacity
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid capacity in '{raw}': {err}"))?;
    Ok((name.trim().to_string(), capacity))
}

fn default_regions() -> BTreeMap<String, usize> {
    [("North", 3), ("South", 2), ("East", 2), ("West", 3)]
        .into_iter()
        .map(|(name, capacity)| (name.to_string(), capacity))
        .collect()
}

impl Cli {
    fn dispatch_config(&self) -> anyhow::Result<DispatchConfig> {
        let mut config = match &self.config {
            Some(path) => DispatchConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None if self.regions.is_empty() => {
                DispatchConfig::new(default_regions(), self.log_events)
            }
            None => DispatchConfig::default(),
        };
        for (name, capacity) in &self.regions {
            config = config.with_region(name.clone(), *capacity);
        }
        if self.log_events {
            config = config.with_log_events(true);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
            .validate()
            .map_err(|err| anyhow!("invalid dispatch config: {err}"))?;
        Ok(config)
    }

    fn params(&self) -> anyhow::Result<SimulationParams> {
        let config = self.dispatch_config()?;
        let show_progress = !self.no_progress && !self.json && !config.log_events;
        let mut params = SimulationParams::new(BTreeMap::new(), self.drivers, self.passengers);
        params.config = config;
        params.max_sleep = Duration::from_millis(self.max_sleep_ms);
        params.poll_interval = Duration::from_millis(self.poll_ms.max(1));
        params.show_progress = show_progress;
        Ok(params)
    }
}

fn print_summary(report: &SimulationReport) {
    println!("Simulation complete in {}ms", report.elapsed_ms);
    println!(
        "Bookings: {} accepted, {} completed, {} cancelled, {} failed",
        report.booked, report.completed, report.cancelled, report.failed
    );
    if let Some(avg) = report.average_trip_ms {
        println!("Average trip: {avg}ms");
    }
    if let Some(longest) = report.longest_trip_ms {
        println!("Longest trip: {longest}ms");
    }
    println!("Idle drivers: {}", report.snapshot.idle_drivers);
    for region in &report.snapshot.regions {
        println!(
            "  {:<10} capacity {:>3}  peak {:>3}  completed {:>4}  cancelled {:>3}",
            region.name, region.capacity, region.peak_running, region.completed, region.cancelled
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let params = cli.params()?;
    let report = run_simulation(params).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}
