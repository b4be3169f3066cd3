use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pool::DEFAULT_MAX_DRIVERS;

fn default_max_drivers() -> usize {
    DEFAULT_MAX_DRIVERS
}

/// Parameters for building a [Dispatch](crate::dispatch::Dispatch).
///
/// ```json
/// { "regions": { "north": 3, "south": 2 }, "log_events": true, "seed": 42 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Region name to the maximum number of simultaneously active bookings.
    pub regions: BTreeMap<String, usize>,
    /// Whether booking lifecycle events reach the event log.
    #[serde(default)]
    pub log_events: bool,
    /// Capacity of the idle driver pool.
    #[serde(default = "default_max_drivers")]
    pub max_drivers: usize,
    /// Seed for pickup delays. If None, delays are seeded from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            regions: BTreeMap::new(),
            log_events: false,
            max_drivers: DEFAULT_MAX_DRIVERS,
            seed: None,
        }
    }
}

impl DispatchConfig {
    pub fn new(regions: BTreeMap<String, usize>, log_events: bool) -> Self {
        Self {
            regions,
            log_events,
            ..Default::default()
        }
    }

    /// Add (or replace) a region with the given capacity.
    pub fn with_region(mut self, name: impl Into<String>, capacity: usize) -> Self {
        self.regions.insert(name.into(), capacity);
        self
    }

    pub fn with_log_events(mut self, log_events: bool) -> Self {
        self.log_events = log_events;
        self
    }

    pub fn with_max_drivers(mut self, max_drivers: usize) -> Self {
        self.max_drivers = max_drivers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        for (name, capacity) in &self.regions {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyRegionName);
            }
            if *capacity == 0 {
                return Err(ConfigError::ZeroCapacity {
                    region: name.clone(),
                });
            }
        }
        if self.max_drivers == 0 {
            return Err(ConfigError::ZeroDriverCapacity);
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
