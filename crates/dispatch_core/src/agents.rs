//! Drivers and passengers.
//!
//! Both carry a [Profile]: a name plus a delay that each side interprets
//! differently (pickup jitter for drivers, trip length for passengers).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identity shared by every participant in a trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub max_delay_ms: u64,
}

impl Profile {
    pub fn new(name: impl Into<String>, max_delay: Duration) -> Self {
        Self {
            name: name.into(),
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// A driver. While idle it is owned by the [DriverPool](crate::pool::DriverPool);
/// while assigned it is owned by exactly one booking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Driver {
    profile: Profile,
}

impl Driver {
    /// `max_delay` bounds the simulated time to reach a passenger.
    pub fn new(name: impl Into<String>, max_delay: Duration) -> Self {
        Self {
            profile: Profile::new(name, max_delay),
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn max_delay(&self) -> Duration {
        self.profile.max_delay()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Passenger {
    profile: Profile,
}

impl Passenger {
    pub fn new(name: impl Into<String>, trip_duration: Duration) -> Self {
        Self {
            profile: Profile::new(name, trip_duration),
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Time spent driving from pickup to the destination.
    pub fn trip_duration(&self) -> Duration {
        self.profile.max_delay()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }
}

impl fmt::Display for Passenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
