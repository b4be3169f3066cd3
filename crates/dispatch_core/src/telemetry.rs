//! Point-in-time counters for reporting and export.

use serde::Serialize;

/// One region's counters at the moment of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSnapshot {
    pub name: String,
    pub capacity: usize,
    /// Accepted and not yet finished.
    pub active: usize,
    /// Holding a worker slot.
    pub running: usize,
    pub peak_running: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub shutdown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub pending: usize,
    pub accepted: u64,
    pub idle_drivers: usize,
    pub shutdown: bool,
    pub regions: Vec<RegionSnapshot>,
}

impl DispatchSnapshot {
    pub fn completed(&self) -> usize {
        self.regions.iter().map(|r| r.completed).sum()
    }

    pub fn cancelled(&self) -> usize {
        self.regions.iter().map(|r| r.cancelled).sum()
    }

    /// Bookings accepted but not finished, summed over regions.
    pub fn active(&self) -> usize {
        self.regions.iter().map(|r| r.active).sum()
    }
}
