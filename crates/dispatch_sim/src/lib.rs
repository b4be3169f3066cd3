//! Console simulation on top of `dispatch_core`: random drivers and
//! passengers, random regions, and a progress report until every booking
//! resolves.

pub mod names;
pub mod simulation;
