//! Utility modules: wall clock, single-flight deduplication.

pub mod clock;
pub mod single_flight;
