//! Tracks how much time is spent on every website, day by day, and reports how much of it was
//! productive. A small daemon receives tab events from the browser and keeps per-day counters on
//! disk, the cli reads them back.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod utils;
