//! Everything that feeds browser events into the daemon.

pub mod event_source;
