//! Discovery-and-health polling engine.
//!
//! One cycle walks four phases:
//! 1. Locate the first reachable Sentinel from the configured list
//! 2. Enumerate masters and their replicas through it
//! 3. Probe every node and every configured Sentinel
//! 4. Persist the snapshots and fold them into a report
//!
//! Probes never fail past their boundary; a cycle is only abandoned when
//! no Sentinel answers or master enumeration itself fails.

pub mod engine;
pub mod locator;
pub mod probe;
pub mod topology;

pub use engine::PollingEngine;
pub use topology::MasterInfo;
