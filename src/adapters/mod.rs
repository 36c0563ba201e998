//! Adapter implementations of the port traits.
//!
//! `live` adapters touch the real clock, disk, network, and log output;
//! `memory` adapters keep everything in process for tests and dry runs.

pub mod live;
pub mod memory;
