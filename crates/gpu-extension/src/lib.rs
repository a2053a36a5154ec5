//! GPU telemetry extension
//!
//! Serves per-device GPU utilization and memory usage as the `gpu_usage` table of a
//! host query engine. The crate is split into:
//! - [`telemetry`]: driver capability traits, the NVML and simulated drivers, and the
//!   collector running complete sampling passes
//! - [`table`]: the table plugin trait and the `gpu_usage` table
//! - [`server`]: registration with the host, heartbeat and request serving
//! - [`config`] and [`logging`]: command line and tracing setup for the binary

pub mod config;
pub mod logging;
pub mod server;
pub mod table;
pub mod telemetry;
