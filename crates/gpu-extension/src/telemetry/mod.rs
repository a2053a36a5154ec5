//! GPU telemetry collection
//!
//! This module samples per-device utilization and memory usage through a driver
//! capability interface:
//! - [`driver`] defines the capability traits a device-management library must provide
//! - [`nvml`] implements them on top of NVIDIA's NVML
//! - [`mock`] implements them with simulated devices
//! - [`DeviceMetricsCollector`] runs complete sampling passes with exclusive driver access

mod collector;
pub mod driver;
mod error;
pub mod mock;
pub mod nvml;

pub use collector::DeviceMetricsCollector;
pub use collector::DeviceUsageRecord;
pub use collector::DriverLease;
pub use collector::SamplingBatch;
pub use error::CollectionError;
pub use error::DeviceQuery;
