//! Capability traits over a stateful device-management library.
//!
//! A [`DeviceDriver`] hands out a [`DriverSession`] on initialization. The session is
//! the process-wide driver handle: devices are resolved through it, they borrow from
//! it, and it is released with [`DriverSession::shutdown`].

use std::error::Error;

/// Memory totals reported for one device, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
}

impl MemoryUsage {
    pub fn new(used: u64, total: u64) -> Self {
        Self { used, total }
    }

    /// `used / total * 100`, unclamped.
    pub fn used_percent(&self) -> f64 {
        self.used as f64 / self.total as f64 * 100.0
    }
}

/// Entry point of a device-management library.
pub trait DeviceDriver: Send {
    type Error: Error + Send + Sync + 'static;
    type Session: DriverSession<Error = Self::Error>;

    /// Acquire the driver handle.
    ///
    /// Whether this is safe after a previous session was not shut down cleanly depends
    /// on the underlying library; callers must not assume idempotence.
    fn init(&self) -> Result<Self::Session, Self::Error>;
}

/// An initialized driver handle.
pub trait DriverSession {
    type Error: Error + Send + Sync + 'static;
    type Device<'s>: GpuDevice<Error = Self::Error>
    where Self: 's;

    fn device_count(&self) -> Result<u32, Self::Error>;

    fn device_by_index(&self, index: u32) -> Result<Self::Device<'_>, Self::Error>;

    /// Release the handle.
    fn shutdown(self) -> Result<(), Self::Error>;
}

/// Queries available on one resolved device.
pub trait GpuDevice {
    type Error: Error + Send + Sync + 'static;

    /// Stable vendor identifier of the device.
    fn uuid(&self) -> Result<String, Self::Error>;

    fn memory_info(&self) -> Result<MemoryUsage, Self::Error>;

    /// Percent of time over the last sample period during which a kernel was running.
    fn utilization_rate(&self) -> Result<f64, Self::Error>;
}
