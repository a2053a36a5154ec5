//! Simulated driver
//!
//! Stands in for a real device-management library in tests and on machines without
//! accelerators. Devices, failures and query latency are configurable, and counters
//! record how sessions were opened and released.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use thiserror::Error;

use super::driver::DeviceDriver;
use super::driver::DriverSession;
use super::driver::GpuDevice;
use super::driver::MemoryUsage;

/// A device as the simulated driver reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedDevice {
    pub uuid: String,
    pub utilization: f64,
    pub memory: MemoryUsage,
}

impl SimulatedDevice {
    pub fn new(uuid: impl Into<String>, utilization: f64, used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            uuid: uuid.into(),
            utilization,
            memory: MemoryUsage::new(used_bytes, total_bytes),
        }
    }
}

/// Driver call that should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Init,
    DeviceCount,
    DeviceHandle(u32),
    Identifier(u32),
    MemoryInfo(u32),
    Utilization(u32),
    Shutdown,
}

#[derive(Debug, Clone, Error)]
#[error("simulated driver failure at {0:?}")]
pub struct SimulatedError(pub FailurePoint);

/// Session bookkeeping shared by a driver and all of its clones.
#[derive(Debug, Default)]
pub struct DriverCounters {
    inits: AtomicUsize,
    shutdowns: AtomicUsize,
    open: AtomicUsize,
    overlapping: AtomicUsize,
}

impl DriverCounters {
    /// Successful initializations.
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// Shutdown attempts, successful or not.
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Sessions neither shut down nor dropped yet.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Initializations that happened while another session was still open.
    pub fn overlapping_inits(&self) -> usize {
        self.overlapping.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    devices: Arc<Mutex<Vec<SimulatedDevice>>>,
    failure: Arc<Mutex<Option<FailurePoint>>>,
    latency: Duration,
    release_latency: Duration,
    counters: Arc<DriverCounters>,
}

impl SimulatedDriver {
    pub fn new(devices: Vec<SimulatedDevice>) -> Self {
        Self {
            devices: Arc::new(Mutex::new(devices)),
            ..Default::default()
        }
    }

    /// Sleep for `latency` before answering every device query.
    pub fn with_query_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sleep for `latency` when a session is dropped without shutdown.
    pub fn with_release_latency(mut self, latency: Duration) -> Self {
        self.release_latency = latency;
        self
    }

    /// Replace the visible devices; applies from the next session on.
    pub fn set_devices(&self, devices: Vec<SimulatedDevice>) {
        *self.devices.lock().unwrap_or_else(PoisonError::into_inner) = devices;
    }

    /// Make one driver call fail; applies from the next initialization on.
    pub fn fail_at(&self, point: FailurePoint) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(point);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn counters(&self) -> &DriverCounters {
        &self.counters
    }
}

impl DeviceDriver for SimulatedDriver {
    type Error = SimulatedError;
    type Session = SimulatedSession;

    fn init(&self) -> Result<SimulatedSession, SimulatedError> {
        let failure = *self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure == Some(FailurePoint::Init) {
            return Err(SimulatedError(FailurePoint::Init));
        }

        if self.counters.open.fetch_add(1, Ordering::SeqCst) > 0 {
            self.counters.overlapping.fetch_add(1, Ordering::SeqCst);
        }
        self.counters.inits.fetch_add(1, Ordering::SeqCst);

        Ok(SimulatedSession {
            devices: self
                .devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            failure,
            latency: self.latency,
            release_latency: self.release_latency,
            counters: self.counters.clone(),
            released: false,
        })
    }
}

/// Handle returned by [`SimulatedDriver`]; dropping it without shutdown releases it too.
#[derive(Debug)]
pub struct SimulatedSession {
    devices: Vec<SimulatedDevice>,
    failure: Option<FailurePoint>,
    latency: Duration,
    release_latency: Duration,
    counters: Arc<DriverCounters>,
    released: bool,
}

impl SimulatedSession {
    fn check(&self, point: FailurePoint) -> Result<(), SimulatedError> {
        if self.failure == Some(point) {
            Err(SimulatedError(point))
        } else {
            Ok(())
        }
    }

    fn query(&self, point: FailurePoint) -> Result<(), SimulatedError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.check(point)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl DriverSession for SimulatedSession {
    type Error = SimulatedError;
    type Device<'s> = SimulatedDeviceHandle<'s>
    where Self: 's;

    fn device_count(&self) -> Result<u32, SimulatedError> {
        self.check(FailurePoint::DeviceCount)?;
        Ok(u32::try_from(self.devices.len()).unwrap_or(u32::MAX))
    }

    fn device_by_index(&self, index: u32) -> Result<SimulatedDeviceHandle<'_>, SimulatedError> {
        self.check(FailurePoint::DeviceHandle(index))?;
        let device = usize::try_from(index)
            .ok()
            .and_then(|i| self.devices.get(i))
            .ok_or(SimulatedError(FailurePoint::DeviceHandle(index)))?;
        Ok(SimulatedDeviceHandle {
            session: self,
            device,
            index,
        })
    }

    fn shutdown(mut self) -> Result<(), SimulatedError> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.release();
        self.check(FailurePoint::Shutdown)
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        if !self.released && !self.release_latency.is_zero() {
            std::thread::sleep(self.release_latency);
        }
        self.release();
    }
}

pub struct SimulatedDeviceHandle<'s> {
    session: &'s SimulatedSession,
    device: &'s SimulatedDevice,
    index: u32,
}

impl GpuDevice for SimulatedDeviceHandle<'_> {
    type Error = SimulatedError;

    fn uuid(&self) -> Result<String, SimulatedError> {
        self.session.query(FailurePoint::Identifier(self.index))?;
        Ok(self.device.uuid.clone())
    }

    fn memory_info(&self) -> Result<MemoryUsage, SimulatedError> {
        self.session.query(FailurePoint::MemoryInfo(self.index))?;
        Ok(self.device.memory)
    }

    fn utilization_rate(&self) -> Result<f64, SimulatedError> {
        self.session.query(FailurePoint::Utilization(self.index))?;
        Ok(self.device.utilization)
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn dropped_session_is_released() {
        let driver = SimulatedDriver::new(vec![SimulatedDevice::new("GPU-0", 1.0, 1, 2)]);

        let session = driver.init().expect("init");
        assert_eq!(driver.counters().open_sessions(), 1);
        drop(session);

        assert_eq!(driver.counters().open_sessions(), 0);
        assert_eq!(driver.counters().shutdowns(), 0);
    }

    #[test]
    fn out_of_range_index_fails_handle_resolution() {
        let driver = SimulatedDriver::new(vec![SimulatedDevice::new("GPU-0", 1.0, 1, 2)]);
        let session = driver.init().expect("init");

        let err = session.device_by_index(1).err().expect("no device at index 1");
        assert_eq!(err.0, FailurePoint::DeviceHandle(1));
    }

    #[test]
    fn failure_applies_from_next_session() {
        let driver = SimulatedDriver::new(vec![SimulatedDevice::new("GPU-0", 1.0, 1, 2)]);
        let session = driver.init().expect("init");
        driver.fail_at(FailurePoint::DeviceCount);

        assert_eq!(session.device_count().expect("count"), 1);
        session.shutdown().expect("shutdown");

        let session = driver.init().expect("init");
        assert!(session.device_count().is_err());
    }
}
