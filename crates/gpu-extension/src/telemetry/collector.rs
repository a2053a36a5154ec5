use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;
use tracing::warn;

use super::driver::DeviceDriver;
use super::driver::DriverSession;
use super::driver::GpuDevice;
use super::error::CollectionError;
use super::error::DeviceQuery;

/// Usage of one device in one sampling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUsageRecord {
    pub device_id: String,
    pub utilization_percent: f64,
    pub memory_usage_percent: f64,
}

/// Records of one sampling pass, in device enumeration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingBatch {
    records: Vec<DeviceUsageRecord>,
}

impl SamplingBatch {
    pub fn records(&self) -> &[DeviceUsageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceUsageRecord> {
        self.records.iter()
    }
}

impl IntoIterator for SamplingBatch {
    type IntoIter = std::vec::IntoIter<DeviceUsageRecord>;
    type Item = DeviceUsageRecord;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a SamplingBatch {
    type IntoIter = std::slice::Iter<'a, DeviceUsageRecord>;
    type Item = &'a DeviceUsageRecord;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Samples all visible devices with exclusive access to the driver.
///
/// The driver is initialized at the start of every pass and shut down before the pass
/// returns. Passes never overlap: the driver sits behind a mutex and a [`DriverLease`]
/// holds that mutex for as long as the session is alive.
pub struct DeviceMetricsCollector<D> {
    driver: Mutex<D>,
}

impl<D: DeviceDriver> DeviceMetricsCollector<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver: Mutex::new(driver),
        }
    }

    /// Lock the driver and acquire its handle.
    ///
    /// Blocks while another pass is in progress.
    pub fn initialize(&self) -> Result<DriverLease<'_, D>, CollectionError> {
        // a panicking pass has already released its session on unwind
        let driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        let session = driver.init().map_err(CollectionError::driver_init)?;
        debug!("Device driver initialized");
        Ok(DriverLease {
            _driver: driver,
            session,
        })
    }

    /// Run one complete pass: initialize, enumerate, sample every device, shut down.
    ///
    /// Shutdown is attempted exactly once whenever initialization succeeded. If the pass
    /// fails and shutdown fails as well, the pass error is returned and the shutdown
    /// error is logged.
    pub fn collect_all(&self) -> Result<SamplingBatch, CollectionError> {
        let lease = self.initialize()?;
        let sampled = lease.sample_all();
        let shutdown = lease.shutdown();

        match (sampled, shutdown) {
            (Ok(batch), Ok(())) => {
                debug!(devices = batch.len(), "Sampling pass completed");
                Ok(batch)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(shutdown_error)) => {
                warn!("Driver shutdown failed after aborted sampling pass: {shutdown_error}");
                Err(e)
            }
        }
    }
}

/// An initialized driver session together with exclusive access to the driver.
///
/// Fields drop in declaration order, so a lease dropped without [`DriverLease::shutdown`]
/// releases its session before the driver lock is handed to the next pass.
pub struct DriverLease<'a, D: DeviceDriver> {
    session: D::Session,
    _driver: MutexGuard<'a, D>,
}

impl<D: DeviceDriver> DriverLease<'_, D> {
    /// Number of devices currently visible.
    pub fn enumerate(&self) -> Result<u32, CollectionError> {
        self.session
            .device_count()
            .map_err(|e| CollectionError::enumeration(None, e))
    }

    /// Sample one device.
    pub fn sample(&self, index: u32) -> Result<DeviceUsageRecord, CollectionError> {
        let device = self
            .session
            .device_by_index(index)
            .map_err(|e| CollectionError::enumeration(Some(index), e))?;

        let device_id = device
            .uuid()
            .map_err(|e| CollectionError::device_query(index, DeviceQuery::Identifier, e))?;
        let memory = device
            .memory_info()
            .map_err(|e| CollectionError::device_query(index, DeviceQuery::MemoryInfo, e))?;
        let utilization = device
            .utilization_rate()
            .map_err(|e| CollectionError::device_query(index, DeviceQuery::Utilization, e))?;

        Ok(DeviceUsageRecord {
            device_id,
            utilization_percent: utilization,
            memory_usage_percent: memory.used_percent(),
        })
    }

    /// Sample every visible device in index order, stopping at the first failure.
    pub fn sample_all(&self) -> Result<SamplingBatch, CollectionError> {
        let count = self.enumerate()?;
        let records = (0..count)
            .map(|index| self.sample(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SamplingBatch { records })
    }

    /// Release the driver handle, then the driver lock.
    pub fn shutdown(self) -> Result<(), CollectionError> {
        let DriverLease { session, _driver } = self;
        session.shutdown().map_err(CollectionError::driver_shutdown)?;
        debug!("Device driver shut down");
        Ok(())
    }
}
