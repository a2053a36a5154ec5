//! NVIDIA Management Library (NVML) backed driver

use std::ffi::OsStr;
use std::path::PathBuf;

use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Device;
use nvml_wrapper::Nvml;

use super::driver::DeviceDriver;
use super::driver::DriverSession;
use super::driver::GpuDevice;
use super::driver::MemoryUsage;

/// Library name tried when the default lookup fails.
const FALLBACK_LIB_PATH: &str = "libnvidia-ml.so.1";

/// Loads NVML on every [`DeviceDriver::init`].
#[derive(Debug, Clone, Default)]
pub struct NvmlDriver {
    lib_path: Option<PathBuf>,
}

impl NvmlDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always load NVML from `lib_path` instead of the default lookup.
    pub fn with_lib_path(lib_path: impl Into<PathBuf>) -> Self {
        Self {
            lib_path: Some(lib_path.into()),
        }
    }
}

impl DeviceDriver for NvmlDriver {
    type Error = NvmlError;
    type Session = Nvml;

    fn init(&self) -> Result<Nvml, NvmlError> {
        if let Some(lib_path) = &self.lib_path {
            return Nvml::builder().lib_path(lib_path.as_os_str()).init();
        }

        match Nvml::init() {
            Ok(nvml) => Ok(nvml),
            Err(e) => {
                tracing::debug!("Standard NVML init failed ({e}), trying {FALLBACK_LIB_PATH}");
                Nvml::builder()
                    .lib_path(OsStr::new(FALLBACK_LIB_PATH))
                    .init()
            }
        }
    }
}

impl DriverSession for Nvml {
    type Error = NvmlError;
    type Device<'s> = Device<'s>
    where Self: 's;

    fn device_count(&self) -> Result<u32, NvmlError> {
        Nvml::device_count(self)
    }

    fn device_by_index(&self, index: u32) -> Result<Device<'_>, NvmlError> {
        Nvml::device_by_index(self, index)
    }

    fn shutdown(self) -> Result<(), NvmlError> {
        Nvml::shutdown(self)
    }
}

impl GpuDevice for Device<'_> {
    type Error = NvmlError;

    fn uuid(&self) -> Result<String, NvmlError> {
        Device::uuid(self)
    }

    fn memory_info(&self) -> Result<MemoryUsage, NvmlError> {
        let info = Device::memory_info(self)?;
        Ok(MemoryUsage::new(info.used, info.total))
    }

    fn utilization_rate(&self) -> Result<f64, NvmlError> {
        Ok(f64::from(Device::utilization_rates(self)?.gpu))
    }
}
