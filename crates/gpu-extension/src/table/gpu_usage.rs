//! The `gpu_usage` table: one row per visible device, sampled on every query.

use std::sync::Arc;

use api_types::ColumnDefinition;
use api_types::QueryContext;
use api_types::Row;

use super::plugin::GenerateError;
use super::plugin::TablePlugin;
use crate::telemetry::driver::DeviceDriver;
use crate::telemetry::DeviceMetricsCollector;
use crate::telemetry::DeviceUsageRecord;

pub const TABLE_NAME: &str = "gpu_usage";

pub const DEVICE_ID: &str = "device_id";
pub const GPU_UTILIZATION: &str = "gpu_utilization";
pub const GPU_MEMORY_USAGE: &str = "gpu_memory_usage";

/// Column schema of the table, in declaration order.
pub fn column_schema() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::text(DEVICE_ID),
        ColumnDefinition::double(GPU_UTILIZATION),
        ColumnDefinition::double(GPU_MEMORY_USAGE),
    ]
}

/// Host row for one record; percentages carry exactly two fractional digits.
pub fn usage_row(record: &DeviceUsageRecord) -> Row {
    Row::from([
        (DEVICE_ID.to_string(), record.device_id.clone()),
        (
            GPU_UTILIZATION.to_string(),
            format!("{:.2}", record.utilization_percent),
        ),
        (
            GPU_MEMORY_USAGE.to_string(),
            format!("{:.2}", record.memory_usage_percent),
        ),
    ])
}

/// Serves device usage straight from the collector. Constraints are ignored and
/// every query runs a full sampling pass.
pub struct GpuUsageTable<D> {
    collector: Arc<DeviceMetricsCollector<D>>,
}

impl<D: DeviceDriver> GpuUsageTable<D> {
    pub fn new(collector: Arc<DeviceMetricsCollector<D>>) -> Self {
        Self { collector }
    }
}

impl<D> TablePlugin for GpuUsageTable<D>
where D: DeviceDriver + 'static
{
    fn name(&self) -> &str {
        TABLE_NAME
    }

    fn columns(&self) -> Vec<ColumnDefinition> {
        column_schema()
    }

    fn generate(&self, _context: &QueryContext) -> Result<Vec<Row>, GenerateError> {
        let batch = self.collector.collect_all()?;
        Ok(batch.iter().map(usage_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use api_types::ColumnType;
    use api_types::PluginRequest;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::telemetry::mock::FailurePoint;
    use crate::telemetry::mock::SimulatedDevice;
    use crate::telemetry::mock::SimulatedDriver;

    fn table_with(driver: &SimulatedDriver) -> GpuUsageTable<SimulatedDriver> {
        GpuUsageTable::new(Arc::new(DeviceMetricsCollector::new(driver.clone())))
    }

    fn row(id: &str, utilization: &str, memory: &str) -> Row {
        Row::from([
            (DEVICE_ID.to_string(), id.to_string()),
            (GPU_UTILIZATION.to_string(), utilization.to_string()),
            (GPU_MEMORY_USAGE.to_string(), memory.to_string()),
        ])
    }

    #[test]
    fn schema_is_fixed() {
        let table = table_with(&SimulatedDriver::new(Vec::new()));

        let schema: Vec<_> = table
            .columns()
            .into_iter()
            .map(|c| (c.name, c.column_type))
            .collect();

        assert_eq!(
            schema,
            vec![
                (DEVICE_ID.to_string(), ColumnType::Text),
                (GPU_UTILIZATION.to_string(), ColumnType::Double),
                (GPU_MEMORY_USAGE.to_string(), ColumnType::Double),
            ]
        );
        assert_eq!(table.columns(), table.columns());
    }

    #[test]
    fn rows_follow_device_order_with_two_decimals() {
        let driver = SimulatedDriver::new(vec![
            SimulatedDevice::new("GPU-A", 57.3, 4_000_000_000, 8_000_000_000),
            SimulatedDevice::new("GPU-B", 0.0, 0, 16_000_000_000),
        ]);

        let rows = table_with(&driver)
            .generate(&QueryContext::default())
            .expect("generate");

        assert_eq!(
            rows,
            vec![row("GPU-A", "57.30", "50.00"), row("GPU-B", "0.00", "0.00")]
        );
    }

    #[test]
    fn zero_total_memory_is_rendered_unclamped() {
        let record = DeviceUsageRecord {
            device_id: "GPU-Z".to_string(),
            utilization_percent: 33.333,
            memory_usage_percent: f64::NAN,
        };

        assert_eq!(usage_row(&record), row("GPU-Z", "33.33", "NaN"));
    }

    #[test]
    fn every_query_samples_again() {
        let driver = SimulatedDriver::new(vec![SimulatedDevice::new("GPU-A", 10.0, 1, 4)]);
        let table = table_with(&driver);

        table.generate(&QueryContext::default()).expect("first");
        driver.set_devices(vec![SimulatedDevice::new("GPU-A", 90.0, 3, 4)]);
        let rows = table.generate(&QueryContext::default()).expect("second");

        assert_eq!(rows, vec![row("GPU-A", "90.00", "75.00")]);
        assert_eq!(driver.counters().inits(), 2);
    }

    #[test]
    fn collection_failure_becomes_error_status() {
        let driver = SimulatedDriver::new(vec![
            SimulatedDevice::new("GPU-A", 1.0, 1, 2),
            SimulatedDevice::new("GPU-B", 1.0, 1, 2),
        ]);
        driver.fail_at(FailurePoint::MemoryInfo(1));
        let table = table_with(&driver);

        let response = table.call(&PluginRequest::generate(""));

        assert!(!response.status.is_ok());
        assert!(response.response.is_empty());
        assert_eq!(
            response.status.message,
            "unable to query memory info of device at index 1: simulated driver failure at MemoryInfo(1)"
        );

        driver.clear_failure();
        let response = table.call(&PluginRequest::generate(""));
        assert!(response.status.is_ok());
        assert_eq!(response.response.len(), 2);
    }
}
