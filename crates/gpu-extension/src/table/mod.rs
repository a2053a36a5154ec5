//! Table plugins served to the host

mod gpu_usage;
mod plugin;

pub use gpu_usage::column_schema;
pub use gpu_usage::usage_row;
pub use gpu_usage::GpuUsageTable;
pub use gpu_usage::DEVICE_ID;
pub use gpu_usage::GPU_MEMORY_USAGE;
pub use gpu_usage::GPU_UTILIZATION;
pub use gpu_usage::TABLE_NAME;
pub use plugin::GenerateError;
pub use plugin::TablePlugin;
