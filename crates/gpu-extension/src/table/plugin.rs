use std::error::Error;

use api_types::ColumnDefinition;
use api_types::ExtensionResponse;
use api_types::PluginRequest;
use api_types::PluginResponse;
use api_types::QueryContext;
use api_types::Row;
use tracing::debug;
use tracing::warn;

/// Error returned by [`TablePlugin::generate`].
pub type GenerateError = Box<dyn Error + Send + Sync + 'static>;

/// A table the host can query.
///
/// Implementations are called from the blocking thread pool and may block.
pub trait TablePlugin: Send + Sync {
    /// Name the table is registered under.
    fn name(&self) -> &str;

    /// Ordered column schema. Must not change between calls.
    fn columns(&self) -> Vec<ColumnDefinition>;

    /// Produce the rows for one query.
    fn generate(&self, context: &QueryContext) -> Result<Vec<Row>, GenerateError>;

    /// Column definitions in the host's route format.
    fn routes(&self) -> PluginResponse {
        self.columns()
            .into_iter()
            .map(|column| {
                Row::from([
                    ("id".to_string(), "column".to_string()),
                    ("name".to_string(), column.name),
                    ("type".to_string(), column.column_type.to_string()),
                    ("op".to_string(), "0".to_string()),
                ])
            })
            .collect()
    }

    /// Answer a host call routed to this table.
    ///
    /// Failures become an error status without rows.
    fn call(&self, request: &PluginRequest) -> ExtensionResponse {
        match request.action.as_str() {
            "columns" => ExtensionResponse::ok(self.routes()),
            "generate" => {
                let raw_context = request.context.as_deref().unwrap_or_default();
                let context = match QueryContext::parse(raw_context) {
                    Ok(context) => context,
                    Err(e) => {
                        warn!(table = self.name(), "Rejecting malformed query context: {e}");
                        return ExtensionResponse::error(format!("invalid query context: {e}"));
                    }
                };

                match self.generate(&context) {
                    Ok(rows) => {
                        debug!(table = self.name(), rows = rows.len(), "Rows generated");
                        ExtensionResponse::ok(rows)
                    }
                    Err(e) => {
                        warn!(table = self.name(), "Row generation failed: {e}");
                        ExtensionResponse::error(e.to_string())
                    }
                }
            }
            action => ExtensionResponse::error(format!(
                "table {} does not support action {action:?}",
                self.name()
            )),
        }
    }
}
