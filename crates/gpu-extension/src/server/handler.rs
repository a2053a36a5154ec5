use std::collections::BTreeMap;
use std::sync::Arc;

use api_types::ExtensionRequest;
use api_types::ExtensionResponse;
use api_types::PluginCall;
use api_types::TABLE_REGISTRY;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use uds_bidir_comm::RequestProcessor;

use crate::table::TablePlugin;

/// Routes host requests arriving on the extension socket.
pub(crate) struct PluginDispatcher {
    tables: BTreeMap<String, Arc<dyn TablePlugin>>,
    shutdown: CancellationToken,
}

impl PluginDispatcher {
    pub fn new(tables: BTreeMap<String, Arc<dyn TablePlugin>>, shutdown: CancellationToken) -> Self {
        Self { tables, shutdown }
    }

    fn dispatch(&self, call: PluginCall) -> ExtensionResponse {
        if call.registry != TABLE_REGISTRY {
            return ExtensionResponse::error(format!("unknown registry: {}", call.registry));
        }

        match self.tables.get(&call.item) {
            Some(table) => {
                debug!(table = %call.item, action = %call.request.action, "Dispatching table call");
                table.call(&call.request)
            }
            None => ExtensionResponse::error(format!("unknown table: {}", call.item)),
        }
    }
}

impl RequestProcessor<ExtensionRequest, ExtensionResponse> for PluginDispatcher {
    fn process(&self, request: ExtensionRequest) -> ExtensionResponse {
        match request {
            ExtensionRequest::Ping => ExtensionResponse::ok(Vec::new()),
            ExtensionRequest::Call(call) => self.dispatch(call),
            ExtensionRequest::Shutdown => {
                info!("Host requested shutdown");
                self.shutdown.cancel();
                ExtensionResponse::ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use api_types::ColumnDefinition;
    use api_types::PluginRequest;
    use api_types::QueryContext;
    use api_types::Row;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::table::GenerateError;

    struct Fixed;

    impl TablePlugin for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn columns(&self) -> Vec<ColumnDefinition> {
            vec![ColumnDefinition::text("value")]
        }

        fn generate(&self, _context: &QueryContext) -> Result<Vec<Row>, GenerateError> {
            Ok(vec![Row::from([("value".to_string(), "x".to_string())])])
        }
    }

    fn dispatcher() -> (PluginDispatcher, CancellationToken) {
        let token = CancellationToken::new();
        let mut tables: BTreeMap<String, Arc<dyn TablePlugin>> = BTreeMap::new();
        tables.insert("fixed".to_string(), Arc::new(Fixed));
        (PluginDispatcher::new(tables, token.clone()), token)
    }

    fn call(registry: &str, item: &str, request: PluginRequest) -> ExtensionRequest {
        ExtensionRequest::Call(PluginCall {
            registry: registry.to_string(),
            item: item.to_string(),
            request,
        })
    }

    #[test]
    fn ping_is_acknowledged() {
        let (dispatcher, token) = dispatcher();

        let response = dispatcher.process(ExtensionRequest::Ping);

        assert!(response.status.is_ok());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn table_calls_reach_the_plugin() {
        let (dispatcher, _token) = dispatcher();

        let response = dispatcher.process(call(TABLE_REGISTRY, "fixed", PluginRequest::generate("")));

        assert!(response.status.is_ok());
        assert_eq!(response.response.len(), 1);
        assert_eq!(response.response[0]["value"], "x");
    }

    #[test]
    fn unknown_targets_are_errors() {
        let (dispatcher, _token) = dispatcher();

        let unknown_table = dispatcher.process(call(TABLE_REGISTRY, "missing", PluginRequest::columns()));
        assert!(!unknown_table.status.is_ok());
        assert_eq!(unknown_table.status.message, "unknown table: missing");

        let unknown_registry = dispatcher.process(call("config", "fixed", PluginRequest::columns()));
        assert!(!unknown_registry.status.is_ok());
        assert_eq!(unknown_registry.status.message, "unknown registry: config");
    }

    #[test]
    fn shutdown_cancels_the_server() {
        let (dispatcher, token) = dispatcher();

        let response = dispatcher.process(ExtensionRequest::Shutdown);

        assert!(response.status.is_ok());
        assert!(token.is_cancelled());
    }
}
