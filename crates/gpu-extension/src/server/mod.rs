//! Extension lifecycle: registration, heartbeat and request serving
//!
//! An [`ExtensionServer`] registers its table plugins with the host's manager socket,
//! then serves host calls on its own socket while a heartbeat loop pings the host.
//! Progress is published as [`ServerState`] on a watch channel:
//!
//! ```text
//! Unregistered -> Registering -> Serving { uuid } -> Terminated
//!                      \-> Failed
//! ```

mod error;
mod handler;
mod heartbeat;
mod manager;
mod state;

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use api_types::ExtensionInfo;
use api_types::ExtensionRegistry;
use api_types::ExtensionRequest;
use api_types::ExtensionResponse;
use api_types::ExtensionUuid;
use api_types::TABLE_REGISTRY;
use error_stack::Report;
use error_stack::ResultExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;
use uds_bidir_comm::UdsServer;

pub use self::error::ExtensionError;
pub use self::error::ExtensionResult;
use self::handler::PluginDispatcher;
use self::manager::ManagerClient;
pub use self::state::ServerState;
use crate::table::TablePlugin;

/// Version of the request/response protocol this extension speaks.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// name declared to the host
    pub name: String,
    /// version declared to the host
    pub version: String,
    /// host manager socket
    pub socket_path: PathBuf,
    /// bound on connecting, registering and every heartbeat ack
    pub timeout: Duration,
    pub ping_interval: Duration,
}

/// Socket the extension serves on once the host assigned `uuid`.
pub fn extension_socket_path(manager_socket: &Path, uuid: ExtensionUuid) -> PathBuf {
    let mut path = manager_socket.as_os_str().to_owned();
    path.push(format!(".{uuid}"));
    PathBuf::from(path)
}

pub struct ExtensionServer {
    options: ServerOptions,
    tables: BTreeMap<String, Arc<dyn TablePlugin>>,
    state: watch::Sender<ServerState>,
    token: CancellationToken,
}

impl ExtensionServer {
    pub fn new(options: ServerOptions) -> Self {
        let (state, _) = watch::channel(ServerState::Unregistered);
        Self {
            options,
            tables: BTreeMap::new(),
            state,
            token: CancellationToken::new(),
        }
    }

    /// Add a table to declare at registration. A table with the same name is replaced.
    pub fn register_plugin<P>(&mut self, plugin: P)
    where P: TablePlugin + 'static
    {
        let name = plugin.name().to_string();
        if self.tables.insert(name.clone(), Arc::new(plugin)).is_some() {
            warn!(table = %name, "Replacing previously registered table");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Token that stops a running server gracefully when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Register, then serve until the host asks to shut down, the token is cancelled or
    /// the heartbeat fails.
    ///
    /// Returns `Ok` only for a graceful shutdown.
    pub async fn run(self) -> ExtensionResult<()> {
        self.state.send_replace(ServerState::Registering);
        let (mut manager, uuid) = match self.register().await {
            Ok(registered) => registered,
            Err(report) => {
                self.state.send_replace(ServerState::Failed {
                    reason: format!("{report:#}"),
                });
                return Err(report);
            }
        };

        let socket = extension_socket_path(&self.options.socket_path, uuid);
        let server = match UdsServer::<ExtensionRequest, ExtensionResponse>::bind(&socket) {
            Ok(server) => server,
            Err(e) => {
                let report = e
                    .change_context(ExtensionError::Listener)
                    .attach_printable(format!("extension socket {}", socket.display()));
                if let Err(e) = deregister(&mut manager, uuid).await {
                    warn!("Deregistration after failed bind failed: {e:?}");
                }
                self.terminate(&format!("{report:#}"));
                return Err(report);
            }
        };

        self.state.send_replace(ServerState::Serving { uuid });
        info!(uuid, socket = %server.path().display(), "Extension registered and serving");

        let dispatcher = Arc::new(PluginDispatcher::new(self.tables.clone(), self.token.clone()));
        let serving = async {
            let served = server
                .serve(dispatcher, self.token.clone())
                .await
                .change_context(ExtensionError::Listener);
            self.token.cancel();
            served
        };
        let heartbeat = async {
            let beat = heartbeat::run(&mut manager, self.options.ping_interval, &self.token).await;
            self.token.cancel();
            beat
        };
        let (served, beat) = tokio::join!(serving, heartbeat);

        if let Err(report) = beat.and(served) {
            self.terminate(&format!("{report:#}"));
            return Err(report);
        }

        if let Err(report) = deregister(&mut manager, uuid).await {
            warn!("Deregistration failed: {report:?}");
        }
        self.terminate("shutdown");
        info!(uuid, "Extension stopped");
        Ok(())
    }

    async fn register(&self) -> ExtensionResult<(ManagerClient, ExtensionUuid)> {
        let options = &self.options;
        // connecting and registering share one budget
        let deadline = Instant::now() + options.timeout;
        let mut manager =
            ManagerClient::connect(&options.socket_path, &options.name, options.timeout, deadline)
                .await
                .change_context(ExtensionError::Registration)?;

        let status = manager
            .register(self.info(), self.registry(), deadline)
            .await
            .change_context(ExtensionError::Registration)?;

        if !status.is_ok() {
            return Err(Report::new(ExtensionError::Registration).attach_printable(format!(
                "host refused registration with status {}: {}",
                status.code, status.message
            )));
        }

        info!(
            uuid = status.uuid,
            name = %options.name,
            tables = self.tables.len(),
            "Registered with host"
        );
        Ok((manager, status.uuid))
    }

    fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            name: self.options.name.clone(),
            version: self.options.version.clone(),
            sdk_version: SDK_VERSION.to_string(),
            min_sdk_version: SDK_VERSION.to_string(),
        }
    }

    fn registry(&self) -> ExtensionRegistry {
        let tables = self
            .tables
            .iter()
            .map(|(name, table)| (name.clone(), table.routes()))
            .collect();
        ExtensionRegistry::from([(TABLE_REGISTRY.to_string(), tables)])
    }

    fn terminate(&self, reason: &str) {
        self.state.send_replace(ServerState::Terminated {
            reason: reason.to_string(),
        });
    }
}

async fn deregister(manager: &mut ManagerClient, uuid: ExtensionUuid) -> ExtensionResult<()> {
    let status = manager
        .deregister(uuid)
        .await
        .change_context(ExtensionError::Shutdown)?;
    if !status.is_ok() {
        return Err(Report::new(ExtensionError::Shutdown).attach_printable(format!(
            "host refused deregistration with status {}: {}",
            status.code, status.message
        )));
    }
    Ok(())
}
