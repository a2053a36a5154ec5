//! Client side of the host manager socket.

use std::path::Path;
use std::time::Duration;

use api_types::ExtensionInfo;
use api_types::ExtensionRegistry;
use api_types::ExtensionStatus;
use api_types::ExtensionUuid;
use api_types::ManagerRequest;
use api_types::ManagerResponse;
use error_stack::Report;
use error_stack::ResultExt;
use tokio::time::Instant;
use tracing::debug;
use uds_bidir_comm::ClientConfig;
use uds_bidir_comm::CommError;
use uds_bidir_comm::CommResult;
use uds_bidir_comm::UdsClient;

/// Pause between attempts to reach a manager socket that is not up yet.
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub(crate) struct ManagerClient {
    client: UdsClient<ManagerRequest, ManagerResponse>,
}

impl ManagerClient {
    /// Connect to the manager socket, retrying until `deadline`.
    ///
    /// Every later request is bounded by `timeout`.
    pub async fn connect(
        socket: &Path,
        client_id: &str,
        timeout: Duration,
        deadline: Instant,
    ) -> CommResult<Self> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let config = ClientConfig::new(socket)
                .with_client_id(client_id)
                .with_connect_timeout(remaining)
                .with_request_timeout(timeout);

            match UdsClient::connect(config).await {
                Ok(client) => return Ok(Self { client }),
                Err(e) if Instant::now() + CONNECT_RETRY_DELAY < deadline => {
                    debug!(attempts, "Manager socket not reachable yet: {}", e.current_context());
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(e).attach_printable(format!(
                        "gave up on {} after {attempts} attempts",
                        socket.display()
                    ));
                }
            }
        }
    }

    /// Register with the host; the answer must arrive before `deadline`.
    pub async fn register(
        &mut self,
        info: ExtensionInfo,
        registry: ExtensionRegistry,
        deadline: Instant,
    ) -> CommResult<ExtensionStatus> {
        let budget = deadline.saturating_duration_since(Instant::now());
        let request = ManagerRequest::RegisterExtension { info, registry };
        tokio::time::timeout_at(deadline, self.request(request))
            .await
            .map_err(|_| {
                Report::new(CommError::Timeout {
                    millis: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                })
                .attach_printable("registration deadline passed")
            })?
    }

    pub async fn ping(&mut self) -> CommResult<ExtensionStatus> {
        self.request(ManagerRequest::Ping).await
    }

    pub async fn deregister(&mut self, uuid: ExtensionUuid) -> CommResult<ExtensionStatus> {
        self.request(ManagerRequest::DeregisterExtension { uuid })
            .await
    }

    async fn request(&mut self, request: ManagerRequest) -> CommResult<ExtensionStatus> {
        let response = self.client.call(&request).await?;
        Ok(response.status)
    }
}
