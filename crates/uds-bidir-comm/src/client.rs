//! Unix socket request/response client.

use core::fmt::Debug;
use core::marker::PhantomData;
use std::time::Duration;

use error_stack::bail;
use error_stack::Report;
use error_stack::ResultExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;
use tracing::trace;

use crate::codec;
use crate::codec::JsonLines;
use crate::error::CommError;
use crate::error::CommResult;
use crate::ClientConfig;

/// Client holding one connection; exchanges are strictly request then response.
pub struct UdsClient<Req, Resp> {
    config: ClientConfig,
    lines: JsonLines,
    /// set once an exchange failed midway and the stream can no longer be trusted
    broken: bool,
    _phantom: PhantomData<(Req, Resp)>,
}

impl<Req, Resp> UdsClient<Req, Resp>
where
    Req: Serialize + Debug,
    Resp: DeserializeOwned + Debug,
{
    /// connect to the configured socket
    pub async fn connect(config: ClientConfig) -> CommResult<Self> {
        let path = config.socket_path.display().to_string();
        let connect = UnixStream::connect(&config.socket_path);
        let stream = match timeout(config.connect_timeout, connect).await {
            Ok(stream) => stream.change_context(CommError::Network {
                message: format!("Failed to connect to {path}"),
            })?,
            Err(_) => bail!(CommError::Timeout {
                millis: millis(config.connect_timeout),
            }),
        };

        debug!(socket = %path, client_id = %config.client_id, "Unix socket client connected");

        let lines = codec::framed(stream, config.max_frame_length);
        Ok(Self {
            config,
            lines,
            broken: false,
            _phantom: PhantomData,
        })
    }

    /// Send a request and wait for its response within the request timeout.
    ///
    /// Any failure leaves the client unusable; later calls return
    /// [`CommError::NotConnected`].
    pub async fn call(&mut self, request: &Req) -> CommResult<Resp> {
        if self.broken {
            bail!(CommError::NotConnected);
        }

        trace!(client_id = %self.config.client_id, ?request, "Sending request");
        let request_timeout = self.config.request_timeout;
        let result = match timeout(request_timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(Report::new(CommError::Timeout {
                millis: millis(request_timeout),
            })),
        };

        if result.is_err() {
            self.broken = true;
        }
        result
    }

    async fn exchange(&mut self, request: &Req) -> CommResult<Resp> {
        codec::send_json(&mut self.lines, request).await?;
        codec::recv_json(&mut self.lines)
            .await?
            .ok_or_else(|| Report::new(CommError::Closed))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
