//! Unix socket server dispatching requests to a [`RequestProcessor`].

use std::fmt::Debug;
use std::io;
use std::marker::PhantomData;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use error_stack::bail;
use error_stack::ResultExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use crate::codec;
use crate::codec::JsonLines;
use crate::config::ServerConfig;
use crate::error::CommError;
use crate::error::CommResult;
use crate::types::RequestProcessor;

/// Removes the socket file when the server goes away.
#[derive(Debug)]
struct SocketFile(PathBuf);

impl Drop for SocketFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!(socket = %self.0.display(), "Socket file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(socket = %self.0.display(), "Failed to remove socket file: {e}"),
        }
    }
}

/// Server accepting connections on a Unix socket.
///
/// Each connection is served by its own task; requests on one connection are
/// processed one at a time, in arrival order.
pub struct UdsServer<Req, Resp> {
    config: ServerConfig,
    listener: UnixListener,
    socket: SocketFile,
    _phantom: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> UdsServer<Req, Resp>
where
    Req: DeserializeOwned + Debug + Send + 'static,
    Resp: Serialize + Debug + Send + Sync + 'static,
{
    /// Bind a server with default configuration. Must be called within a tokio runtime.
    pub fn bind(path: impl Into<PathBuf>) -> CommResult<Self> {
        Self::bind_with_config(path, ServerConfig::default())
    }

    /// Bind a server with custom configuration. Must be called within a tokio runtime.
    pub fn bind_with_config(path: impl Into<PathBuf>, config: ServerConfig) -> CommResult<Self> {
        let path = path.into();
        if config.remove_stale_socket {
            remove_stale_socket(&path)?;
        }

        let listener = UnixListener::bind(&path).change_context(CommError::Network {
            message: format!("Failed to bind {}", path.display()),
        })?;

        info!(socket = %path.display(), "Unix socket server listening");

        Ok(Self {
            config,
            listener,
            socket: SocketFile(path),
            _phantom: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.socket.0
    }

    /// Accept and serve connections until `token` is cancelled.
    ///
    /// Open connections stop after their in-flight request has been answered, and the
    /// socket file is removed before this returns.
    #[instrument(skip_all, fields(socket = %self.socket.0.display()))]
    pub async fn serve<P>(self, processor: Arc<P>, token: CancellationToken) -> CommResult<()>
    where P: RequestProcessor<Req, Resp> + Send + Sync + 'static
    {
        // connection tasks follow the caller's token but can be stopped on their own
        let token = token.child_token();
        let mut connections = JoinSet::new();

        let result = loop {
            tokio::select! {
                _ = token.cancelled() => break Ok(()),
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Connection task failed: {e}");
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        debug!("Accepted connection");
                        let lines = codec::framed(stream, self.config.max_frame_length);
                        connections.spawn(handle_connection(lines, processor.clone(), token.clone()));
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {e}");
                        break Err(e);
                    }
                }
            }
        };

        drop(self.listener);
        token.cancel();
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                warn!("Connection task failed during shutdown: {e}");
            }
        }
        drop(self.socket);
        info!("Unix socket server stopped");

        result.change_context(CommError::Network {
            message: "Failed to accept connection".into(),
        })
    }
}

async fn handle_connection<Req, Resp, P>(
    mut lines: JsonLines,
    processor: Arc<P>,
    token: CancellationToken,
) where
    Req: DeserializeOwned + Debug + Send + 'static,
    Resp: Serialize + Debug + Send + Sync + 'static,
    P: RequestProcessor<Req, Resp> + Send + Sync + 'static,
{
    loop {
        let received = tokio::select! {
            _ = token.cancelled() => break,
            received = codec::recv_json::<Req>(&mut lines) => received,
        };

        let request = match received {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("Peer closed connection");
                break;
            }
            Err(e) => {
                warn!("Dropping connection: {e:?}");
                break;
            }
        };

        trace!(?request, "Processing request");
        let worker = processor.clone();
        let response = match tokio::task::spawn_blocking(move || worker.process(request)).await {
            Ok(response) => response,
            Err(e) => {
                error!("Request processor failed: {e}");
                break;
            }
        };

        if let Err(e) = codec::send_json(&mut lines, &response).await {
            warn!("Failed to send response: {e:?}");
            break;
        }
    }
}

fn remove_stale_socket(path: &Path) -> CommResult<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() => {
            debug!(socket = %path.display(), "Removing stale socket file");
            std::fs::remove_file(path).change_context(CommError::Network {
                message: format!("Failed to remove stale socket {}", path.display()),
            })
        }
        Ok(_) => bail!(CommError::Configuration {
            message: format!("{} exists and is not a socket", path.display()),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).change_context(CommError::Network {
            message: format!("Failed to inspect {}", path.display()),
        }),
    }
}
