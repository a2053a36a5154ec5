//! client and server config

use std::path::PathBuf;
use std::time::Duration;

/// Default upper bound for a single JSON line.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Unix socket client config.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// path of the socket to connect to
    pub socket_path: PathBuf,
    /// client id, only used for logging
    pub client_id: String,
    /// time allowed to establish the connection
    pub connect_timeout: Duration,
    /// time allowed for one request/response exchange
    pub request_timeout: Duration,
    /// max accepted line length
    pub max_frame_length: usize,
}

impl ClientConfig {
    /// create new client config with default parameters.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            client_id: format!("client_{}", std::process::id()),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(3),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// set client id.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Unix socket server config.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// max accepted line length
    pub max_frame_length: usize,
    /// replace a leftover socket file at the bind path
    pub remove_stale_socket: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            remove_stale_socket: true,
        }
    }
}
