//! Unix-socket based bidirectional communication library.
//!
//! This library provides a small request/response transport over Unix domain sockets.
//! Each message is a single JSON document terminated by a newline, and every connection
//! carries a strict request → response alternation:
//!
//! - Clients connect to a socket path and issue calls with a per-call timeout
//! - Servers accept connections and hand each request to a [`RequestProcessor`]
//! - Servers stop on a [`tokio_util::sync::CancellationToken`] and clean up their socket file
//!
//! # Examples
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tokio_util::sync::CancellationToken;
//! # use uds_bidir_comm::{ClientConfig, RequestProcessor, UdsClient, UdsServer};
//! struct Echo;
//!
//! impl RequestProcessor<String, String> for Echo {
//!     fn process(&self, request: String) -> String {
//!         request
//!     }
//! }
//!
//! # async fn run() -> uds_bidir_comm::CommResult<()> {
//! let server = UdsServer::<String, String>::bind("/tmp/echo.sock")?;
//! let token = CancellationToken::new();
//! tokio::spawn(server.serve(Arc::new(Echo), token.clone()));
//!
//! let mut client = UdsClient::<String, String>::connect(ClientConfig::new("/tmp/echo.sock")).await?;
//! let reply = client.call(&"hello".to_string()).await?;
//! assert_eq!(reply, "hello");
//! token.cancel();
//! # Ok(())
//! # }
//! ```

pub mod client;
mod codec;
pub mod config;
pub mod error;
pub mod server;
pub mod types;

pub use client::UdsClient;
pub use config::ClientConfig;
pub use config::ServerConfig;
pub use error::CommError;
pub use error::CommResult;
pub use server::UdsServer;
pub use types::RequestProcessor;
