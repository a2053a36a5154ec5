//! Error types for Unix socket bidirectional communication.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for communication operations.
pub type CommResult<T> = Result<T, Report<CommError>>;

/// Errors that can occur while exchanging messages over a Unix socket.
#[derive(Debug, Display)]
pub enum CommError {
    /// Socket connectivity issues
    #[display("Network error: {message}")]
    Network { message: String },

    /// Serialization/deserialization errors
    #[display("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration errors
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Timeout errors
    #[display("Operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Peer closed the connection before replying
    #[display("Connection closed by peer")]
    Closed,

    /// Client is unusable after an earlier failed exchange
    #[display("Client is not connected")]
    NotConnected,
}

impl Error for CommError {}
