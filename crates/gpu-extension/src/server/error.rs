use core::error::Error;

use derive_more::Display;
use error_stack::Report;

pub type ExtensionResult<T> = Result<T, Report<ExtensionError>>;

/// Terminal failures of the extension lifecycle.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionError {
    #[display("Failed to register with the host")]
    Registration,

    #[display("Host stopped acknowledging heartbeats")]
    Heartbeat,

    #[display("Extension socket listener failed")]
    Listener,

    #[display("Failed to shut down cleanly")]
    Shutdown,
}

impl Error for ExtensionError {}
