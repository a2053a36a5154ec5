//! Common types for Unix socket bidirectional communication.

/// Trait for processing requests received by a [`crate::UdsServer`].
///
/// Processing runs on the blocking thread pool, so implementations may perform
/// synchronous work such as driver calls.
pub trait RequestProcessor<Req, Resp> {
    /// Process a request and return the response sent back to the peer.
    fn process(&self, request: Req) -> Resp;
}
