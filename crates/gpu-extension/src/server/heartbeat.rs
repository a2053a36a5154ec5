use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::error::ExtensionError;
use super::error::ExtensionResult;
use super::manager::ManagerClient;

/// Ping the host every `interval` until `token` is cancelled.
///
/// The first ping goes out one interval after the start. A ping that fails, times out
/// or is answered with a non-OK status ends the loop with [`ExtensionError::Heartbeat`];
/// there are no retries.
pub(crate) async fn run(
    manager: &mut ManagerClient,
    interval: Duration,
    token: &CancellationToken,
) -> ExtensionResult<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    let mut sent = 0u64;
    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }

        // a ping in flight is bounded by the request timeout and always completes
        let status = manager
            .ping()
            .await
            .change_context(ExtensionError::Heartbeat)
            .attach_printable_lazy(|| format!("ping #{} was not acknowledged", sent + 1))?;
        sent += 1;

        if !status.is_ok() {
            return Err(Report::new(ExtensionError::Heartbeat).attach_printable(format!(
                "host answered ping with status {}: {}",
                status.code, status.message
            )));
        }
        trace!(sent, "Heartbeat acknowledged");
    }
}
