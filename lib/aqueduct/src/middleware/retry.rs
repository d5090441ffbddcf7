//! Retry middleware.

use tracing::warn;

use crate::Flow;

/// Invokes the rest of the chain up to `attempts` times, first success wins.
///
/// An aborted request is never retried; the abort reason propagates
/// directly. Other errors are logged at `warn` and retried until the
/// attempt budget runs out, then the last error propagates. Re-invocation
/// relies on [`Next`](crate::Next) being re-runnable.
///
/// # Example
///
/// ```ignore
/// use aqueduct::middleware::retry;
///
/// let client = aqueduct::Client::builder()
///     .flow(retry(3))
///     .build();
/// ```
#[must_use]
pub fn retry(attempts: u32) -> Flow {
    Flow::from_fn(move |_scope, next| async move {
        let attempts = attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match next.run().await {
                Ok(response) => break Ok(response),
                Err(err) if err.is_aborted() || attempt >= attempts => break Err(err),
                Err(err) => {
                    warn!(error = %err, attempt, "request attempt failed, retrying");
                }
            }
        }
    })
}
