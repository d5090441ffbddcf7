//! Timeout middleware.

use std::time::Duration;

use aqueduct_core::AbortReason;

use crate::Flow;

/// Limits the rest of the chain to `duration`.
///
/// On expiry the request is aborted with [`AbortReason::Timeout`], so
/// everything downstream observes the same cancellation: a pending wire
/// exchange is dropped and later `next()` invocations refuse to run.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use aqueduct::middleware::timeout;
///
/// let client = aqueduct::Client::builder()
///     .flow(timeout(Duration::from_secs(5)))
///     .build();
/// ```
#[must_use]
pub fn timeout(duration: Duration) -> Flow {
    Flow::from_fn(move |scope, next| async move {
        tokio::select! {
            result = next.run() => result,
            () = tokio::time::sleep(duration) => Err(scope.err(AbortReason::Timeout)),
        }
    })
}
