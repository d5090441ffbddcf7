//! Request/response logging middleware.
//!
//! Logs HTTP requests and responses using the `tracing` crate.

use std::time::Instant;

use tracing::{Instrument, Level, info, span, warn};

use crate::Flow;

/// Logs each request, its outcome, and the elapsed time.
///
/// The whole downstream chain runs inside an `http_request` span carrying
/// the method and URL.
///
/// # Example
///
/// ```ignore
/// use aqueduct::middleware::logging;
///
/// let client = aqueduct::Client::builder()
///     .flow(logging())
///     .build();
/// ```
#[must_use]
pub fn logging() -> Flow {
    Flow::from_fn(|scope, next| {
        let (method, url) = {
            let request = scope.request();
            (request.method(), request.url().to_string())
        };
        let span = span!(Level::INFO, "http_request", %method, %url);

        async move {
            let start = Instant::now();
            info!(method = %method, url = %url, "sending request");

            let result = next.run().await;

            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match &result {
                Ok(response) if response.ok() => {
                    info!(status = response.status(), elapsed_ms, "request completed");
                }
                Ok(response) => {
                    warn!(
                        status = response.status(),
                        elapsed_ms, "request failed with HTTP error"
                    );
                }
                Err(err) => {
                    warn!(error = %err, elapsed_ms, "request failed");
                }
            }

            result
        }
        .instrument(span)
    })
}
