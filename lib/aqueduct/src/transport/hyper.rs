//! Default transport using hyper-util.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use url::Url;

use aqueduct_core::{AbortReason, Error, RawResponse, Result};

use crate::config::TransportConfig;
use crate::connector::https_connector;
use crate::context::Context;

use super::{Transport, WireRequest};

/// HTTP transport backed by hyper-util with connection pooling and rustls TLS.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: TransportConfig,
}

impl HyperTransport {
    /// Creates a transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Creates a transport with custom configuration.
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        let connector = https_connector();

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner, config }
    }

    /// Transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn build_hyper_request(request: WireRequest) -> Result<http::Request<Full<Bytes>>> {
        let mut builder = http::Request::builder()
            .method(http::Method::from(request.method))
            .uri(request.url.as_str());

        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }

        let body = request.body.map_or_else(Full::default, Full::new);
        builder
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    async fn execute(&self, request: WireRequest) -> Result<RawResponse> {
        let url = request.url.clone();
        let hyper_request = Self::build_hyper_request(request)?;

        let response = tokio::time::timeout(self.config.timeout, self.inner.request(hyper_request))
            .await
            .map_err(|_| Error::Aborted(AbortReason::Timeout))?
            .map_err(Self::map_hyper_error)?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Self::raw_response(status, headers, url, body))
    }

    fn raw_response(
        status: http::StatusCode,
        headers: http::HeaderMap,
        url: Url,
        body: Bytes,
    ) -> RawResponse {
        RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            url,
            body,
        }
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Transport for HyperTransport {
    fn send(&self, _ctx: Context, request: WireRequest) -> BoxFuture<'static, Result<RawResponse>> {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn transport_default() {
        let transport = HyperTransport::new();
        assert_eq!(transport.config().timeout, Duration::from_secs(30));
    }

    #[test]
    fn transport_with_config() {
        let transport = HyperTransport::with_config(
            TransportConfig::builder()
                .timeout(Duration::from_secs(60))
                .pool_idle_per_host(16)
                .build(),
        );

        assert_eq!(transport.config().timeout, Duration::from_secs(60));
        assert_eq!(transport.config().pool_idle_per_host, 16);
    }

    #[test]
    fn builds_request_with_body_and_headers() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::ACCEPT, http::HeaderValue::from_static("*/*"));

        let request = WireRequest {
            method: aqueduct_core::Method::Post,
            url: Url::parse("https://api.example.com/items?a=1").expect("url"),
            headers,
            body: Some(Bytes::from_static(b"{}")),
        };

        let built = HyperTransport::build_hyper_request(request).expect("request");
        assert_eq!(built.method(), http::Method::POST);
        assert_eq!(built.uri(), "https://api.example.com/items?a=1");
        assert_eq!(built.headers().get(http::header::ACCEPT).expect("accept"), "*/*");
    }
}
