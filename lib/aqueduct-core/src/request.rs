//! The in-flight request record.
//!
//! A [`Request`] is created once per logical call by the entry façade and
//! owned by that call's context. Its URL is always fully resolved by the time
//! any middleware sees it; middleware mutate it through [`Request::merge`] or
//! the field setters.

use std::sync::Arc;

use http::HeaderMap;
use url::Url;

use crate::{AbortSource, BodyKind, Method, Payload, QueryPairs, Result};

/// An in-flight HTTP request.
#[derive(Clone)]
pub struct Request {
    url: Url,
    method: Method,
    kind: BodyKind,
    payload: Option<Payload>,
    query: QueryPairs,
    headers: HeaderMap,
    signals: Vec<Arc<dyn AbortSource>>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("signals", &self.signals.len())
            .finish()
    }
}

impl Request {
    /// Creates a request for an already-resolved URL.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            kind: BodyKind::default(),
            payload: None,
            query: QueryPairs::new(),
            headers: HeaderMap::new(),
            signals: Vec::new(),
        }
    }

    /// Request URL (always absolute).
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Replaces the URL.
    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Replaces the method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Declared payload encoding.
    #[must_use]
    pub const fn kind(&self) -> BodyKind {
        self.kind
    }

    /// Replaces the declared payload encoding.
    pub fn set_kind(&mut self, kind: BodyKind) {
        self.kind = kind;
    }

    /// Request payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Replaces the payload.
    pub fn set_payload(&mut self, payload: impl Into<Payload>) {
        self.payload = Some(payload.into());
    }

    /// Query parameters.
    #[must_use]
    pub const fn query(&self) -> &QueryPairs {
        &self.query
    }

    /// Mutable access to the query parameters.
    pub const fn query_mut(&mut self) -> &mut QueryPairs {
        &mut self.query
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers.
    pub const fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Attached cancellation sources.
    #[must_use]
    pub fn signals(&self) -> &[Arc<dyn AbortSource>] {
        &self.signals
    }

    /// Attaches a cancellation source.
    pub fn add_signal(&mut self, signal: Arc<dyn AbortSource>) {
        self.signals.push(signal);
    }

    /// Applies a partial options record.
    ///
    /// Scalar fields (method, kind, payload) are replaced; query parameters,
    /// headers, and signals are appended; a URL is re-resolved against the
    /// current one, so both absolute replacements and relative adjustments
    /// work.
    pub fn merge(&mut self, options: &MergeOptions) -> Result<()> {
        if let Some(url) = &options.url {
            self.url = self.url.join(url)?;
        }
        if let Some(method) = options.method {
            self.method = method;
        }
        if let Some(kind) = options.kind {
            self.kind = kind;
        }
        if let Some(payload) = &options.payload {
            self.payload = Some(payload.clone());
        }
        self.query.extend(&options.query);
        for (name, value) in &options.headers {
            self.headers.append(name.clone(), value.clone());
        }
        self.signals.extend(options.signals.iter().cloned());
        Ok(())
    }
}

/// A partial request record, applied with [`Request::merge`].
///
/// Also the static middleware variant: a merge-options entry in a flow is
/// applied to the request and the chain continues, with no handler code.
#[derive(Clone, Default)]
pub struct MergeOptions {
    /// URL to resolve against the current request URL.
    pub url: Option<String>,
    /// Replacement method.
    pub method: Option<Method>,
    /// Replacement payload encoding.
    pub kind: Option<BodyKind>,
    /// Replacement payload.
    pub payload: Option<Payload>,
    /// Query parameters to append.
    pub query: QueryPairs,
    /// Headers to append.
    pub headers: HeaderMap,
    /// Cancellation sources to attach.
    pub signals: Vec<Arc<dyn AbortSource>>,
}

impl std::fmt::Debug for MergeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOptions")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("signals", &self.signals.len())
            .finish()
    }
}

impl MergeOptions {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL to resolve against the request URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the replacement method.
    #[must_use]
    pub const fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the replacement payload encoding.
    #[must_use]
    pub const fn kind(mut self, kind: BodyKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the replacement payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(key, value);
        self
    }

    /// Appends a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid header.
    pub fn header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self> {
        let name = http::HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::invalid_request(e.to_string()))?;
        let value = http::HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::invalid_request(e.to_string()))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Attaches a cancellation source.
    #[must_use]
    pub fn signal(mut self, signal: Arc<dyn AbortSource>) -> Self {
        self.signals.push(signal);
        self
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;

    fn request() -> Request {
        let url = Url::parse("https://api.example.com/v1/items").expect("url");
        Request::new(Method::Get, url)
    }

    #[test]
    fn merge_replaces_scalars() {
        let mut req = request();
        let options = MergeOptions::new()
            .method(Method::Put)
            .kind(BodyKind::Query)
            .payload("text body");
        req.merge(&options).expect("merge");

        check!(req.method() == Method::Put);
        check!(req.kind() == BodyKind::Query);
        check!(matches!(req.payload(), Some(Payload::Text(_))));
    }

    #[test]
    fn merge_appends_query_and_headers() {
        let mut req = request();
        req.query_mut().append("page", "1");
        req.headers_mut().append(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/json"),
        );

        let options = MergeOptions::new()
            .query("page", "2")
            .header("accept", "text/plain")
            .expect("header");
        req.merge(&options).expect("merge");

        check!(req.query().to_query_string() == "page=1&page=2");
        check!(req.headers().get_all(http::header::ACCEPT).iter().count() == 2);
    }

    #[test]
    fn merge_resolves_relative_url() {
        let mut req = request();
        req.merge(&MergeOptions::new().url("details")).expect("merge");
        check!(req.url().as_str() == "https://api.example.com/v1/details");

        req.merge(&MergeOptions::new().url("https://other.example.com/x"))
            .expect("merge");
        check!(req.url().as_str() == "https://other.example.com/x");
    }

    #[test]
    fn merge_rejects_invalid_header_name() {
        check!(MergeOptions::new().header("bad header", "v").is_err());
    }
}
