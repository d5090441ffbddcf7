//! Client façade.
//!
//! [`Client`] holds the cross-request configuration: optional base URL,
//! default headers, default flows, the sniffing policy, and the transport.
//! Each call goes through a [`Call`] builder and runs as its own chain with
//! its own [`Context`](crate::Context).

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

use aqueduct_core::{
    AbortSource, BodyKind, DecodeMode, Error, Form, Method, Payload, QueryPairs, Request,
    Response, Result, SniffPolicy,
};

use crate::context::Context;
use crate::engine::Chain;
use crate::flow::Flow;
use crate::transport::{HyperTransport, Transport};

/// Resolves a call target against an optional base URL.
///
/// With a base, relative paths join onto it and absolute URLs replace it.
/// Without a base the target must be absolute.
fn resolve_url(base: Option<&Url>, target: &str) -> Result<Url> {
    match base {
        Some(base) => Ok(base.join(target)?),
        None => Ok(Url::parse(target)?),
    }
}

fn parse_header(name: impl AsRef<str>, value: impl AsRef<str>) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name.as_ref())
        .map_err(|e| Error::invalid_request(e.to_string()))?;
    let value = HeaderValue::try_from(value.as_ref())
        .map_err(|e| Error::invalid_request(e.to_string()))?;
    Ok((name, value))
}

/// Configured entry point for issuing requests.
#[derive(Clone)]
pub struct Client {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    default_flows: Vec<Flow>,
    policy: SniffPolicy,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Creates a client with default configuration and the hyper transport.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Base URL calls resolve against, if any.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Starts a request with an explicit method.
    #[must_use]
    pub fn request(&self, method: Method, target: impl Into<String>) -> Call {
        Call::new(self.clone(), method, target.into())
    }

    /// Starts a GET request.
    #[must_use]
    pub fn get(&self, target: impl Into<String>) -> Call {
        self.request(Method::Get, target)
    }

    /// Starts a POST request.
    #[must_use]
    pub fn post(&self, target: impl Into<String>) -> Call {
        self.request(Method::Post, target)
    }

    /// Starts a PUT request.
    #[must_use]
    pub fn put(&self, target: impl Into<String>) -> Call {
        self.request(Method::Put, target)
    }

    /// Starts a DELETE request.
    #[must_use]
    pub fn delete(&self, target: impl Into<String>) -> Call {
        self.request(Method::Delete, target)
    }

    /// Starts a PATCH request.
    #[must_use]
    pub fn patch(&self, target: impl Into<String>) -> Call {
        self.request(Method::Patch, target)
    }

    /// Starts a HEAD request.
    #[must_use]
    pub fn head(&self, target: impl Into<String>) -> Call {
        self.request(Method::Head, target)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("default_flows", &self.default_flows.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    default_flows: Vec<Flow>,
    policy: Option<SniffPolicy>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Sets the base URL relative call targets resolve against.
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Appends a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.default_headers.append(name, value);
        Ok(self)
    }

    /// Appends a flow installed ahead of every call's own flows.
    #[must_use]
    pub fn flow(mut self, flow: Flow) -> Self {
        self.default_flows.push(flow);
        self
    }

    /// Replaces the auto-decode sniffing policy.
    #[must_use]
    pub fn sniff_policy(mut self, policy: SniffPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Replaces the transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client, defaulting to [`HyperTransport`].
    #[must_use]
    pub fn build(self) -> Client {
        Client {
            base_url: self.base_url,
            default_headers: self.default_headers,
            default_flows: self.default_flows,
            policy: self.policy.unwrap_or_default(),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(HyperTransport::new())),
        }
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("default_flows", &self.default_flows.len())
            .finish_non_exhaustive()
    }
}

/// Per-call request builder.
///
/// Created by [`Client::get`] and friends; consumed by [`Call::send`].
pub struct Call {
    client: Client,
    method: Method,
    target: String,
    kind: BodyKind,
    payload: Option<Payload>,
    query: QueryPairs,
    headers: HeaderMap,
    signals: Vec<Arc<dyn AbortSource>>,
    flows: Vec<Flow>,
    mode: DecodeMode,
}

impl Call {
    fn new(client: Client, method: Method, target: String) -> Self {
        Self {
            client,
            method,
            target,
            kind: BodyKind::default(),
            payload: None,
            query: QueryPairs::new(),
            headers: HeaderMap::new(),
            signals: Vec::new(),
            flows: Vec::new(),
            mode: DecodeMode::default(),
        }
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` fails to serialize.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.kind = BodyKind::Json;
        self.payload = Some(Payload::json(body)?);
        Ok(self)
    }

    /// Sets an object body encoded as a URL-encoded form.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` fails to serialize.
    pub fn query_body<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.kind = BodyKind::Query;
        self.payload = Some(Payload::json(body)?);
        Ok(self)
    }

    /// Sets an object body encoded as a multipart form.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` fails to serialize.
    pub fn form_body<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.kind = BodyKind::Form;
        self.payload = Some(Payload::json(body)?);
        Ok(self)
    }

    /// Sets a pre-built multipart form body.
    #[must_use]
    pub fn form(mut self, form: Form) -> Self {
        self.payload = Some(Payload::Form(form));
        self
    }

    /// Sets a plain text body.
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.kind = BodyKind::Raw;
        self.payload = Some(Payload::Text(body.into()));
        self
    }

    /// Sets a raw bytes body.
    #[must_use]
    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.payload = Some(Payload::Bytes(body.into()));
        self
    }

    /// Overrides the declared payload encoding.
    #[must_use]
    pub const fn kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the payload without touching the declared encoding.
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

    /// Appends query parameters from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fails to serialize.
    pub fn query_serialize<T: Serialize>(mut self, params: &T) -> Result<Self> {
        let pairs = QueryPairs::from_serialize(params)?;
        self.query.extend(&pairs);
        Ok(self)
    }

    /// Appends a header.
    ///
    /// Repeated calls with the same name accumulate values, but the
    /// call's headers as a whole replace any same-named client default
    /// when the request is built.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Attaches a cancellation source.
    #[must_use]
    pub fn signal(mut self, signal: Arc<dyn AbortSource>) -> Self {
        self.signals.push(signal);
        self
    }

    /// Appends a flow, after the client's default flows.
    #[must_use]
    pub fn flow(mut self, flow: Flow) -> Self {
        self.flows.push(flow);
        self
    }

    /// Sets the requested decode mode (default [`DecodeMode::Auto`]).
    #[must_use]
    pub const fn decode(mut self, mode: DecodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Resolves the URL, builds the request, and runs the chain.
    ///
    /// The URL is absolute before the first flow runs; default flows
    /// execute ahead of per-call flows.
    pub async fn send(self) -> Result<Response> {
        let url = resolve_url(self.client.base_url.as_ref(), &self.target)?;

        let mut request = Request::new(self.method, url);
        request.set_kind(self.kind);
        if let Some(payload) = self.payload {
            request.set_payload(payload);
        }
        request.query_mut().extend(&self.query);
        for (name, value) in &self.client.default_headers {
            request.headers_mut().append(name.clone(), value.clone());
        }
        // Call headers override same-named defaults; extend replaces on
        // the first occurrence of a name and appends duplicates after it.
        request.headers_mut().extend(self.headers);
        for signal in self.signals {
            request.add_signal(signal);
        }

        let mut flows = self.client.default_flows.clone();
        flows.extend(self.flows);
        let steps = Flow::flatten(flows);

        let ctx = Context::new(request);
        Chain::new(
            steps,
            ctx,
            Arc::clone(&self.client.transport),
            self.mode,
            self.client.policy.clone(),
        )
        .run()
        .await
    }
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
