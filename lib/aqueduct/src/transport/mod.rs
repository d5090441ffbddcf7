//! The wire boundary.
//!
//! A [`Transport`] performs one HTTP exchange from a finalized
//! [`WireRequest`] and returns the undecoded [`RawResponse`]. Everything
//! above the transport (flows, codec, abort) is transport-agnostic; swapping
//! in a mock transport is the main test seam.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::HeaderMap;
use url::Url;

use aqueduct_core::{Method, RawResponse, Result};

use crate::context::Context;

mod hyper;

pub use self::hyper::HyperTransport;

/// A fully finalized request, ready for the wire.
///
/// The body is already encoded and the query already appended to the URL;
/// a transport performs no further transformation.
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including query.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Encoded body bytes, if any.
    pub body: Option<Bytes>,
}

/// Performs HTTP exchanges.
pub trait Transport: Send + Sync + 'static {
    /// Sends one request and resolves with the undecoded response.
    ///
    /// The context is provided for observability; cancellation is handled
    /// above the transport by racing this future against the abort state.
    fn send(&self, ctx: Context, request: WireRequest) -> BoxFuture<'static, Result<RawResponse>>;
}
