//! Client-side HTTP request pipeline.
//!
//! Requests run through an onion of [`Flow`] middleware around a pluggable
//! [`Transport`](transport::Transport); each request carries a [`Context`]
//! with cooperative abort, scoped key/value stores, and identity-keyed
//! attachments. Bodies are encoded and decoded by content type.
//!
//! # Example
//!
//! ```ignore
//! use aqueduct::prelude::*;
//! use serde_json::json;
//!
//! let client = Client::builder()
//!     .base_url(url::Url::parse("https://api.example.com/")?)
//!     .flow(aqueduct::middleware::logging())
//!     .build();
//!
//! let response = client
//!     .post("users")
//!     .json(&json!({"name": "alice"}))?
//!     .send()
//!     .await?;
//! let user: serde_json::Value = response.json()?;
//! ```

mod client;
mod config;
mod connector;
mod context;
mod engine;
mod flow;
pub mod middleware;
pub mod prelude;
mod signal;
pub mod transport;

pub use client::{Call, Client, ClientBuilder};
pub use config::{TransportConfig, TransportConfigBuilder};
pub use connector::https_connector;
pub use context::{AbortListenerId, Context, RequestGuard, Scope};
pub use engine::{Chain, Next};
pub use flow::{Flow, FlowStep, Handler};
pub use signal::{AbortHandle, AbortSignal, abort_pair};
pub use transport::{HyperTransport, Transport, WireRequest};

// Re-export core types
pub use aqueduct_core::{
    AbortReason, AbortSource, Body, BodyKind, BodyShape, DecodeMode, Error, Form, MergeOptions,
    Method, Part, Payload, QueryPairs, RawResponse, Request, Response, ResponsePatch, Result,
    SniffPolicy, codec,
};

// Re-export http types for status codes and headers
pub use aqueduct_core::{StatusCode, header};

pub use url;
