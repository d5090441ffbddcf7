//! Core types for the aqueduct HTTP request pipeline.
//!
//! This crate provides the foundational types used by aqueduct:
//! - [`Method`] - HTTP method enum
//! - [`Request`] and [`MergeOptions`] - request model and partial overrides
//! - [`Response`], [`Body`] and [`RawResponse`] - response model
//! - [`Payload`], [`BodyKind`], [`Form`] and [`Part`] - request payloads
//! - [`QueryPairs`] - ordered query parameter multimap
//! - [`codec`] - content-type driven body encoding and decoding
//! - [`Error`], [`AbortReason`] and [`Result`] - error handling
//! - [`AbortSource`] - external cancellation boundary
//! - [`StatusCode`] and [`header`] - re-exported from the `http` crate

pub mod codec;
mod error;
mod method;
mod multipart;
mod payload;
pub mod prelude;
mod query;
mod request;
mod response;
mod signal;

pub use codec::{DecodeMode, SniffPolicy};
pub use error::{AbortReason, BodyShape, Error, Result};
pub use method::Method;
pub use multipart::{Form, Part};
pub use payload::{BodyKind, Payload};
pub use query::QueryPairs;
pub use request::{MergeOptions, Request};
pub use response::{Body, RawResponse, Response, ResponsePatch};
pub use signal::AbortSource;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
