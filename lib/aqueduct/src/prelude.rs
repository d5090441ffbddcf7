//! Prelude module for convenient imports.
//!
//! ```ignore
//! use aqueduct::prelude::*;
//! ```

pub use crate::{
    AbortReason, AbortSource, Body, BodyKind, Client, Context, DecodeMode, Error, Flow, Form,
    MergeOptions, Method, Next, Part, Payload, QueryPairs, Request, Response, Result, Scope,
    SniffPolicy, Transport,
};
