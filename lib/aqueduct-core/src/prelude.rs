//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types for easy glob
//! importing:
//!
//! ```ignore
//! use aqueduct_core::prelude::*;
//! ```

pub use crate::{
    AbortReason, AbortSource, Body, BodyKind, DecodeMode, Error, Form, MergeOptions, Method,
    Part, Payload, QueryPairs, Request, Response, Result, SniffPolicy,
};
