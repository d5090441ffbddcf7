//! Middleware flows.
//!
//! A [`Flow`] is one element of the request pipeline: a callable handler
//! wrapping the rest of the chain, a static partial-request record applied
//! in place, or a nested group. Groups flatten depth-first before execution,
//! so composition order is exactly visual order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use aqueduct_core::{MergeOptions, Response, Result};

use crate::context::Scope;
use crate::engine::Next;

/// A callable middleware.
///
/// The handler receives a [`Scope`] bound to its own chain position and a
/// [`Next`] continuation. Calling [`Next::run`] executes the rest of the
/// chain; skipping it short-circuits, and the transport never runs.
pub trait Handler: Send + Sync + 'static {
    /// Runs this middleware around the rest of the chain.
    fn call(&self, scope: Scope, next: Next) -> BoxFuture<'static, Result<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Scope, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn call(&self, scope: Scope, next: Next) -> BoxFuture<'static, Result<Response>> {
        Box::pin(self(scope, next))
    }
}

/// One element of a request pipeline.
#[derive(Clone)]
pub enum Flow {
    /// A callable middleware.
    Handler(Arc<dyn Handler>),
    /// A partial request record applied in place.
    Merge(MergeOptions),
    /// A nested sequence, flattened before execution.
    Group(Vec<Flow>),
}

impl Flow {
    /// Wraps an async closure as a handler flow.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Scope, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        Self::Handler(Arc::new(f))
    }

    /// A flow that applies `options` to the request and continues.
    #[must_use]
    pub const fn merge(options: MergeOptions) -> Self {
        Self::Merge(options)
    }

    /// Groups flows so they can be installed as one unit.
    #[must_use]
    pub const fn group(flows: Vec<Flow>) -> Self {
        Self::Group(flows)
    }

    /// Flattens flows into executable steps, depth-first, left to right.
    ///
    /// Already-flat input maps one to one, so flattening twice yields the
    /// same sequence.
    #[must_use]
    pub fn flatten(flows: Vec<Flow>) -> Vec<FlowStep> {
        let mut steps = Vec::with_capacity(flows.len());
        Self::flatten_into(flows, &mut steps);
        steps
    }

    fn flatten_into(flows: Vec<Flow>, steps: &mut Vec<FlowStep>) {
        for flow in flows {
            match flow {
                Self::Handler(handler) => steps.push(FlowStep::Handler(handler)),
                Self::Merge(options) => steps.push(FlowStep::Merge(options)),
                Self::Group(nested) => Self::flatten_into(nested, steps),
            }
        }
    }
}

impl From<MergeOptions> for Flow {
    fn from(options: MergeOptions) -> Self {
        Self::Merge(options)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Flow::Handler"),
            Self::Merge(options) => f.debug_tuple("Flow::Merge").field(options).finish(),
            Self::Group(flows) => f.debug_tuple("Flow::Group").field(flows).finish(),
        }
    }
}

/// A flattened, directly executable pipeline element.
#[derive(Clone)]
pub enum FlowStep {
    /// A callable middleware.
    Handler(Arc<dyn Handler>),
    /// A partial request record.
    Merge(MergeOptions),
}

impl fmt::Debug for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("FlowStep::Handler"),
            Self::Merge(options) => f.debug_tuple("FlowStep::Merge").field(options).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use aqueduct_core::Method;

    use super::*;

    fn handler() -> Flow {
        Flow::from_fn(|_scope, next| async move { next.run().await })
    }

    fn shape(steps: &[FlowStep]) -> Vec<&'static str> {
        steps
            .iter()
            .map(|step| match step {
                FlowStep::Handler(_) => "handler",
                FlowStep::Merge(_) => "merge",
            })
            .collect()
    }

    #[test]
    fn flatten_is_depth_first_left_to_right() {
        let flows = vec![
            handler(),
            Flow::group(vec![
                Flow::merge(MergeOptions::new().method(Method::Post)),
                Flow::group(vec![handler()]),
            ]),
            Flow::merge(MergeOptions::new()),
        ];

        let steps = Flow::flatten(flows);
        check!(shape(&steps) == vec!["handler", "merge", "handler", "merge"]);
    }

    #[test]
    fn flatten_is_idempotent_on_flat_input() {
        let flows = vec![handler(), Flow::merge(MergeOptions::new()), handler()];
        let first = Flow::flatten(flows);

        let again: Vec<Flow> = first
            .iter()
            .map(|step| match step {
                FlowStep::Handler(h) => Flow::Handler(Arc::clone(h)),
                FlowStep::Merge(options) => Flow::Merge(options.clone()),
            })
            .collect();
        let second = Flow::flatten(again);

        check!(shape(&first) == shape(&second));
        check!(first.len() == second.len());
    }

    #[test]
    fn empty_group_flattens_to_nothing() {
        let steps = Flow::flatten(vec![Flow::group(Vec::new())]);
        check!(steps.is_empty());
    }
}
