//! Chain execution.
//!
//! The engine runs a flattened flow sequence as an onion: each handler wraps
//! everything after it, and the implicit terminal step past the end of the
//! sequence performs the wire exchange. A chain executes strictly
//! sequentially; the only suspension points are the awaits inside handlers
//! and the transport call itself.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use aqueduct_core::codec;
use aqueduct_core::{AbortReason, DecodeMode, Error, Response, Result, SniffPolicy};

use crate::context::Context;
use crate::flow::FlowStep;
use crate::transport::{Transport, WireRequest};

/// A runnable request chain.
pub struct Chain {
    steps: Vec<FlowStep>,
    ctx: Context,
    transport: Arc<dyn Transport>,
    mode: DecodeMode,
    policy: SniffPolicy,
}

impl Chain {
    /// Builds a chain over flattened steps.
    #[must_use]
    pub fn new(
        steps: Vec<FlowStep>,
        ctx: Context,
        transport: Arc<dyn Transport>,
        mode: DecodeMode,
        policy: SniffPolicy,
    ) -> Self {
        Self {
            steps,
            ctx,
            transport,
            mode,
            policy,
        }
    }

    /// Runs the chain from the first step through the terminal exchange.
    pub async fn run(self) -> Result<Response> {
        Next {
            chain: Arc::new(self),
            index: 0,
        }
        .run()
        .await
    }

    fn dispatch(self: &Arc<Self>, index: usize) -> BoxFuture<'static, Result<Response>> {
        let chain = Arc::clone(self);
        Box::pin(async move {
            match chain.steps.get(index) {
                None => chain.terminal().await,
                Some(FlowStep::Merge(options)) => {
                    chain.ctx.merge_request(options)?;
                    Next {
                        chain: Arc::clone(&chain),
                        index: index + 1,
                    }
                    .run()
                    .await
                }
                Some(FlowStep::Handler(handler)) => {
                    let scope = chain.ctx.at(index);
                    let next = Next {
                        chain: Arc::clone(&chain),
                        index: index + 1,
                    };
                    handler.call(scope, next).await
                }
            }
        })
    }

    /// The implicit step past the end of the chain: finalize the request,
    /// call the transport, decode the result.
    async fn terminal(self: &Arc<Self>) -> Result<Response> {
        let (wire, sources) = {
            let mut request = self.ctx.request_mut();
            let body = codec::encode(&mut request)?;
            let mut url = request.url().clone();
            request.query().append_to_url(&mut url);
            let wire = WireRequest {
                method: request.method(),
                url,
                headers: request.headers().clone(),
                body,
            };
            (wire, request.signals().to_vec())
        };

        for source in sources {
            let ctx = self.ctx.clone();
            source.listen(Box::new(move || {
                ctx.abort(AbortReason::Canceled);
            }));
        }
        if let Some(reason) = self.ctx.abort_reason() {
            return Err(Error::Aborted(reason));
        }

        // Dropping the transport future on abort cancels the wire exchange.
        let exchange = self.transport.send(self.ctx.clone(), wire);
        let raw = tokio::select! {
            raw = exchange => raw?,
            reason = self.ctx.aborted() => return Err(Error::Aborted(reason)),
        };

        codec::decode_response(raw, self.mode, &self.policy)
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.steps)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Continuation handed to each handler.
///
/// Cloneable and re-invokable, so a handler can retry the rest of the chain.
/// Each invocation first checks the abort flag: on an aborted context it
/// yields the recorded reason without dispatching further.
#[derive(Clone)]
pub struct Next {
    chain: Arc<Chain>,
    index: usize,
}

impl Next {
    /// Executes the rest of the chain.
    pub fn run(&self) -> BoxFuture<'static, Result<Response>> {
        if let Some(reason) = self.chain.ctx.abort_reason() {
            return Box::pin(async move { Err(Error::Aborted(reason)) });
        }
        self.chain.dispatch(self.index)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}
