//! Per-request context.
//!
//! A [`Context`] is created for each logical request and travels through the
//! whole flow chain. It owns the live [`Request`], the cooperative abort
//! state, a position-indexed store stack for middleware-to-middleware
//! values, and an identity-keyed attachment table.
//!
//! Cloning is cheap (shared inner). Locks are plain [`std::sync::Mutex`]
//! held only across non-await sections.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use aqueduct_core::{AbortReason, AbortSource, Error, MergeOptions, Request, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type AbortListener = Box<dyn FnOnce(AbortReason) + Send>;
type Frame = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// Handle returned by [`Context::on_abort`], usable with
/// [`Context::off_abort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbortListenerId(u64);

#[derive(Default)]
struct AbortState {
    reason: Option<AbortReason>,
    listeners: Vec<(u64, AbortListener)>,
    next_id: u64,
}

struct AttachmentEntry {
    owner: Weak<dyn Any + Send + Sync>,
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

struct ContextInner {
    request: Mutex<Request>,
    abort: Mutex<AbortState>,
    abort_tx: watch::Sender<Option<AbortReason>>,
    stack: Mutex<Vec<Frame>>,
    attachments: Mutex<HashMap<usize, AttachmentEntry>>,
}

/// Shared per-request state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

/// Guarded access to the context's [`Request`].
pub struct RequestGuard<'a>(MutexGuard<'a, Request>);

impl Deref for RequestGuard<'_> {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.0
    }
}

impl DerefMut for RequestGuard<'_> {
    fn deref_mut(&mut self) -> &mut Request {
        &mut self.0
    }
}

impl Context {
    /// Creates a context owning `request`.
    #[must_use]
    pub fn new(request: Request) -> Self {
        let (abort_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(ContextInner {
                request: Mutex::new(request),
                abort: Mutex::new(AbortState::default()),
                abort_tx,
                stack: Mutex::new(Vec::new()),
                attachments: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Read access to the live request.
    ///
    /// The guard must not be held across an await point.
    #[must_use]
    pub fn request(&self) -> RequestGuard<'_> {
        RequestGuard(lock(&self.inner.request))
    }

    /// Write access to the live request.
    ///
    /// The guard must not be held across an await point.
    #[must_use]
    pub fn request_mut(&self) -> RequestGuard<'_> {
        RequestGuard(lock(&self.inner.request))
    }

    /// Applies a partial options record to the live request.
    pub fn merge_request(&self, options: &MergeOptions) -> Result<()> {
        lock(&self.inner.request).merge(options)
    }

    // ------------------------------------------------------------------
    // Abort
    // ------------------------------------------------------------------

    /// Aborts the request. The first call wins and fires the registered
    /// listeners; later calls are no-ops returning the recorded reason.
    pub fn abort(&self, reason: impl Into<AbortReason>) -> AbortReason {
        let reason = reason.into();
        let fired = {
            let mut state = lock(&self.inner.abort);
            if let Some(existing) = &state.reason {
                return existing.clone();
            }
            state.reason = Some(reason.clone());
            std::mem::take(&mut state.listeners)
        };
        self.inner.abort_tx.send_replace(Some(reason.clone()));
        for (_, listener) in fired {
            listener(reason.clone());
        }
        reason
    }

    /// Aborts the request and returns the matching error value.
    ///
    /// The rejection stays inert until the caller propagates it, so a
    /// middleware can record the abort and decide separately what to do
    /// with the chain.
    pub fn err(&self, reason: impl Into<AbortReason>) -> Error {
        Error::Aborted(self.abort(reason))
    }

    /// Recorded abort reason, if any.
    #[must_use]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        lock(&self.inner.abort).reason.clone()
    }

    /// Whether the request has been aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        lock(&self.inner.abort).reason.is_some()
    }

    /// Resolves once the request is aborted.
    ///
    /// If the request resolves without ever aborting, the future never
    /// completes; callers race it against the work they want to cancel.
    pub fn aborted(&self) -> impl Future<Output = AbortReason> + Send + 'static {
        let mut rx = self.inner.abort_tx.subscribe();
        async move {
            loop {
                if let Some(reason) = rx.borrow_and_update().clone() {
                    return reason;
                }
                if rx.changed().await.is_err() {
                    // Context dropped without aborting.
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    /// Registers a one-shot abort listener.
    ///
    /// Registration after the abort already happened has no effect; the
    /// returned id is then inert.
    pub fn on_abort(&self, listener: impl FnOnce(AbortReason) + Send + 'static) -> AbortListenerId {
        let mut state = lock(&self.inner.abort);
        let id = state.next_id;
        state.next_id += 1;
        if state.reason.is_none() {
            state.listeners.push((id, Box::new(listener)));
        }
        AbortListenerId(id)
    }

    /// Removes a listener registered with [`Context::on_abort`].
    pub fn off_abort(&self, id: AbortListenerId) {
        lock(&self.inner.abort)
            .listeners
            .retain(|(listener_id, _)| *listener_id != id.0);
    }

    // ------------------------------------------------------------------
    // Scoped stores
    // ------------------------------------------------------------------

    /// View of this context bound to a chain position.
    #[must_use]
    pub fn at(&self, position: usize) -> Scope {
        Scope {
            ctx: self.clone(),
            position,
        }
    }

    fn provide_at(&self, position: usize, key: String, value: Arc<dyn Any + Send + Sync>) {
        let mut stack = lock(&self.inner.stack);
        if stack.len() <= position {
            stack.resize_with(position + 1, Frame::new);
        }
        if let Some(frame) = stack.get_mut(position) {
            frame.insert(key, value);
        }
    }

    fn inject_at(&self, position: usize, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        let stack = lock(&self.inner.stack);
        stack
            .iter()
            .take(position)
            .rev()
            .find_map(|frame| frame.get(key).cloned())
    }

    // ------------------------------------------------------------------
    // Identity attachments
    // ------------------------------------------------------------------

    /// Associates `value` with `owner` under `key`.
    ///
    /// The table holds the owner weakly: it does not keep `owner` alive,
    /// and entries whose owner has been dropped are pruned on access.
    pub fn attach<O, V>(&self, owner: &Arc<O>, key: impl Into<String>, value: V)
    where
        O: Any + Send + Sync,
        V: Any + Send + Sync,
    {
        let owner_dyn: Arc<dyn Any + Send + Sync> = owner.clone();
        let ptr = Arc::as_ptr(owner).cast::<()>() as usize;
        let mut attachments = lock(&self.inner.attachments);
        attachments.retain(|_, entry| entry.owner.strong_count() > 0);
        attachments
            .entry(ptr)
            .or_insert_with(|| AttachmentEntry {
                owner: Arc::downgrade(&owner_dyn),
                values: HashMap::new(),
            })
            .values
            .insert(key.into(), Arc::new(value));
    }

    /// Looks up a value attached to `owner` under `key`.
    #[must_use]
    pub fn attached<O, V>(&self, owner: &Arc<O>, key: &str) -> Option<Arc<V>>
    where
        O: Any + Send + Sync,
        V: Any + Send + Sync,
    {
        let ptr = Arc::as_ptr(owner).cast::<()>() as usize;
        let mut attachments = lock(&self.inner.attachments);
        attachments.retain(|_, entry| entry.owner.strong_count() > 0);
        let value = attachments.get(&ptr)?.values.get(key)?.clone();
        value.downcast::<V>().ok()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &*self.request())
            .field("abort_reason", &self.abort_reason())
            .finish_non_exhaustive()
    }
}

impl AbortSource for Context {
    fn listen(&self, notify: Box<dyn FnOnce() + Send>) {
        // An already-aborted context cancels dependents immediately.
        if self.is_aborted() {
            notify();
        } else {
            self.on_abort(move |_| notify());
        }
    }
}

/// A [`Context`] view pre-bound to a chain position.
///
/// Dereferences to the context; the position only matters for the scoped
/// store operations.
#[derive(Debug, Clone)]
pub struct Scope {
    ctx: Context,
    position: usize,
}

impl Scope {
    /// Chain position this view is bound to.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Stores a value visible to positions strictly after this one.
    pub fn provide<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.ctx.provide_at(self.position, key.into(), Arc::new(value));
    }

    /// Looks up a value provided by an earlier position, nearest first.
    #[must_use]
    pub fn inject<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        self.ctx
            .inject_at(self.position, key)
            .and_then(|value| value.downcast::<V>().ok())
    }
}

impl Deref for Scope {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use aqueduct_core::Method;
    use url::Url;

    use super::*;

    fn context() -> Context {
        let url = Url::parse("https://api.example.com/items").expect("url");
        Context::new(Request::new(Method::Get, url))
    }

    #[test]
    fn abort_first_call_wins() {
        let ctx = context();
        let first = ctx.abort("too slow");
        let second = ctx.abort(AbortReason::Canceled);

        check!(first == AbortReason::from("too slow"));
        check!(second == first);
        check!(ctx.abort_reason() == Some(first));
    }

    #[test]
    fn err_is_inert_until_used() {
        let ctx = context();
        let err = ctx.err(AbortReason::Timeout);

        check!(ctx.is_aborted());
        check!(err.is_timeout());
    }

    #[test]
    fn abort_fires_listeners_once() {
        let ctx = context();
        let count = Arc::new(Mutex::new(0_u32));

        let seen = Arc::clone(&count);
        ctx.on_abort(move |_| *lock(&seen) += 1);
        ctx.abort(AbortReason::Canceled);
        ctx.abort(AbortReason::Canceled);

        check!(*lock(&count) == 1);
    }

    #[test]
    fn listener_after_abort_never_fires() {
        let ctx = context();
        ctx.abort(AbortReason::Canceled);

        let fired = Arc::new(Mutex::new(false));
        let seen = Arc::clone(&fired);
        ctx.on_abort(move |_| *lock(&seen) = true);

        check!(!*lock(&fired));
    }

    #[test]
    fn off_abort_removes_listener() {
        let ctx = context();
        let fired = Arc::new(Mutex::new(false));

        let seen = Arc::clone(&fired);
        let id = ctx.on_abort(move |_| *lock(&seen) = true);
        ctx.off_abort(id);
        ctx.abort(AbortReason::Canceled);

        check!(!*lock(&fired));
    }

    #[tokio::test]
    async fn aborted_future_resolves_on_abort() {
        let ctx = context();
        let pending = ctx.aborted();
        ctx.abort("stop");

        check!(pending.await == AbortReason::from("stop"));
    }

    #[test]
    fn provide_is_visible_downstream_only() {
        let ctx = context();
        ctx.at(0).provide("auth", "token".to_string());

        let downstream: Option<Arc<String>> = ctx.at(2).inject("auth");
        let same: Option<Arc<String>> = ctx.at(0).inject("auth");

        check!(downstream.as_deref() == Some(&"token".to_string()));
        check!(same.is_none());
    }

    #[test]
    fn inject_prefers_nearest_provider() {
        let ctx = context();
        ctx.at(0).provide("k", 1_u32);
        ctx.at(1).provide("k", 2_u32);

        let nearest: Option<Arc<u32>> = ctx.at(3).inject("k");
        check!(nearest.as_deref() == Some(&2));
    }

    #[test]
    fn attachments_are_identity_keyed_and_weak() {
        let ctx = context();
        let owner_a = Arc::new("a".to_string());
        let owner_b = Arc::new("b".to_string());

        ctx.attach(&owner_a, "n", 1_u32);
        ctx.attach(&owner_b, "n", 2_u32);

        check!(ctx.attached::<String, u32>(&owner_a, "n").as_deref() == Some(&1));
        check!(ctx.attached::<String, u32>(&owner_b, "n").as_deref() == Some(&2));

        drop(owner_a);
        // The slot may be reused by a fresh allocation; the stale entry is
        // pruned before lookup.
        let fresh = Arc::new("a".to_string());
        check!(ctx.attached::<String, u32>(&fresh, "n").is_none());
    }

    #[test]
    fn context_is_an_abort_source() {
        let upstream = context();
        let fired = Arc::new(Mutex::new(false));

        let seen = Arc::clone(&fired);
        upstream.listen(Box::new(move || *lock(&seen) = true));
        upstream.abort(AbortReason::Canceled);

        check!(*lock(&fired));
    }
}
