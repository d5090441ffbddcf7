//! External cancellation interop.

/// A source of cancellation a request can subscribe to.
///
/// Anything that can invoke a callback when it fires qualifies: the bundled
/// signal pair, another request's context, or an adapter over a
/// foreign cancellation primitive. The terminal pipeline step wires every
/// source attached to a request to that request's abort.
///
/// `listen` registers a one-shot callback. If the source can no longer fire
/// (e.g. its handle was dropped), the callback may simply never be invoked.
pub trait AbortSource: Send + Sync + 'static {
    /// Registers a callback invoked when the source fires.
    fn listen(&self, notify: Box<dyn FnOnce() + Send>);
}
