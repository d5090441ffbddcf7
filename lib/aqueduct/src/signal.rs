//! Standalone abort signal pair.
//!
//! [`abort_pair`] is the bundled [`AbortSource`] for callers outside any
//! request: the handle side triggers, the signal side is attached to one or
//! more requests. A [`crate::Context`] is itself an abort source, so one
//! request can also cancel another directly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aqueduct_core::AbortSource;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct SignalState {
    fired: bool,
    listeners: Vec<Box<dyn FnOnce() + Send>>,
}

/// Trigger side of an abort pair.
#[derive(Clone)]
pub struct AbortHandle {
    state: Arc<Mutex<SignalState>>,
}

/// Listening side of an abort pair.
#[derive(Clone)]
pub struct AbortSignal {
    state: Arc<Mutex<SignalState>>,
}

/// Creates a connected handle/signal pair.
#[must_use]
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let state = Arc::new(Mutex::new(SignalState::default()));
    (
        AbortHandle {
            state: Arc::clone(&state),
        },
        AbortSignal { state },
    )
}

impl AbortHandle {
    /// Fires the signal. Only the first call notifies listeners.
    pub fn abort(&self) {
        let fired = {
            let mut state = lock(&self.state);
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.listeners)
        };
        for listener in fired {
            listener();
        }
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        lock(&self.state).fired
    }
}

impl AbortSource for AbortSignal {
    fn listen(&self, notify: Box<dyn FnOnce() + Send>) {
        let mut state = lock(&self.state);
        if state.fired {
            drop(state);
            notify();
        } else {
            state.listeners.push(notify);
        }
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &lock(&self.state).fired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;

    #[test]
    fn listener_fires_on_abort() {
        let (handle, signal) = abort_pair();
        let fired = Arc::new(Mutex::new(false));

        let seen = Arc::clone(&fired);
        signal.listen(Box::new(move || *lock(&seen) = true));
        check!(!*lock(&fired));

        handle.abort();
        check!(*lock(&fired));
        check!(handle.is_aborted());
    }

    #[test]
    fn listen_after_abort_fires_immediately() {
        let (handle, signal) = abort_pair();
        handle.abort();

        let fired = Arc::new(Mutex::new(false));
        let seen = Arc::clone(&fired);
        signal.listen(Box::new(move || *lock(&seen) = true));

        check!(*lock(&fired));
    }

    #[test]
    fn second_abort_is_a_no_op() {
        let (handle, signal) = abort_pair();
        let count = Arc::new(Mutex::new(0_u32));

        let seen = Arc::clone(&count);
        signal.listen(Box::new(move || *lock(&seen) += 1));
        handle.abort();
        handle.abort();

        check!(*lock(&count) == 1);
    }
}
