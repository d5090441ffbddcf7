//! Bundled middleware flows.
//!
//! Every middleware here is an ordinary [`Flow`](crate::Flow) built only on
//! the public handler primitives; nothing in the engine special-cases them.

mod logging;
mod retry;
mod timeout;

pub use logging::logging;
pub use retry::retry;
pub use timeout::timeout;
