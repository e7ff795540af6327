//! Async building blocks for the cart synchronizer.
//!
//! - [`OrCancelExt`] races any future against a `CancellationToken`.
//! - [`KeyedDebouncer`] coalesces bursts of triggers per key into a single
//!   delayed action (last trigger wins).

mod cancel;
mod debounce;

pub use cancel::Cancelled;
pub use cancel::OrCancelExt;
pub use debounce::KeyedDebouncer;
