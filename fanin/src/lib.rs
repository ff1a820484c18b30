//! # Counted callback barrier
//!
//! A `CountedCallback` joins a fixed, known number of callback-style operations into a
//! single completion signal. It is created with a target count `N` and a completion callback,
//! and handed (cloned) to each of the `N` operations. Every operation reports back exactly once
//! by calling the handle with its positional arguments. When the `N`-th call lands, the barrier
//! invokes the completion callback once with:
//!
//! - a collated error: `None` if no call passed an error as its first argument, otherwise one
//!   `CollatedError` whose message is the newline-joined messages of those errors, in the order
//!   the calls arrived
//! - every recorded argument list, in the order the calls arrived
//!
//! The barrier never schedules the operations, never short-circuits on the first error and
//! has no timeout: a barrier that receives fewer than `N` calls simply never fires.
//!
//! Handles are `Clone + Send + Sync`, so a clone can be moved into every worker thread. Calls
//! arriving after the barrier fired are handled by the configured `OverflowPolicy`; the
//! completion callback never runs twice.
//!
//! ```
//! use fanin::{create_counted_callback, CollatedError, Payload, RecordedCalls};
//! use std::sync::mpsc::channel;
//!
//! let (tx, rx) = channel();
//! let join = create_counted_callback(
//!     2,
//!     Some(move |err: Option<CollatedError>, calls: RecordedCalls<&'static str>| {
//!         tx.send((err, calls)).unwrap();
//!     }),
//! )
//! .unwrap();
//!
//! join.ok("first").unwrap();
//! join.call([Payload::error("disk full"), Payload::Value("second")]).unwrap();
//!
//! let (err, calls) = rx.recv().unwrap();
//! assert_eq!(err.unwrap().message(), "disk full");
//! assert_eq!(calls.len(), 2);
//! ```

pub mod barrier;
pub mod collate;
pub mod config;
pub mod error;
pub mod payload;

pub use barrier::{Arrival, CompletionFn, CountedCallback, RecordedCalls};
pub use collate::{collate_errors, CollatedError};
pub use config::{BarrierConfig, OverflowPolicy};
pub use error::BarrierError;
pub use payload::Payload;

/// Creates a join-handle that runs `callback` once it has been called `count` times.
///
/// Fails with `BarrierError::BadCount` when `count < 1` and with
/// `BarrierError::MissingCallback` when `callback` is `None`, in that order.
pub fn create_counted_callback<T, F>(
    count: i64,
    callback: Option<F>,
) -> Result<CountedCallback<T>, BarrierError>
where
    F: FnOnce(Option<CollatedError>, RecordedCalls<T>) + Send + 'static,
{
    CountedCallback::new(count, callback)
}
