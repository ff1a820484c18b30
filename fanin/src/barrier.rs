use crate::collate::{collate_errors, CollatedError};
use crate::config::{BarrierConfig, OverflowPolicy};
use crate::error::BarrierError;
use crate::payload::Payload;
use log::{debug, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

// upper bound on the up-front reservation for recorded calls; larger targets grow on demand
const PREALLOC_CALLS: usize = 1024;

/// Every recorded call, in arrival order.
pub type RecordedCalls<T> = Vec<Vec<Payload<T>>>;

pub type CompletionFn<T> = Box<dyn FnOnce(Option<CollatedError>, RecordedCalls<T>) + Send>;

/// Progress reported by a single join-handle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Recorded; the barrier is still collecting.
    Pending { arrived: usize, target: usize },
    /// This call was the last one and the completion callback has run.
    Fired,
    /// The barrier had already fired and the call was dropped.
    Ignored,
}

impl Arrival {
    pub fn is_fired(&self) -> bool {
        matches!(self, Arrival::Fired)
    }
}

struct State<T> {
    calls: RecordedCalls<T>,
    // None once the barrier has fired
    callback: Option<CompletionFn<T>>,
}

struct Shared<T> {
    target: usize,
    config: BarrierConfig,
    state: Mutex<State<T>>,
}

/// A join-handle that fires its completion callback once it has been called
/// exactly `target` times.
///
/// Clones share the same barrier, so a clone can be moved into each worker
/// that reports back. Recording a call and deciding whether it completes the
/// barrier happen under one lock; the completion callback then runs outside
/// the lock, on the thread whose call reached the target, before that call
/// returns.
pub struct CountedCallback<T> {
    inner: Arc<Shared<T>>,
}

impl<T> Clone for CountedCallback<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> CountedCallback<T> {
    /// Creates a barrier waiting for `count` calls.
    ///
    /// # Errors
    /// * `BarrierError::BadCount` if `count < 1`
    /// * `BarrierError::MissingCallback` if `callback` is `None`
    pub fn new<F>(count: i64, callback: Option<F>) -> Result<Self, BarrierError>
    where
        F: FnOnce(Option<CollatedError>, RecordedCalls<T>) + Send + 'static,
    {
        Self::with_config(count, callback, BarrierConfig::default())
    }

    pub fn with_config<F>(
        count: i64,
        callback: Option<F>,
        config: BarrierConfig,
    ) -> Result<Self, BarrierError>
    where
        F: FnOnce(Option<CollatedError>, RecordedCalls<T>) + Send + 'static,
    {
        if count <= 0 {
            return Err(BarrierError::BadCount(count));
        }
        let callback: CompletionFn<T> = match callback {
            Some(f) => Box::new(f),
            None => {
                return Err(BarrierError::MissingCallback {
                    repr: "None".to_string(),
                })
            }
        };
        let target = usize::try_from(count).map_err(|_| BarrierError::BadCount(count))?;
        debug!("{}: waiting for {} calls", config.label(), target);
        Ok(Self {
            inner: Arc::new(Shared {
                target,
                config,
                state: Mutex::new(State {
                    calls: Vec::with_capacity(target.min(PREALLOC_CALLS)),
                    callback: Some(callback),
                }),
            }),
        })
    }

    pub fn target(&self) -> usize {
        self.inner.target
    }

    pub fn label(&self) -> &str {
        self.inner.config.label()
    }

    /// Number of calls recorded so far.
    pub fn arrived(&self) -> usize {
        let state = self.inner.state.lock();
        if state.callback.is_none() {
            return self.inner.target;
        }
        state.calls.len()
    }

    pub fn is_complete(&self) -> bool {
        self.inner.state.lock().callback.is_none()
    }

    /// Records one call with the given positional arguments. The call that
    /// brings the count to the target collates the errors and runs the
    /// completion callback before returning `Arrival::Fired`.
    pub fn call<I>(&self, args: I) -> Result<Arrival, BarrierError>
    where
        I: IntoIterator<Item = Payload<T>>,
    {
        let target = self.inner.target;
        let mut state = self.inner.state.lock();
        if state.callback.is_none() {
            drop(state);
            return self.on_overflow();
        }
        state.calls.push(args.into_iter().collect());
        let arrived = state.calls.len();
        if arrived < target {
            return Ok(Arrival::Pending { arrived, target });
        }
        let callback = state.callback.take();
        let calls = std::mem::take(&mut state.calls);
        drop(state);

        let collated = collate_errors(&calls);
        debug!(
            "{}: all {} calls arrived, {} with errors",
            self.label(),
            calls.len(),
            collated.as_ref().map_or(0, CollatedError::error_count)
        );
        if let Some(callback) = callback {
            callback(collated, calls);
        }
        Ok(Arrival::Fired)
    }

    /// Records a call with no arguments.
    pub fn call0(&self) -> Result<Arrival, BarrierError> {
        self.call(std::iter::empty())
    }

    /// Records a successful call: `(Absent, value)`.
    pub fn ok(&self, value: T) -> Result<Arrival, BarrierError> {
        self.call([Payload::Absent, Payload::Value(value)])
    }

    /// Records a failed call: `(Error(e))`.
    pub fn err<E: fmt::Display>(&self, e: E) -> Result<Arrival, BarrierError> {
        self.call([Payload::error(e)])
    }

    pub fn finish<E: fmt::Display>(&self, result: Result<T, E>) -> Result<Arrival, BarrierError> {
        match result {
            Ok(value) => self.ok(value),
            Err(e) => self.err(e),
        }
    }

    fn on_overflow(&self) -> Result<Arrival, BarrierError> {
        match self.inner.config.overflow {
            OverflowPolicy::Ignore => {
                warn!(
                    "{}: call after completion ignored (target {})",
                    self.label(),
                    self.inner.target
                );
                Ok(Arrival::Ignored)
            }
            OverflowPolicy::Reject => Err(BarrierError::ReentrantCompletion {
                label: self.label().to_string(),
                target: self.inner.target,
            }),
        }
    }
}

impl<T> fmt::Debug for CountedCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountedCallback")
            .field("label", &self.label())
            .field("target", &self.target())
            .field("arrived", &self.arrived())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    type Fired<T> = Arc<StdMutex<Vec<(Option<CollatedError>, RecordedCalls<T>)>>>;

    fn recorder<T: Send + 'static>() -> (
        Fired<T>,
        impl FnOnce(Option<CollatedError>, RecordedCalls<T>) + Send + 'static,
    ) {
        let fired: Fired<T> = Arc::new(StdMutex::new(Vec::new()));
        let sink = fired.clone();
        let callback = move |err: Option<CollatedError>, calls: RecordedCalls<T>| {
            sink.lock().unwrap().push((err, calls))
        };
        (fired, callback)
    }

    fn v(s: &str) -> Payload<String> {
        Payload::Value(s.to_string())
    }

    fn e(s: &str) -> Payload<String> {
        Payload::Error(s.to_string())
    }

    #[test]
    fn test_count_one_fires_immediately() {
        let (fired, callback) = recorder();
        let cb = CountedCallback::new(1, Some(callback)).unwrap();
        assert_eq!(cb.call([v("hello"), v("world!")]).unwrap(), Arrival::Fired);

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].0.is_none());
        assert_eq!(fired[0].1, vec![vec![v("hello"), v("world!")]]);
    }

    #[test]
    fn test_fires_after_correct_number_of_calls() {
        let (fired, callback) = recorder();
        let cb = CountedCallback::new(3, Some(callback)).unwrap();
        for j in 0..3 {
            let arrival = cb
                .call([v(&format!("hello{}", j)), v(&format!("world!{}", j))])
                .unwrap();
            if j < 2 {
                assert_eq!(arrival, Arrival::Pending { arrived: j + 1, target: 3 });
                assert!(fired.lock().unwrap().is_empty());
            } else {
                assert!(arrival.is_fired());
            }
        }

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].0.is_none());
        let calls = &fired[0].1;
        assert_eq!(calls.len(), 3);
        for (k, args) in calls.iter().enumerate() {
            assert_eq!(args.len(), 2);
            assert_eq!(args[0], v(&format!("hello{}", k)));
            assert_eq!(args[1], v(&format!("world!{}", k)));
        }
    }

    #[test]
    fn test_no_params() {
        let (fired, callback) = recorder::<String>();
        let cb = CountedCallback::new(1, Some(callback)).unwrap();
        cb.call0().unwrap();

        let fired = fired.lock().unwrap();
        assert!(fired[0].0.is_none());
        assert_eq!(fired[0].1.len(), 1);
        assert!(fired[0].1[0].is_empty());
    }

    #[test]
    fn test_single_error_count_one() {
        let (fired, callback) = recorder::<String>();
        let cb = CountedCallback::new(1, Some(callback)).unwrap();
        cb.call([e("error 1")]).unwrap();

        let fired = fired.lock().unwrap();
        assert_eq!(fired[0].0.as_ref().unwrap().message(), "error 1");
        assert_eq!(fired[0].1, vec![vec![e("error 1")]]);
    }

    #[test]
    fn test_single_error_count_three() {
        let (fired, callback) = recorder();
        let cb = CountedCallback::new(3, Some(callback)).unwrap();
        cb.call([e("error 1")]).unwrap();
        cb.call0().unwrap();
        cb.call([Payload::Absent, v("hello")]).unwrap();

        let fired = fired.lock().unwrap();
        assert_eq!(fired[0].0.as_ref().unwrap().message(), "error 1");
        let calls = &fired[0].1;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].len(), 1);
        assert!(calls[0][0].is_error());
        assert!(calls[1].is_empty());
        assert_eq!(calls[2].len(), 2);
        assert!(calls[2][0].is_absent());
        assert_eq!(calls[2][1], v("hello"));
    }

    #[test]
    fn test_multiple_errors_count_three() {
        let (fired, callback) = recorder();
        let cb = CountedCallback::new(3, Some(callback)).unwrap();
        cb.call([e("error 1")]).unwrap();
        cb.call0().unwrap();
        cb.call([e("error 2"), v("hello")]).unwrap();

        let fired = fired.lock().unwrap();
        let err = fired[0].0.as_ref().unwrap();
        assert_eq!(err.message(), "error 1\nerror 2");
        assert_eq!(err.error_count(), 2);
        let calls = &fired[0].1;
        assert!(calls[0][0].is_error());
        assert!(calls[1].is_empty());
        assert!(calls[2][0].is_error());
        assert_eq!(calls[2][1], v("hello"));
    }

    #[test]
    fn test_bad_count() {
        for count in [0, -1, -10] {
            let (_, callback) = recorder::<String>();
            let err = CountedCallback::new(count, Some(callback)).unwrap_err();
            assert_eq!(err, BarrierError::BadCount(count));
            assert_eq!(err.to_string(), "Callback count must be >= 1");
        }
    }

    #[test]
    fn test_missing_callback() {
        let none: Option<fn(Option<CollatedError>, RecordedCalls<String>)> = None;
        let err = CountedCallback::new(1, none).unwrap_err();
        assert!(matches!(err, BarrierError::MissingCallback { ref repr } if repr == "None"));
        assert_eq!(
            err.to_string(),
            "Callback must not be undefined or null. Value specified was None."
        );
    }

    #[test]
    fn test_bad_count_checked_first() {
        let none: Option<fn(Option<CollatedError>, RecordedCalls<String>)> = None;
        assert_eq!(
            CountedCallback::new(0, none).unwrap_err(),
            BarrierError::BadCount(0)
        );
    }

    #[test]
    fn test_overflow_ignored() {
        let (fired, callback) = recorder();
        let cb = CountedCallback::new(1, Some(callback)).unwrap();
        assert!(cb.call([v("a")]).unwrap().is_fired());
        assert_eq!(cb.call([v("b")]).unwrap(), Arrival::Ignored);
        assert_eq!(cb.call0().unwrap(), Arrival::Ignored);

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, vec![vec![v("a")]]);
        assert_eq!(cb.arrived(), 1);
    }

    #[test]
    fn test_overflow_rejected() {
        let (fired, callback) = recorder::<String>();
        let config = BarrierConfig::default()
            .with_label("strict")
            .with_overflow(OverflowPolicy::Reject);
        let cb = CountedCallback::with_config(2, Some(callback), config).unwrap();
        cb.call0().unwrap();
        cb.call0().unwrap();
        assert_eq!(
            cb.call0().unwrap_err(),
            BarrierError::ReentrantCompletion {
                label: "strict".to_string(),
                target: 2
            }
        );
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reentrant_call_from_callback() {
        let slot: Arc<StdMutex<Option<CountedCallback<u32>>>> = Arc::new(StdMutex::new(None));
        let inner = slot.clone();
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        let cb = CountedCallback::new(
            1,
            Some(move |_err: Option<CollatedError>, _calls: RecordedCalls<u32>| {
                let handle = inner.lock().unwrap().take().unwrap();
                *seen2.lock().unwrap() = Some(handle.ok(9));
            }),
        )
        .unwrap();
        *slot.lock().unwrap() = Some(cb.clone());
        assert!(cb.ok(1).unwrap().is_fired());
        assert_eq!(*seen.lock().unwrap(), Some(Ok(Arrival::Ignored)));
    }

    #[test]
    fn test_convenience_calls() {
        let (fired, callback) = recorder::<u32>();
        let cb = CountedCallback::new(4, Some(callback)).unwrap();
        cb.ok(1).unwrap();
        cb.err("boom").unwrap();
        cb.finish(Ok::<u32, String>(3)).unwrap();
        cb.finish(Err::<u32, _>("bang")).unwrap();

        let fired = fired.lock().unwrap();
        assert_eq!(fired[0].0.as_ref().unwrap().message(), "boom\nbang");
        assert_eq!(
            fired[0].1,
            vec![
                vec![Payload::Absent, Payload::Value(1)],
                vec![Payload::Error("boom".to_string())],
                vec![Payload::Absent, Payload::Value(3)],
                vec![Payload::Error("bang".to_string())],
            ]
        );
    }

    #[test]
    fn test_huge_count_partial_fill() {
        let (fired, callback) = recorder::<u8>();
        let cb = CountedCallback::new(i64::MAX, Some(callback)).unwrap();
        assert_eq!(cb.target(), i64::MAX as usize);
        for i in 0..5u8 {
            assert_eq!(
                cb.ok(i).unwrap(),
                Arrival::Pending {
                    arrived: i as usize + 1,
                    target: i64::MAX as usize
                }
            );
        }
        assert_eq!(cb.arrived(), 5);
        assert!(!cb.is_complete());
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_large_count_fires_past_reservation() {
        let target = PREALLOC_CALLS + 10;
        let (fired, callback) = recorder::<usize>();
        let cb = CountedCallback::new(target as i64, Some(callback)).unwrap();
        for i in 0..target - 1 {
            cb.ok(i).unwrap();
        }
        assert_eq!(cb.arrived(), target - 1);
        assert!(!cb.is_complete());
        assert!(cb.ok(target - 1).unwrap().is_fired());
        assert!(cb.is_complete());
        assert_eq!(cb.arrived(), target);

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1.len(), target);
        assert_eq!(fired[0].1[target - 1][1], Payload::Value(target - 1));
    }

    #[test]
    fn test_progress_accessors() {
        let (_, callback) = recorder::<u32>();
        let cb = CountedCallback::new(2, Some(callback)).unwrap();
        assert_eq!(cb.target(), 2);
        assert_eq!(cb.arrived(), 0);
        assert!(!cb.is_complete());
        cb.ok(1).unwrap();
        assert_eq!(cb.arrived(), 1);
        cb.ok(2).unwrap();
        assert_eq!(cb.arrived(), 2);
        assert!(cb.is_complete());
        assert_eq!(cb.label(), "counted-callback");
        assert_eq!(
            format!("{:?}", cb),
            "CountedCallback { label: \"counted-callback\", target: 2, arrived: 2 }"
        );
    }
}
