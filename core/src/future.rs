//! A promise-like handle for one in-flight request.
//!
//! # Design
//! A `CancellableFuture` is created from a resolver that starts the work
//! immediately and hands back a cancellation callback. The resolver gets a
//! `Settle` handle; whichever of `fulfill`, `reject` or `cancel` reaches the
//! shared slot first wins, and every later attempt is a no-op. Cancelling
//! settles the future as `UserCancelled` at once, whether or not the
//! underlying work notices, and runs the stored callback exactly once.
//! Settling with `UserCancelled` also counts as a cancellation.
//!
//! The future is awaited like any other; `CancelHandle`s are cheap clones
//! that can cancel it from elsewhere (the paging engine keeps one).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::ApiError;

type CancelFn = Box<dyn FnOnce() + Send>;
type Outcome<T> = Result<T, ApiError>;

/// Where a future is in its lifecycle. Every state but `Pending` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Fulfilled,
    Rejected,
    Cancelled,
}

struct Slot<T> {
    state: FutureState,
    sender: Option<oneshot::Sender<Outcome<T>>>,
    on_cancel: Option<CancelFn>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: Outcome<T>) {
        let mut slot = self.lock();
        if slot.state != FutureState::Pending {
            return;
        }
        slot.state = match &outcome {
            Ok(_) => FutureState::Fulfilled,
            Err(ApiError::UserCancelled) => FutureState::Cancelled,
            Err(_) => FutureState::Rejected,
        };
        slot.on_cancel = None;
        if let Some(sender) = slot.sender.take() {
            let _ = sender.send(outcome);
        }
    }

    /// Mark cancelled and hand back the callback to run outside the lock.
    fn mark_cancelled(&self) -> Option<CancelFn> {
        let mut slot = self.lock();
        if slot.state != FutureState::Pending {
            return None;
        }
        slot.state = FutureState::Cancelled;
        if let Some(sender) = slot.sender.take() {
            let _ = sender.send(Err(ApiError::UserCancelled));
        }
        slot.on_cancel.take()
    }
}

trait Cancel: Send + Sync {
    fn cancel(&self);
    fn state(&self) -> FutureState;
}

impl<T: Send> Cancel for Shared<T> {
    fn cancel(&self) {
        if let Some(on_cancel) = self.mark_cancelled() {
            on_cancel();
        }
    }

    fn state(&self) -> FutureState {
        self.lock().state
    }
}

/// Settles the future it was issued for. Consumed by use.
///
/// Dropping it unsettled settles the future as `UserCancelled`, so a
/// resolver that gives up can never leave its future pending forever.
pub struct Settle<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Settle<T> {
    pub fn fulfill(self, value: T) {
        self.shared.settle(Ok(value));
    }

    pub fn reject(self, error: ApiError) {
        self.shared.settle(Err(error));
    }

    pub fn settle(self, outcome: Outcome<T>) {
        self.shared.settle(outcome);
    }
}

impl<T: Send + 'static> Drop for Settle<T> {
    fn drop(&mut self) {
        let _ = self.shared.mark_cancelled();
    }
}

/// Cancels the future it was cloned from.
#[derive(Clone)]
pub struct CancelHandle {
    target: Arc<dyn Cancel>,
}

impl CancelHandle {
    /// Settle as `UserCancelled` and run the cancellation callback. A no-op
    /// once the future has settled.
    pub fn cancel(&self) {
        self.target.cancel();
    }

    #[must_use]
    pub fn state(&self) -> FutureState {
        self.target.state()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == FutureState::Pending
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle").field("state", &self.state()).finish()
    }
}

/// One asynchronous result that can be cancelled from outside.
pub struct CancellableFuture<T> {
    inner: Pin<Box<dyn Future<Output = Outcome<T>> + Send>>,
    handle: CancelHandle,
}

impl<T: Send + 'static> CancellableFuture<T> {
    /// Run `resolver` now. It receives the `Settle` handle and returns the
    /// callback `cancel` should invoke.
    pub fn create<R, C>(resolver: R) -> Self
    where
        R: FnOnce(Settle<T>) -> C,
        C: FnOnce() + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                state: FutureState::Pending,
                sender: Some(sender),
                on_cancel: None,
            }),
        });

        let on_cancel = resolver(Settle {
            shared: Arc::clone(&shared),
        });
        {
            let mut slot = shared.lock();
            // A resolver that settled synchronously has nothing left to cancel.
            if slot.state == FutureState::Pending {
                slot.on_cancel = Some(Box::new(on_cancel));
            }
        }

        Self {
            inner: Box::pin(async move { receiver.await.unwrap_or(Err(ApiError::UserCancelled)) }),
            handle: CancelHandle { target: shared },
        }
    }

    /// Drive `future` on the tokio runtime; cancelling aborts the task.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self::create(|settle| {
            let task = tokio::spawn(async move { settle.settle(future.await) });
            move || task.abort()
        })
    }

    /// Already fulfilled with `value`.
    pub fn fulfilled(value: T) -> Self {
        Self::create(|settle| {
            settle.fulfill(value);
            || {}
        })
    }

    /// Already rejected with `error`.
    pub fn rejected(error: ApiError) -> Self {
        Self::create(|settle| {
            settle.reject(error);
            || {}
        })
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    #[must_use]
    pub fn state(&self) -> FutureState {
        self.handle.state()
    }

    /// Transform the fulfilled value. `f` never runs for a rejected or
    /// cancelled future.
    pub fn map<U, F>(self, f: F) -> CancellableFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let Self { inner, handle } = self;
        CancellableFuture {
            inner: Box::pin(async move { inner.await.map(f) }),
            handle,
        }
    }

    /// Chain a fallible step onto the fulfilled value.
    ///
    /// The chained future settles on its own, so its state follows the
    /// step's outcome. Cancelling it cancels `self` too.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn and_then<U, F>(self, f: F) -> CancellableFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Outcome<U> + Send + 'static,
    {
        let upstream = self.cancel_handle();
        CancellableFuture::create(move |settle| {
            let task = tokio::spawn(async move { settle.settle(self.await.and_then(f)) });
            move || {
                upstream.cancel();
                task.abort();
            }
        })
    }
}

impl<T> Future for CancellableFuture<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for CancellableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableFuture")
            .field("state", &self.handle.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn fulfilled_and_rejected_settle_immediately() {
        let ok = CancellableFuture::fulfilled(5);
        assert_eq!(ok.state(), FutureState::Fulfilled);
        assert_eq!(ok.await, Ok(5));

        let err = CancellableFuture::<u8>::rejected(ApiError::Offline("down".to_string()));
        assert_eq!(err.state(), FutureState::Rejected);
        assert_eq!(err.await, Err(ApiError::Offline("down".to_string())));
    }

    #[tokio::test]
    async fn cancel_force_settles_and_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut kept = None;
        let future = CancellableFuture::<u32>::create(|settle| {
            // Never settles on its own.
            kept = Some(settle);
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        future.cancel();
        future.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(future.state(), FutureState::Cancelled);

        // A late settle after cancellation is ignored.
        kept.take().unwrap().fulfill(9);
        assert_eq!(future.await, Err(ApiError::UserCancelled));
    }

    #[tokio::test]
    async fn cancel_after_settle_is_a_no_op() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let future = CancellableFuture::create(|settle| {
            settle.fulfill("done");
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        future.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(future.state(), FutureState::Fulfilled);
        assert_eq!(future.await, Ok("done"));
    }

    #[tokio::test]
    async fn dropped_settle_handle_reads_as_cancelled() {
        let future = CancellableFuture::<u8>::create(|settle| {
            drop(settle);
            || {}
        });
        assert_eq!(future.state(), FutureState::Cancelled);
        assert_eq!(future.await, Err(ApiError::UserCancelled));
    }

    #[tokio::test]
    async fn spawned_work_is_aborted_on_cancel() {
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&finished);
        let future = CancellableFuture::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(1u8)
        });
        let handle = future.cancel_handle();
        handle.cancel();
        assert_eq!(future.await, Err(ApiError::UserCancelled));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn map_and_and_then_skip_on_cancel_and_error() {
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        let mapped = CancellableFuture::spawn(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(2u32)
        })
        .map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v * 10
        });
        mapped.cancel();
        assert_eq!(mapped.await, Err(ApiError::UserCancelled));

        let counter = Arc::clone(&ran);
        let chained = CancellableFuture::<u32>::rejected(ApiError::MissingUser).and_then(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(v)
        });
        assert_eq!(chained.await, Err(ApiError::MissingUser));
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        let doubled = CancellableFuture::fulfilled(4u32).and_then(|v| Ok(v * 2));
        assert_eq!(doubled.await, Ok(8));
    }

    #[tokio::test]
    async fn failing_step_reports_rejected_state() {
        let chained = CancellableFuture::fulfilled(1u8).and_then(|_| Err::<u8, _>(ApiError::MissingUser));
        let handle = chained.cancel_handle();
        assert_eq!(chained.await, Err(ApiError::MissingUser));
        assert_eq!(handle.state(), FutureState::Rejected);

        let chained = CancellableFuture::fulfilled(1u8).and_then(|v| Ok(v + 1));
        let handle = chained.cancel_handle();
        assert_eq!(chained.await, Ok(2));
        assert_eq!(handle.state(), FutureState::Fulfilled);
    }

    #[tokio::test]
    async fn cancelling_chained_future_cancels_upstream() {
        let upstream = CancellableFuture::spawn(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(3u32)
        });
        let upstream_handle = upstream.cancel_handle();
        let chained = upstream.and_then(|v| Ok(v * 2));

        chained.cancel();
        assert_eq!(chained.state(), FutureState::Cancelled);
        assert_eq!(upstream_handle.state(), FutureState::Cancelled);
        assert_eq!(chained.await, Err(ApiError::UserCancelled));
    }

    #[tokio::test]
    async fn upstream_cancellation_reads_as_cancelled_downstream() {
        let upstream = CancellableFuture::spawn(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(3u32)
        });
        let upstream_handle = upstream.cancel_handle();
        let chained = upstream.and_then(|v| Ok(v * 2));
        let handle = chained.cancel_handle();

        upstream_handle.cancel();
        assert_eq!(chained.await, Err(ApiError::UserCancelled));
        assert_eq!(handle.state(), FutureState::Cancelled);
    }
}
