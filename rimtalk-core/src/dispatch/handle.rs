//! Result handle for work submitted with `Dispatcher::enqueue_async`

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

/// Why a dispatched computation produced no value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatched action panicked: {0}")]
    Panicked(String),

    /// The dispatcher was dropped with the action still queued
    #[error("dispatcher dropped the action before it ran")]
    Dropped,
}

/// Resolves once the dispatched function has run on the designated thread.
///
/// Await it from async code, call [`wait`](DispatchHandle::wait) from a
/// plain worker thread, or poll it with [`try_take`](DispatchHandle::try_take)
/// from a loop that cannot block.
#[derive(Debug)]
pub struct DispatchHandle<T> {
    state: HandleState<T>,
}

#[derive(Debug)]
enum HandleState<T> {
    Ready(Option<Result<T, DispatchError>>),
    Pending(oneshot::Receiver<Result<T, DispatchError>>),
}

// No field is ever pinned in place
impl<T> Unpin for DispatchHandle<T> {}

impl<T> DispatchHandle<T> {
    pub(crate) fn ready(result: Result<T, DispatchError>) -> Self {
        Self {
            state: HandleState::Ready(Some(result)),
        }
    }

    pub(crate) fn pending(rx: oneshot::Receiver<Result<T, DispatchError>>) -> Self {
        Self {
            state: HandleState::Pending(rx),
        }
    }

    /// Whether the result was available at creation time
    pub fn is_ready(&self) -> bool {
        matches!(self.state, HandleState::Ready(Some(_)))
    }

    /// Take the result if it is available, without waiting
    pub fn try_take(&mut self) -> Option<Result<T, DispatchError>> {
        match &mut self.state {
            HandleState::Ready(result) => result.take(),
            HandleState::Pending(rx) => match rx.try_recv() {
                Ok(result) => Some(result),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(DispatchError::Dropped)),
            },
        }
    }

    /// Block the current thread until the result is available.
    ///
    /// Must not be called from the designated thread (it would wait on
    /// itself) nor from inside an async runtime.
    pub fn wait(self) -> Result<T, DispatchError> {
        match self.state {
            HandleState::Ready(result) => result.unwrap_or(Err(DispatchError::Dropped)),
            HandleState::Pending(rx) => rx.blocking_recv().unwrap_or(Err(DispatchError::Dropped)),
        }
    }
}

impl<T> Future for DispatchHandle<T> {
    type Output = Result<T, DispatchError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(DispatchError::Dropped)))
            }
            HandleState::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(DispatchError::Dropped))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Dispatcher;
    use super::*;
    use std::thread;

    #[tokio::test]
    async fn test_inline_on_designated_thread() {
        let dispatcher = Dispatcher::bound_to_current_thread();
        let handle = dispatcher.enqueue_async(|| 6 * 7);
        assert!(handle.is_ready());
        assert_eq!(handle.await, Ok(42));
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_off_thread_call_resolves_after_drain() {
        let dispatcher = Dispatcher::new();
        dispatcher.drain();

        let mut handle = thread::scope(|s| {
            s.spawn(|| dispatcher.enqueue_async(|| "colonist mood".to_string()))
                .join()
                .unwrap()
        });
        assert!(handle.try_take().is_none());
        assert_eq!(dispatcher.pending(), 1);

        dispatcher.drain();
        assert_eq!(handle.try_take(), Some(Ok("colonist mood".to_string())));
    }

    #[test]
    fn test_worker_thread_can_block_on_result() {
        let dispatcher = Dispatcher::new();
        dispatcher.drain();

        thread::scope(|s| {
            let worker = s.spawn(|| dispatcher.enqueue_async(|| 5).wait());
            while dispatcher.pending() == 0 {
                thread::yield_now();
            }
            dispatcher.drain();
            assert_eq!(worker.join().unwrap(), Ok(5));
        });
    }

    #[test]
    fn test_panic_is_reported_to_handle() {
        let dispatcher = Dispatcher::bound_to_current_thread();
        let mut handle = dispatcher.enqueue_async(|| -> u32 { panic!("no map loaded") });
        assert_eq!(
            handle.try_take(),
            Some(Err(DispatchError::Panicked("no map loaded".to_string())))
        );
    }

    #[test]
    fn test_dropped_dispatcher_resolves_dropped() {
        let dispatcher = Dispatcher::new();
        let mut handle = dispatcher.enqueue_async(|| 1);
        drop(dispatcher);
        assert_eq!(handle.try_take(), Some(Err(DispatchError::Dropped)));
    }

    #[test]
    fn test_queued_during_drain_is_not_inline() {
        let dispatcher = std::sync::Arc::new(Dispatcher::bound_to_current_thread());
        let nested = std::sync::Arc::new(std::sync::Mutex::new(None));

        {
            let d = std::sync::Arc::clone(&dispatcher);
            let nested = std::sync::Arc::clone(&nested);
            dispatcher.enqueue(move || {
                let handle = d.enqueue_async(|| 9);
                *nested.lock().unwrap() = Some(handle.is_ready());
            });
        }

        dispatcher.drain();
        assert_eq!(*nested.lock().unwrap(), Some(false));
        assert_eq!(dispatcher.pending(), 1);
    }
}
