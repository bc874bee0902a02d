//! Execution contexts for callback dispatch

use std::sync::Arc;

/// A unit of work scheduled onto an execution context.
pub type Task = Box<dyn FnOnce() + Send>;

/// Scheduling surface of an execution context.
///
/// Implementations run submitted tasks without blocking the submitter.
/// Tasks submitted from the same thread must run in submission order.
pub trait Dispatch: Send + Sync {
    /// Schedule `task` to run on this context.
    fn dispatch(&self, task: Task);
}

/// Handle to the execution context a caller is bound to.
///
/// The pool never runs user callbacks on its own turn. Every completion is
/// forwarded to the context captured with the operation, which keeps user
/// code from re-entering the pool's serialized state. Cloning is cheap and
/// clones refer to the same underlying context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<dyn Dispatch>,
}

impl Context {
    /// Wrap a custom dispatcher.
    pub fn new(dispatch: Arc<dyn Dispatch>) -> Self {
        Self { inner: dispatch }
    }

    /// Context backed by a tokio runtime handle.
    ///
    /// Tasks are spawned onto the runtime and run concurrently with the
    /// submitter.
    pub fn tokio(handle: tokio::runtime::Handle) -> Self {
        Self {
            inner: Arc::new(TokioDispatch { handle }),
        }
    }

    /// Context backed by the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::tokio(tokio::runtime::Handle::current())
    }

    /// Context that runs tasks immediately on the invoking thread.
    ///
    /// Intended for tests and single-threaded drivers where deterministic,
    /// synchronous completion is wanted. Callbacks run on whichever thread
    /// delivers the completion.
    pub fn inline() -> Self {
        Self {
            inner: Arc::new(InlineDispatch),
        }
    }

    /// Run `task` on this context.
    pub fn run(&self, task: impl FnOnce() + Send + 'static) {
        self.inner.dispatch(Box::new(task));
    }

    /// Whether two handles refer to the same underlying context.
    #[must_use]
    pub fn same(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

struct TokioDispatch {
    handle: tokio::runtime::Handle,
}

impl Dispatch for TokioDispatch {
    fn dispatch(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }
}

struct InlineDispatch;

impl Dispatch for InlineDispatch {
    fn dispatch(&self, task: Task) {
        task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn inline_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_c = Arc::clone(&ran);
        Context::inline().run(move || ran_c.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn clones_are_the_same_context() {
        let ctx = Context::inline();
        let other = Context::inline();
        assert!(ctx.same(&ctx.clone()));
        assert!(!ctx.same(&other));
    }

    #[tokio::test]
    async fn tokio_context_dispatches_to_runtime() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let ctx = Context::current();
        ctx.run(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
    }
}
