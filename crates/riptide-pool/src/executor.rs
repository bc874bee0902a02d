//! Single-writer combiner serializing state mutations.
//!
//! Every pool mutation is an action submitted to an [`Executor`]. Actions
//! are queued and drained by whichever submitting thread wins the drain
//! flag, so they never run concurrently and no submitter ever blocks on
//! another's turn. User-visible work produced by an action (callbacks,
//! connector calls) is collected into [`Completions`] and run by the
//! drainer after the state lock is released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

type Action<S> = Box<dyn FnOnce(&mut S, &mut Completions) + Send>;

/// Side effects deferred until the state lock is released.
pub(crate) struct Completions {
    tasks: Vec<Box<dyn FnOnce() + Send>>,
}

impl Completions {
    fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Queue `task` to run once the current action's state mutation is done.
    pub(crate) fn defer(&mut self, task: impl FnOnce() + Send + 'static) {
        self.tasks.push(Box::new(task));
    }

    fn run(self) {
        for task in self.tasks {
            task();
        }
    }
}

/// Combiner executor owning the serialized state `S`.
pub(crate) struct Executor<S> {
    state: Mutex<S>,
    queue: Mutex<VecDeque<Action<S>>>,
    draining: AtomicBool,
}

impl<S: Send> Executor<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// Submit an action for serialized execution.
    ///
    /// If no other thread is draining, the submitter drains the queue
    /// itself, running queued actions in order. Otherwise the action is
    /// left for the current drainer and this call returns immediately.
    /// Re-entrant submission from within a deferred completion is safe:
    /// the action is picked up later in the same drain.
    pub(crate) fn submit(&self, action: impl FnOnce(&mut S, &mut Completions) + Send + 'static) {
        self.queue.lock().push_back(Box::new(action));
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // The active drainer will see our action.
                return;
            }
            loop {
                let next = self.queue.lock().pop_front();
                let Some(action) = next else { break };
                let mut completions = Completions::new();
                {
                    let mut state = self.state.lock();
                    action(&mut state, &mut completions);
                }
                completions.run();
            }
            self.draining.store(false, Ordering::Release);
            // An action may have been queued between the final pop and the
            // flag release; if so, try to become the drainer again.
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }
}
