//! Debounced callbacks: run once a burst of calls has gone quiet.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::error::Result;

/// Default quiet period before a debounced callback runs.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(500);

struct Pending {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    pending: Option<Pending>,
    generation: u64,
}

struct Inner<A> {
    func: Box<dyn Fn(A) + Send + Sync>,
    wait: Duration,
    immediate: bool,
    runtime: Handle,
    state: Mutex<State>,
}

/// A callback wrapped so that it runs only after calls stop for `wait`.
///
/// In immediate mode the first call of a burst runs synchronously instead,
/// and the rest of the burst is swallowed.
pub struct Debounced<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> Debounced<A> {
    /// Wrap `func`. Must be called from within a Tokio runtime.
    pub fn new<F>(func: F, wait: Duration, immediate: bool) -> Result<Self>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let runtime = Handle::try_current()?;
        Ok(Self {
            inner: Arc::new(Inner {
                func: Box::new(func),
                wait,
                immediate,
                runtime,
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// Invoke the debounced callback.
    pub fn call(&self, args: A) {
        let inner = &self.inner;
        let deadline = Instant::now() + inner.wait;

        let run_now = {
            let mut state = inner.state.lock();
            let idle = match state.pending.take() {
                Some(pending) => {
                    pending.task.abort();
                    false
                }
                None => true,
            };

            state.generation += 1;
            let generation = state.generation;

            if inner.immediate {
                let task = Self::schedule(inner, deadline, generation, None);
                state.pending = Some(Pending { generation, task });
                idle.then_some(args)
            } else {
                let task = Self::schedule(inner, deadline, generation, Some(args));
                state.pending = Some(Pending { generation, task });
                None
            }
        };

        if let Some(args) = run_now {
            trace!("Debounced callback executing on leading edge");
            (inner.func)(args);
        }
    }

    /// The configured quiet period.
    pub fn wait(&self) -> Duration {
        self.inner.wait
    }

    /// Whether a timer (execution or suppression window) is outstanding.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Spawn the timer for `generation`. With `args` it runs the callback on
    /// expiry, without it only closes the suppression window.
    fn schedule(
        inner: &Arc<Inner<A>>,
        deadline: Instant,
        generation: u64,
        args: Option<A>,
    ) -> JoinHandle<()> {
        let task_inner = Arc::clone(inner);
        inner.runtime.spawn(async move {
            let inner = task_inner;
            tokio::time::sleep_until(deadline).await;

            {
                let mut state = inner.state.lock();
                match &state.pending {
                    Some(pending) if pending.generation == generation => {}
                    _ => return,
                }
                state.pending = None;
            }

            if let Some(args) = args {
                trace!(
                    wait_ms = super::millis(inner.wait),
                    "Debounced callback executing after quiet period"
                );
                (inner.func)(args);
            }
        })
    }
}

/// Wrap `func` so that it runs once calls have stopped for `wait`.
pub fn debounce<A, F>(func: F, wait: Duration, immediate: bool) -> Result<Debounced<A>>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Debounced::new(func, wait, immediate)
}
