//! Throttled callbacks: run at most once per interval.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::error::Result;

/// Default interval between permitted executions.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Edge behaviour of a throttled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleOptions {
    /// Run the first call of a burst synchronously
    pub leading: bool,
    /// Run once more after the burst, with the latest arguments
    pub trailing: bool,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            leading: false,
            trailing: true,
        }
    }
}

struct Pending {
    generation: u64,
    task: JoinHandle<()>,
}

struct State<A> {
    /// Instant of the last permitted execution; `None` means no baseline.
    previous: Option<Instant>,
    pending: Option<Pending>,
    generation: u64,
    args: Option<A>,
}

struct Inner<A> {
    func: Box<dyn Fn(A) + Send + Sync>,
    interval: Duration,
    options: ThrottleOptions,
    runtime: Handle,
    state: Mutex<State<A>>,
}

/// A callback wrapped so that it executes at most once per `interval`.
///
/// Cloning yields another handle to the same throttle window.
pub struct Throttled<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> Throttled<A> {
    /// Wrap `func`. Must be called from within a Tokio runtime, which is
    /// used to schedule trailing executions.
    pub fn new<F>(func: F, interval: Duration, options: ThrottleOptions) -> Result<Self>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let runtime = Handle::try_current()?;
        Ok(Self {
            inner: Arc::new(Inner {
                func: Box::new(func),
                interval,
                options,
                runtime,
                state: Mutex::new(State {
                    previous: None,
                    pending: None,
                    generation: 0,
                    args: None,
                }),
            }),
        })
    }

    /// Invoke the throttled callback.
    pub fn call(&self, args: A) {
        let inner = &self.inner;
        let now = Instant::now();

        let run_now = {
            let mut state = inner.state.lock();
            if state.previous.is_none() && !inner.options.leading {
                state.previous = Some(now);
            }
            state.args = Some(args);

            let remaining = state
                .previous
                .map(|previous| inner.interval.saturating_sub(now.duration_since(previous)));

            match remaining {
                None | Some(Duration::ZERO) => {
                    if let Some(pending) = state.pending.take() {
                        pending.task.abort();
                    }
                    state.previous = Some(now);
                    state.args.take()
                }
                Some(remaining) => {
                    if inner.options.trailing && state.pending.is_none() {
                        state.generation += 1;
                        let generation = state.generation;
                        let task = Self::schedule(inner, now + remaining, generation);
                        state.pending = Some(Pending { generation, task });
                        trace!(
                            remaining_ms = super::millis(remaining),
                            "Scheduled trailing execution"
                        );
                    }
                    None
                }
            }
        };

        if let Some(args) = run_now {
            trace!("Throttled callback executing immediately");
            (inner.func)(args);
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Whether a trailing execution is currently scheduled.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    fn schedule(inner: &Arc<Inner<A>>, deadline: Instant, generation: u64) -> JoinHandle<()> {
        let task_inner = Arc::clone(inner);
        inner.runtime.spawn(async move {
            let inner = task_inner;
            tokio::time::sleep_until(deadline).await;

            let args = {
                let mut state = inner.state.lock();
                match &state.pending {
                    Some(pending) if pending.generation == generation => {}
                    _ => return,
                }
                state.pending = None;
                state.previous = if inner.options.leading {
                    Some(Instant::now())
                } else {
                    None
                };
                state.args.take()
            };

            if let Some(args) = args {
                trace!("Throttled callback executing on trailing edge");
                (inner.func)(args);
            }
        })
    }
}

/// Wrap `func` so that it executes at most once per `interval`.
pub fn throttle<A, F>(func: F, interval: Duration, options: ThrottleOptions) -> Result<Throttled<A>>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Throttled::new(func, interval, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |n: u32| sink.lock().push(n))
    }

    /// Ten calls, 30ms apart, carrying their start offset in milliseconds.
    async fn burst(throttled: &Throttled<u32>) {
        for i in 0..10u32 {
            if i > 0 {
                sleep(Duration::from_millis(30)).await;
            }
            throttled.call(i * 30);
        }
    }

    #[test]
    fn test_default_options() {
        let options = ThrottleOptions::default();
        assert!(!options.leading);
        assert!(options.trailing);
    }

    #[test]
    fn test_requires_runtime() {
        let result = Throttled::new(|_: ()| {}, DEFAULT_INTERVAL, ThrottleOptions::default());
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_only_runs_once_per_interval() {
        let (calls, func) = recorder();
        let throttled =
            throttle(func, Duration::from_millis(100), ThrottleOptions::default()).unwrap();

        throttled.call(0);
        assert!(calls.lock().is_empty(), "first call only sets the baseline");
        assert!(throttled.is_pending());

        for i in 1..10u32 {
            sleep(Duration::from_millis(30)).await;
            throttled.call(i * 30);
        }
        sleep(Duration::from_millis(500)).await;

        // Fires at 100, 220 and 340 with the newest arguments seen by then.
        assert_eq!(*calls.lock(), vec![90, 210, 270]);
        assert!(!throttled.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_and_trailing() {
        let (calls, func) = recorder();
        let options = ThrottleOptions {
            leading: true,
            trailing: true,
        };
        let throttled = throttle(func, Duration::from_millis(100), options).unwrap();

        throttled.call(0);
        assert_eq!(*calls.lock(), vec![0], "leading call runs synchronously");

        for i in 1..10u32 {
            sleep(Duration::from_millis(30)).await;
            throttled.call(i * 30);
        }
        sleep(Duration::from_millis(500)).await;

        assert_eq!(*calls.lock(), vec![0, 90, 180, 270]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_without_trailing() {
        let (calls, func) = recorder();
        let options = ThrottleOptions {
            leading: true,
            trailing: false,
        };
        let throttled = throttle(func, Duration::from_millis(100), options).unwrap();

        burst(&throttled).await;
        assert!(!throttled.is_pending());
        sleep(Duration::from_millis(500)).await;

        assert_eq!(*calls.lock(), vec![0, 120, 240]);
    }

    /// Run `calls` calls spaced `spacing` apart through a 100ms throttle and
    /// count executions once everything has settled.
    async fn executions(options: ThrottleOptions, spacing: Duration, calls: u32) -> usize {
        let (log, func) = recorder();
        let throttled = throttle(func, Duration::from_millis(100), options).unwrap();

        for i in 0..calls {
            if i > 0 {
                sleep(spacing).await;
            }
            throttled.call(i);
        }
        sleep(Duration::from_millis(500)).await;

        let executed = log.lock().len();
        executed
    }

    const MODES: [(bool, bool, usize); 4] = [
        // (leading, trailing, expected executions)
        (false, true, 3),
        (true, true, 4),
        (true, false, 3),
        (false, false, 2),
    ];

    #[tokio::test(start_paused = true)]
    async fn test_execution_count_tracks_burst_length() {
        // 270ms burst at a 100ms interval: ceil(270 / 100) = 3, plus the
        // leading call when both edges are enabled.
        for (leading, trailing, expected) in MODES {
            let options = ThrottleOptions { leading, trailing };
            let executed = executions(options, Duration::from_millis(30), 10).await;
            assert_eq!(executed, expected, "{:?}", options);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_count_at_half_interval_spacing() {
        // Calls every 50ms for 250ms: ceil(250 / 100) = 3.
        for (leading, trailing, expected) in MODES {
            let options = ThrottleOptions { leading, trailing };
            let executed = executions(options, Duration::from_millis(50), 6).await;
            assert_eq!(executed, expected, "{:?}", options);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_fire_resets_baseline_in_leading_mode() {
        let (calls, func) = recorder();
        let options = ThrottleOptions {
            leading: true,
            trailing: true,
        };
        let throttled = throttle(func, Duration::from_millis(100), options).unwrap();

        throttled.call(1);
        sleep(Duration::from_millis(10)).await;
        throttled.call(2);
        assert!(throttled.is_pending());

        // Trailing timer fires at 100ms and becomes the new baseline.
        sleep(Duration::from_millis(95)).await;
        assert_eq!(*calls.lock(), vec![1, 2]);

        sleep(Duration::from_millis(200)).await;
        throttled.call(3);
        assert_eq!(*calls.lock(), vec![1, 2, 3]);
        assert!(!throttled.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_window() {
        let (calls, func) = recorder();
        let options = ThrottleOptions {
            leading: true,
            trailing: false,
        };
        let throttled = throttle(func, Duration::from_millis(100), options).unwrap();
        let other = throttled.clone();

        throttled.call(1);
        other.call(2);

        assert_eq!(*calls.lock(), vec![1]);
        assert_eq!(other.interval(), Duration::from_millis(100));
    }
}
