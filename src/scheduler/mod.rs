use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Context provided to a deferred task when it runs
#[derive(Debug, Clone)]
pub struct Context {
    pub task_name: &'static str,
    pub run_id: u64,
    /// Notifications folded into this run
    pub coalesced: u64,
}

/// Work that runs once after a burst of notifications goes quiet
#[async_trait::async_trait]
pub trait DeferredTask: Send + Sync {
    /// Task name for logging
    fn name(&self) -> &'static str;

    /// Execute the task
    async fn execute(&self, ctx: Context) -> Result<()>;
}

enum State {
    Idle,
    Armed {
        generation: u64,
        coalesced: u64,
        timer: JoinHandle<()>,
    },
}

struct Inner {
    state: State,
    generation: u64,
    runs: u64,
}

/// Debouncer runs its task once, `delay` after the last of a burst of notifications.
///
/// Every notification restarts the timer with the full delay. A zero delay
/// still runs the task on a spawned tokio task, never inside `notify`. Once a
/// timer has fired and the task has started it is no longer cancellable.
pub struct Debouncer {
    delay: Duration,
    runtime: Handle,
    task: Arc<dyn DeferredTask>,
    inner: Mutex<Inner>,
}

impl Debouncer {
    pub fn new(delay: Duration, runtime: Handle, task: Arc<dyn DeferredTask>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            runtime,
            task,
            inner: Mutex::new(Inner {
                state: State::Idle,
                generation: 0,
                runs: 0,
            }),
        })
    }

    /// Whether a run is pending.
    pub fn is_armed(&self) -> bool {
        matches!(self.lock().state, State::Armed { .. })
    }

    /// Arms the timer, or restarts it if already armed.
    pub fn notify(self: &Arc<Self>) {
        let mut inner = self.lock();
        inner.generation += 1;
        let generation = inner.generation;

        let coalesced = match std::mem::replace(&mut inner.state, State::Idle) {
            State::Armed {
                timer, coalesced, ..
            } => {
                timer.abort();
                coalesced + 1
            }
            State::Idle => {
                tracing::debug!(task = self.task.name(), delay = ?self.delay, "Armed deferred task");
                1
            }
        };

        let this = Arc::clone(self);
        let delay = self.delay;
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire(generation).await;
        });

        inner.state = State::Armed {
            generation,
            coalesced,
            timer,
        };
    }

    /// Runs a pending task now instead of waiting for its timer.
    /// Returns false if nothing was pending.
    pub async fn flush(&self) -> Result<bool> {
        let ctx = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.state, State::Idle) {
                State::Idle => return Ok(false),
                State::Armed {
                    timer, coalesced, ..
                } => {
                    timer.abort();
                    self.next_context(&mut inner, coalesced)
                }
            }
        };

        self.task.execute(ctx).await?;
        Ok(true)
    }

    async fn fire(&self, generation: u64) {
        let ctx = {
            let mut inner = self.lock();
            let coalesced = match &inner.state {
                State::Armed {
                    generation: current,
                    coalesced,
                    ..
                } if *current == generation => *coalesced,
                // Superseded by a newer notification or a flush.
                _ => return,
            };
            inner.state = State::Idle;
            self.next_context(&mut inner, coalesced)
        };

        let (task, run_id) = (ctx.task_name, ctx.run_id);
        if let Err(e) = self.task.execute(ctx).await {
            tracing::error!(task, run_id, error = %e, "Deferred task failed");
        }
    }

    fn next_context(&self, inner: &mut Inner, coalesced: u64) -> Context {
        inner.runs += 1;
        Context {
            task_name: self.task.name(),
            run_id: inner.runs,
            coalesced,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTask {
        runs: AtomicUsize,
        last_coalesced: AtomicU64,
        fail: AtomicBool,
    }

    #[async_trait::async_trait]
    impl DeferredTask for CountingTask {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn execute(&self, ctx: Context) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.last_coalesced.store(ctx.coalesced, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::InvalidPayload("forced failure".into()));
            }
            Ok(())
        }
    }

    fn debouncer(delay_ms: u64) -> (Arc<Debouncer>, Arc<CountingTask>) {
        let task = Arc::new(CountingTask::default());
        let debouncer = Debouncer::new(
            Duration::from_millis(delay_ms),
            Handle::current(),
            task.clone(),
        );
        (debouncer, task)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_is_deferred() {
        let (debouncer, task) = debouncer(0);

        debouncer.notify();
        debouncer.notify();
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_armed());

        sleep_ms(1).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        assert_eq!(task.last_coalesced.load(Ordering::SeqCst), 2);
        assert!(!debouncer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once() {
        let (debouncer, task) = debouncer(100);

        for _ in 0..10 {
            debouncer.notify();
        }
        sleep_ms(99).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        sleep_ms(100).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        assert_eq!(task.last_coalesced.load(Ordering::SeqCst), 10);

        sleep_ms(500).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_restarts_timer() {
        let (debouncer, task) = debouncer(100);

        debouncer.notify();
        sleep_ms(60).await;
        debouncer.notify();
        sleep_ms(60).await;
        // 120ms after the first notification, but only 60ms after the last.
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        sleep_ms(60).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush() -> Result<()> {
        let (debouncer, task) = debouncer(1000);

        assert!(!debouncer.flush().await?);

        debouncer.notify();
        assert!(debouncer.flush().await?);
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_armed());

        // The cancelled timer must not run the task again.
        sleep_ms(2000).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.flush().await?);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_returns_to_idle() {
        let (debouncer, task) = debouncer(10);
        task.fail.store(true, Ordering::SeqCst);

        debouncer.notify();
        sleep_ms(20).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_armed());

        task.fail.store(false, Ordering::SeqCst);
        debouncer.notify();
        sleep_ms(20).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
        assert_eq!(task.last_coalesced.load(Ordering::SeqCst), 1);
    }
}
