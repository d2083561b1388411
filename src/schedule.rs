use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Cancel handle for a spawned timer task. Dropping it leaves the task
/// running; call [`TaskHandle::cancel`] to stop it.
#[derive(Debug)]
pub struct TaskHandle(JoinHandle<()>);

impl TaskHandle {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }

    pub fn spawn_on<F>(runtime: &Handle, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(runtime.spawn(future))
    }

    pub fn cancel(&self) {
        self.0.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

/// Trailing-edge debounce: each `schedule` cancels the pending run and
/// starts the quiet period again.
///
/// Runs are spawned on the runtime the debouncer was created in, so
/// `schedule` may be called from threads outside it (window event loops).
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    runtime: Handle,
    pending: Option<TaskHandle>,
}

impl Debouncer {
    /// Must be called from within a tokio runtime.
    pub fn new(delay: Duration) -> Self {
        Self::with_runtime(delay, Handle::current())
    }

    pub fn with_runtime(delay: Duration, runtime: Handle) -> Self {
        Self {
            delay,
            runtime,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule<F, Fut>(&mut self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(TaskHandle::spawn_on(&self.runtime, async move {
            tokio::time::sleep(delay).await;
            f().await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `f` every `period`, starting one period from now. Runs are spawned
/// and not awaited, so a slow run can overlap the next one.
pub fn spawn_periodic<F, Fut>(period: Duration, f: F) -> TaskHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    TaskHandle::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            tokio::spawn(f());
        }
    })
}
