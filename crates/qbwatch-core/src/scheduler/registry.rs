//! Task registry and tick loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::cadence::{epoch_now, Cadence};

type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

struct TaskEntry {
    name: &'static str,
    cadence: Cadence,
    in_flight: Arc<AtomicBool>,
    run: TaskFn,
}

/// Resets the in-flight flag when the invocation ends, even on panic,
/// so one bad pass cannot wedge a task forever.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Registry of periodic tasks driven by a single one-second tick.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<TaskEntry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under a stable name. The closure is called once per
    /// due tick and must produce a fresh future each time.
    pub fn register<F, Fut>(&mut self, name: &'static str, cadence: Cadence, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.push(TaskEntry {
            name,
            cadence,
            in_flight: Arc::new(AtomicBool::new(false)),
            run: Arc::new(move || Box::pin(f()) as TaskFuture),
        });
    }

    /// Dispatch every task due at `epoch_secs`. Returns how many were
    /// actually spawned (due tasks still in flight are skipped and logged).
    pub fn tick(&self, epoch_secs: u64) -> usize {
        let mut dispatched = 0;
        for entry in &self.tasks {
            if !entry.cadence.is_due(epoch_secs) {
                continue;
            }
            if entry.in_flight.swap(true, Ordering::SeqCst) {
                tracing::warn!(
                    task = entry.name,
                    "previous invocation still running, skipping tick"
                );
                continue;
            }
            dispatched += 1;
            let guard = InFlightGuard(Arc::clone(&entry.in_flight));
            let fut = (entry.run)();
            let name = entry.name;
            tokio::spawn(async move {
                let _guard = guard;
                if let Err(err) = fut.await {
                    tracing::error!(task = name, error = format!("{:#}", err), "task failed");
                }
            });
        }
        dispatched
    }

    /// Drive the tick loop until `shutdown` flips to true. In-flight tasks
    /// are then given `grace` to finish; none are aborted mid-flight.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>, grace: Duration) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(epoch_now());
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler stopping, draining in-flight tasks");
        self.drain(grace).await;
    }

    /// Wait until no task is in flight, or the grace period elapses.
    pub async fn drain(&self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let busy: Vec<&str> = self
                .tasks
                .iter()
                .filter(|t| t.in_flight.load(Ordering::SeqCst))
                .map(|t| t.name)
                .collect();
            if busy.is_empty() {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(?busy, "grace period elapsed with tasks still in flight");
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn due_tasks_are_dispatched_once_per_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        let c = Arc::clone(&counter);
        sched.register("count", Cadence::from_secs(30), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        assert_eq!(sched.tick(30), 1);
        assert_eq!(sched.tick(31), 0);
        assert_eq!(sched.tick(60), 1);
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_task_skips_its_next_tick() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        let s = Arc::clone(&started);
        sched.register("slow", Cadence::from_secs(30), move || {
            let s = Arc::clone(&s);
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(90)).await;
                Ok(())
            }
        });

        assert_eq!(sched.tick(30), 1);
        tokio::task::yield_now().await;
        // Still sleeping at the next two due ticks: both are skipped.
        assert_eq!(sched.tick(60), 0);
        assert_eq!(sched.tick(90), 0);
        tokio::time::sleep(Duration::from_secs(120)).await;
        // Finished now; the following due tick dispatches again.
        assert_eq!(sched.tick(120), 1);
        tokio::task::yield_now().await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_does_not_affect_others_or_future_ticks() {
        let ok_runs = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        sched.register("failing", Cadence::from_secs(30), || async {
            anyhow::bail!("remote exploded")
        });
        let ok = Arc::clone(&ok_runs);
        sched.register("healthy", Cadence::from_secs(30), move || {
            let ok = Arc::clone(&ok);
            async move {
                ok.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        assert_eq!(sched.tick(30), 2);
        tokio::task::yield_now().await;
        // The failure was contained; both run again next due tick.
        assert_eq!(sched.tick(60), 2);
        tokio::task::yield_now().await;
        assert_eq!(ok_runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_cadences_do_not_interfere() {
        let fast = Arc::new(AtomicUsize::new(0));
        let slow = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        let f = Arc::clone(&fast);
        sched.register("fast", Cadence::from_secs(30), move || {
            let f = Arc::clone(&f);
            async move {
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let s = Arc::clone(&slow);
        sched.register("slow", Cadence::from_minutes(1), move || {
            let s = Arc::clone(&s);
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        for t in (0..=120).step_by(30) {
            sched.tick(t);
        }
        tokio::task::yield_now().await;
        assert_eq!(fast.load(Ordering::SeqCst), 5); // 0,30,60,90,120
        assert_eq!(slow.load(Ordering::SeqCst), 3); // 0,60,120
    }

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_in_flight_tasks() {
        let mut sched = Scheduler::new();
        sched.register("napper", Cadence::from_secs(30), || async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(())
        });
        sched.tick(30);
        tokio::task::yield_now().await;
        sched.drain(Duration::from_secs(10)).await;
        // After drain, a new tick can dispatch again immediately.
        assert_eq!(sched.tick(60), 1);
    }
}
