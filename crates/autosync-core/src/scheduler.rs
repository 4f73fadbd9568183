//! Pause-aware registry of named, cancellable timers
//!
//! Every timer is a tokio task keyed by a caller-chosen string. Registering a
//! key that is already active cancels the previous timer first, which makes
//! re-registration the debounce primitive.
//!
//! Callbacks run in their own task. A failing or panicking callback is
//! logged and never takes the timer down with it, and cancelling a timer
//! never aborts a callback that is already running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::Result;

struct TimerEntry {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    timers: Mutex<HashMap<String, TimerEntry>>,
    paused: AtomicBool,
    next_id: AtomicU64,
}

impl Registry {
    fn timers(&self) -> MutexGuard<'_, HashMap<String, TimerEntry>> {
        // A poisoned map is still structurally valid
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove `key` only if it still belongs to timer `id`
    fn remove_if_current(&self, key: &str, id: u64) {
        let mut timers = self.timers();
        if timers.get(key).is_some_and(|entry| entry.id == id) {
            timers.remove(key);
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(|e| e.into_inner());
        for (_, entry) in timers.drain() {
            entry.handle.abort();
        }
    }
}

/// Named timer registry shared by the debouncer and the poller.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct Scheduler {
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("active", &self.active_keys())
            .field("paused", &self.is_paused())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once after `delay`, replacing any timer under `key`.
    ///
    /// The timer is removed when it fires. If the scheduler is paused at that
    /// moment the callback is dropped, not deferred.
    pub fn schedule_once<F, Fut>(&self, key: impl Into<String>, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let key = key.into();
        let weak = Arc::downgrade(&self.registry);
        let task_key = key.clone();

        self.register(key, move |id| async move {
            tokio::time::sleep(delay).await;

            let Some(registry) = weak.upgrade() else {
                return;
            };
            registry.remove_if_current(&task_key, id);

            if registry.paused.load(Ordering::SeqCst) {
                tracing::debug!(key = %task_key, "Scheduler paused, dropping one-shot timer");
                return;
            }
            drop(registry);

            spawn_callback(task_key, callback());
        });
    }

    /// Run `callback` repeatedly, sleeping a fresh uniformly random delay in
    /// `[min_delay, max_delay]` before each invocation.
    ///
    /// The timer re-arms right after each fire, whether the callback fails
    /// or the scheduler is paused (a paused fire skips the callback only).
    pub fn schedule_recurring<F, Fut>(
        &self,
        key: impl Into<String>,
        min_delay: Duration,
        max_delay: Duration,
        callback: F,
    ) where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let key = key.into();
        let weak = Arc::downgrade(&self.registry);
        let task_key = key.clone();

        self.register(key, move |_id| async move {
            loop {
                tokio::time::sleep(sample_delay(min_delay, max_delay)).await;

                let Some(registry) = weak.upgrade() else {
                    return;
                };
                let paused = registry.paused.load(Ordering::SeqCst);
                drop(registry);

                if paused {
                    tracing::trace!(key = %task_key, "Scheduler paused, skipping recurring fire");
                    continue;
                }

                spawn_callback(task_key.clone(), callback());
            }
        });
    }

    /// Cancel the timer under `key`. Unknown keys are ignored.
    pub fn cancel(&self, key: &str) {
        if let Some(entry) = self.registry.timers().remove(key) {
            entry.handle.abort();
            tracing::debug!(key = %key, "Timer cancelled");
        }
    }

    /// Cancel every active timer
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.registry.timers().drain().collect();
        for (_, entry) in drained {
            entry.handle.abort();
        }
    }

    /// Stop timers from invoking callbacks until [`resume`](Self::resume)
    pub fn pause(&self) {
        self.registry.paused.store(true, Ordering::SeqCst);
        tracing::debug!("Scheduler paused");
    }

    pub fn resume(&self) {
        self.registry.paused.store(false, Ordering::SeqCst);
        tracing::debug!("Scheduler resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.registry.paused.load(Ordering::SeqCst)
    }

    /// Pause for the lifetime of the returned guard.
    ///
    /// The guard resumes on drop only if this call did the pausing, so an
    /// outer pause is left in place.
    pub fn pause_scope(&self) -> PauseGuard {
        let was_paused = self.registry.paused.swap(true, Ordering::SeqCst);
        PauseGuard {
            scheduler: self.clone(),
            resume_on_drop: !was_paused,
        }
    }

    /// Number of armed timers
    pub fn active_count(&self) -> usize {
        self.registry.timers().len()
    }

    /// Keys of armed timers, sorted
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.registry.timers().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.registry.timers().contains_key(key)
    }

    fn register<T, Fut>(&self, key: String, task: T)
    where
        T: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);

        // Spawn under the lock so a zero-delay timer cannot fire before it is registered
        let mut timers = self.registry.timers();
        let handle = tokio::spawn(task(id));
        if let Some(previous) = timers.insert(key.clone(), TimerEntry { id, handle }) {
            previous.handle.abort();
            tracing::trace!(key = %key, "Replaced active timer");
        }
    }
}

/// Scoped pause returned by [`Scheduler::pause_scope`]
#[must_use = "the scheduler resumes as soon as the guard is dropped"]
pub struct PauseGuard {
    scheduler: Scheduler,
    resume_on_drop: bool,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        if self.resume_on_drop {
            self.scheduler.resume();
        }
    }
}

fn sample_delay(min: Duration, max: Duration) -> Duration {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    if low == high {
        return low;
    }
    rand::thread_rng().gen_range(low..=high)
}

fn spawn_callback<Fut>(key: String, callback: Fut)
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let handle = tokio::spawn(callback);
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(key = %key, error = %e, "Scheduled task failed"),
            Err(e) if e.is_panic() => tracing::error!(key = %key, "Scheduled task panicked"),
            Err(_) => {}
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{Instant, sleep};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(
        count: &Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<Result<()>> + Send + Sync + 'static {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once_and_is_removed() {
        let scheduler = Scheduler::new();
        let fired = counter();

        scheduler.schedule_once("save", Duration::from_secs(5), bump(&fired));
        assert_eq!(scheduler.active_keys(), vec!["save".to_string()]);

        sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reregistering_key_replaces_previous_timer() {
        let scheduler = Scheduler::new();
        let first = counter();
        let second = counter();
        let start = Instant::now();

        scheduler.schedule_once("debounce", Duration::from_secs(10), bump(&first));
        sleep(Duration::from_secs(6)).await;
        scheduler.schedule_once("debounce", Duration::from_secs(10), bump(&second));
        assert_eq!(scheduler.active_count(), 1);

        sleep(Duration::from_secs(9)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fired_while_paused_is_dropped() {
        let scheduler = Scheduler::new();
        let fired = counter();

        scheduler.schedule_once("save", Duration::from_secs(5), bump(&fired));
        scheduler.pause();

        sleep(Duration::from_secs(10)).await;
        scheduler.resume();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_rearms_while_paused_and_keeps_schedule() {
        let scheduler = Scheduler::new();
        let fired = counter();
        let period = Duration::from_secs(10);

        scheduler.schedule_recurring("poll", period, period, bump(&fired));
        scheduler.pause();

        // Fires at 10s and 20s are skipped
        sleep(Duration::from_secs(25)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_active("poll"));

        scheduler.resume();

        // Next fire is at 30s, not immediately on resume
        sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_delay_stays_within_bounds() {
        let scheduler = Scheduler::new();
        let fired = counter();

        scheduler.schedule_recurring(
            "poll",
            Duration::from_secs(5),
            Duration::from_secs(8),
            bump(&fired),
        );

        sleep(Duration::from_millis(4_900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(3_200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Ten more cycles take between 50s and 80s
        sleep(Duration::from_secs(80)).await;
        let count = fired.load(Ordering::SeqCst);
        assert!((11..=17).contains(&count), "unexpected fire count {count}");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_callback_does_not_stop_recurring_timer() {
        let scheduler = Scheduler::new();
        let attempts = counter();
        let seen = attempts.clone();

        scheduler.schedule_recurring(
            "poll",
            Duration::from_secs(1),
            Duration::from_secs(1),
            move || {
                seen.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(Error::TaskFailed {
                        key: "poll".into(),
                        message: "boom".into(),
                    })
                }
            },
        );

        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(scheduler.is_active("poll"));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_does_not_stop_recurring_timer() {
        let scheduler = Scheduler::new();
        let attempts = counter();
        let seen = attempts.clone();

        scheduler.schedule_recurring(
            "poll",
            Duration::from_secs(1),
            Duration::from_secs(1),
            move || {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        panic!("first poll explodes");
                    }
                    Ok(())
                }
            },
        );

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_one_shot_is_still_removed() {
        let scheduler = Scheduler::new();

        scheduler.schedule_once("save", Duration::from_secs(1), || async {
            Err(Error::InvalidConfig {
                message: "nope".into(),
            })
        });

        sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_can_rearm_its_own_key() {
        let scheduler = Scheduler::new();
        let fired = counter();
        let inner_scheduler = scheduler.clone();
        let inner_fired = fired.clone();

        scheduler.schedule_once("retry", Duration::from_secs(1), move || async move {
            inner_fired.fetch_add(1, Ordering::SeqCst);
            inner_scheduler.schedule_once("retry", Duration::from_secs(1), bump(&inner_fired));
            Ok(())
        });

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_active("retry"));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_cancel_all() {
        let scheduler = Scheduler::new();
        let fired = counter();

        scheduler.cancel("never-registered");

        scheduler.schedule_once("a", Duration::from_secs(1), bump(&fired));
        scheduler.schedule_once("b", Duration::from_secs(1), bump(&fired));
        scheduler.schedule_recurring(
            "c",
            Duration::from_secs(1),
            Duration::from_secs(2),
            bump(&fired),
        );
        assert_eq!(scheduler.active_keys(), vec!["a", "b", "c"]);

        scheduler.cancel("a");
        assert_eq!(scheduler.active_keys(), vec!["b", "c"]);

        scheduler.cancel_all();
        assert_eq!(scheduler.active_count(), 0);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_scope_restores_previous_state() {
        let scheduler = Scheduler::new();

        {
            let _guard = scheduler.pause_scope();
            assert!(scheduler.is_paused());
        }
        assert!(!scheduler.is_paused());

        scheduler.pause();
        {
            let _guard = scheduler.pause_scope();
        }
        assert!(scheduler.is_paused(), "outer pause must survive the scope");
    }
}
