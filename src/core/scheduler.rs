//! Background scheduling of resolve+append cycles.
//!
//! A scheduler owns its own state, so several can coexist in one process.
//! The loop is strictly sequential: one cycle completes before the next one
//! is considered, and due work is checked once per tick.

use crate::core::quote::PRICE_UNIT;
use crate::core::resolver::PriceResolver;
use crate::store::{AppendOutcome, PriceStore};
use chrono::{DateTime, Local, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("previous scheduler loop is still finishing its cycle")]
    StillStopping,
}

/// Longest supported interval between cycles. Longer ones are clamped.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub tick: Duration,
    pub stop_grace: Duration,
}

impl SchedulerSettings {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            tick: Duration::from_secs(1),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// Point-in-time view of a scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub interval: Duration,
    pub next_scheduled_run: Option<DateTime<Utc>>,
    pub pending_job_count: usize,
    pub completed_cycles: u64,
}

#[derive(Default)]
struct SchedulerState {
    running: AtomicBool,
    next_run: Mutex<Option<DateTime<Utc>>>,
    completed_cycles: AtomicU64,
}

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Resolves a quote and appends it to the store.
pub async fn fetch_and_store(resolver: &PriceResolver, store: &PriceStore) -> AppendOutcome {
    let quote = resolver.resolve().await;
    store.append(quote)
}

pub struct Scheduler {
    resolver: Arc<PriceResolver>,
    store: Arc<PriceStore>,
    settings: SchedulerSettings,
    state: Arc<SchedulerState>,
    // Held across the stop grace period, so `start` can tell a stop is in
    // progress. A loop that outlives its grace period stays here until it
    // has exited.
    worker: AsyncMutex<Option<Worker>>,
}

impl Scheduler {
    pub fn new(
        resolver: Arc<PriceResolver>,
        store: Arc<PriceStore>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            resolver,
            store,
            settings,
            state: Arc::new(SchedulerState::default()),
            worker: AsyncMutex::new(None),
        }
    }

    /// Spawns the background loop. The first cycle runs immediately.
    /// Must be called from within a tokio runtime.
    ///
    /// Refuses to start while a previous loop is still finishing, so at most
    /// one loop ever runs per scheduler.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.state.running.load(Ordering::SeqCst) {
            warn!("Scheduler is already running");
            println!("Scheduler is already running");
            return Err(SchedulerError::AlreadyRunning);
        }
        let Ok(mut worker) = self.worker.try_lock() else {
            warn!("Scheduler is stopping");
            return Err(SchedulerError::StillStopping);
        };
        if self.state.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            warn!("Previous scheduler loop has not exited yet");
            println!("Previous monitor cycle is still running, try again shortly");
            return Err(SchedulerError::StillStopping);
        }

        self.state.running.store(true, Ordering::SeqCst);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.resolver),
            Arc::clone(&self.store),
            self.settings,
            Arc::clone(&self.state),
            token.clone(),
        ));
        *worker = Some(Worker { token, handle });

        info!(interval = ?self.settings.interval, "Scheduler started");
        println!("Scheduler started, press Ctrl+C to stop");
        Ok(())
    }

    /// Signals the loop to stop and waits up to the grace period for it.
    /// An in-flight cycle is not interrupted.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        self.state.running.store(false, Ordering::SeqCst);

        let joined = match worker.as_mut() {
            Some(Worker { token, handle }) => {
                token.cancel();
                match tokio::time::timeout(self.settings.stop_grace, handle).await {
                    Ok(Ok(())) => {
                        debug!("Scheduler loop joined");
                        true
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "Scheduler loop ended abnormally");
                        true
                    }
                    Err(_) => {
                        warn!(
                            grace = ?self.settings.stop_grace,
                            "Scheduler loop did not exit within grace period"
                        );
                        false
                    }
                }
            }
            None => false,
        };
        // A loop that outlived the grace period keeps its handle for start().
        if joined {
            *worker = None;
        }
        drop(worker);

        *self.state.next_run.lock() = None;
        info!("Scheduler stopped");
        println!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SchedulerStatus {
        let is_running = self.is_running();
        SchedulerStatus {
            is_running,
            interval: self.settings.interval,
            next_scheduled_run: *self.state.next_run.lock(),
            pending_job_count: usize::from(is_running),
            completed_cycles: self.state.completed_cycles.load(Ordering::SeqCst),
        }
    }
}

async fn run_loop(
    resolver: Arc<PriceResolver>,
    store: Arc<PriceStore>,
    settings: SchedulerSettings,
    state: Arc<SchedulerState>,
    token: CancellationToken,
) {
    run_cycle(&resolver, &store).await;
    let mut next_due = schedule_next(&state, settings.interval);
    state.completed_cycles.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(settings.tick) => {}
        }

        if token.is_cancelled() {
            break;
        }
        if Instant::now() >= next_due {
            run_cycle(&resolver, &store).await;
            next_due = schedule_next(&state, settings.interval);
            state.completed_cycles.fetch_add(1, Ordering::SeqCst);
        }
    }

    debug!("Scheduler loop exited");
}

fn schedule_next(state: &SchedulerState, interval: Duration) -> Instant {
    let interval = interval.min(MAX_INTERVAL);
    let wall = chrono::Duration::from_std(interval)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d));
    *state.next_run.lock() = wall;
    Instant::now() + interval
}

async fn run_cycle(resolver: &PriceResolver, store: &PriceStore) {
    let stamp = Local::now().format("%H:%M:%S");
    debug!("Starting scheduled fetch");

    match AssertUnwindSafe(fetch_and_store(resolver, store))
        .catch_unwind()
        .await
    {
        Ok(outcome) => {
            let record = &outcome.record;
            match record.price {
                Some(price) => println!(
                    "[{stamp}] Gold price: {price:.2} {PRICE_UNIT} (source: {})",
                    record.source
                ),
                None => println!(
                    "[{stamp}] Fetch failed: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ),
            }
            for failure in &outcome.failures {
                println!("[{stamp}] Storage error: {failure}");
            }
        }
        Err(_) => {
            error!("Scheduled cycle panicked");
            println!("[{stamp}] Error: scheduled fetch failed unexpectedly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::tests::{Behaviour, MockAdapter};
    use crate::core::resolver::{DEFAULT_ATTEMPT_TIMEOUT, Tier};
    use crate::store::DEFAULT_ORDERED_LOG_CAP;
    use tempfile::{TempDir, tempdir};

    fn fixture(behaviour: Behaviour) -> (TempDir, Arc<PriceResolver>, Arc<PriceStore>) {
        let dir = tempdir().unwrap();
        let store = Arc::new(PriceStore::open(dir.path(), DEFAULT_ORDERED_LOG_CAP).unwrap());
        let resolver = Arc::new(PriceResolver::new(
            vec![Tier::new("regional market", 0.0).with_adapter(MockAdapter::new("mock", behaviour))],
            DEFAULT_ATTEMPT_TIMEOUT,
        ));
        (dir, resolver, store)
    }

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            interval: Duration::from_millis(100),
            tick: Duration::from_millis(10),
            stop_grace: Duration::from_secs(5),
        }
    }

    async fn wait_for_cycles(scheduler: &Scheduler, cycles: u64) {
        while scheduler.status().completed_cycles < cycles {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_run_plus_two_ticks() {
        let (_dir, resolver, store) = fixture(Behaviour::Price(900.0));
        let scheduler = Scheduler::new(resolver, Arc::clone(&store), settings());

        scheduler.start().unwrap();
        wait_for_cycles(&scheduler, 3).await;
        assert_eq!(store.recent(10).unwrap().len(), 3);

        scheduler.stop().await;
        assert!(!scheduler.status().is_running);
        assert_eq!(scheduler.status().pending_job_count, 0);
        assert!(scheduler.status().next_scheduled_run.is_none());
        assert_eq!(store.recent(10).unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let (_dir, resolver, store) = fixture(Behaviour::Price(900.0));
        let scheduler = Scheduler::new(resolver, store, settings());

        scheduler.start().unwrap();
        assert!(matches!(
            scheduler.start(),
            Err(SchedulerError::AlreadyRunning)
        ));
        assert!(scheduler.is_running());

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_while_running() {
        let (_dir, resolver, store) = fixture(Behaviour::Price(900.0));
        let scheduler = Scheduler::new(resolver, store, settings());

        scheduler.start().unwrap();
        wait_for_cycles(&scheduler, 1).await;

        let status = scheduler.status();
        assert!(status.is_running);
        assert_eq!(status.pending_job_count, 1);
        assert_eq!(status.interval, Duration::from_millis(100));
        assert!(status.next_scheduled_run.is_some());

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_keep_the_loop_alive() {
        let (_dir, resolver, store) = fixture(Behaviour::Fail);
        let scheduler = Scheduler::new(resolver, Arc::clone(&store), settings());

        scheduler.start().unwrap();
        wait_for_cycles(&scheduler, 2).await;
        assert!(scheduler.is_running());
        scheduler.stop().await;

        let records = store.recent(10).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|q| q.price.is_none() && q.error.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_a_loop_that_outlived_its_grace_period() {
        let (_dir, resolver, store) = fixture(Behaviour::Hang);
        let settings = SchedulerSettings {
            stop_grace: Duration::from_secs(1),
            ..settings()
        };
        let scheduler = Scheduler::new(resolver, Arc::clone(&store), settings);

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        // The first cycle is stuck in its 10s attempt, longer than the grace.
        scheduler.stop().await;
        assert!(!scheduler.is_running());
        assert!(matches!(
            scheduler.start(),
            Err(SchedulerError::StillStopping)
        ));

        // The attempt times out, the cycle is recorded and the old loop exits.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.recent(10).unwrap().len(), 1);

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_is_clamped() {
        let (_dir, resolver, store) = fixture(Behaviour::Price(900.0));
        let settings = SchedulerSettings {
            interval: Duration::MAX,
            ..settings()
        };
        let scheduler = Scheduler::new(resolver, store, settings);

        scheduler.start().unwrap();
        wait_for_cycles(&scheduler, 1).await;
        assert!(scheduler.status().next_scheduled_run.is_some());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_harmless() {
        let (_dir, resolver, store) = fixture(Behaviour::Price(900.0));
        let scheduler = Scheduler::new(resolver, store, settings());

        scheduler.stop().await;
        assert!(!scheduler.status().is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let (_dir, resolver, store) = fixture(Behaviour::Price(900.0));
        let scheduler = Scheduler::new(resolver, Arc::clone(&store), settings());

        scheduler.start().unwrap();
        wait_for_cycles(&scheduler, 1).await;
        scheduler.stop().await;

        scheduler.start().unwrap();
        wait_for_cycles(&scheduler, 2).await;
        scheduler.stop().await;

        assert_eq!(store.recent(10).unwrap().len(), 2);
    }
}
