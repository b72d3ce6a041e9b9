//! Recalculation Scheduler
//!
//! Owns the periodic jobs, their re-entrancy locks and their status. Each job
//! moves Idle -> Running -> Idle; a trigger that arrives while the job is
//! Running is skipped (counted and logged), never queued.
//!
//! The default lock is process-local. Running the scheduler in several
//! processes needs a shared `JobLock` (e.g. a lease row in the database).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::PricingResult;
use crate::repository::JobStatusRepository;

/// Timer period used for a job that reports a zero interval
pub const MIN_JOB_INTERVAL: Duration = Duration::from_secs(1);

/// Counts reported by a finished job run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobOutcome {
    pub counts: BTreeMap<String, u64>,
}

impl JobOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: u64) -> Self {
        self.counts.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    async fn run(&self) -> PricingResult<JobOutcome>;
}

/// Re-entrancy guard keyed by job name
pub trait JobLock: Send + Sync {
    /// Take the lock; false when the job is already running.
    fn try_acquire(&self, job_name: &str) -> bool;

    fn release(&self, job_name: &str);

    fn is_held(&self, job_name: &str) -> bool;
}

/// In-process lock: one running flag per job name.
#[derive(Default)]
pub struct LocalJobLock {
    running: Mutex<HashSet<String>>,
}

impl LocalJobLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobLock for LocalJobLock {
    fn try_acquire(&self, job_name: &str) -> bool {
        self.running.lock().insert(job_name.to_string())
    }

    fn release(&self, job_name: &str) {
        self.running.lock().remove(job_name);
    }

    fn is_held(&self, job_name: &str) -> bool {
        self.running.lock().contains(job_name)
    }
}

struct LockGuard {
    lock: Arc<dyn JobLock>,
    job_name: &'static str,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.lock.release(self.job_name);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub interval_secs: u64,
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_error: Option<String>,
    pub last_outcome: Option<JobOutcome>,
    pub run_count: u64,
    pub failure_count: u64,
    pub skip_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TriggerResult {
    Completed { duration_ms: u64, outcome: JobOutcome },
    Failed { duration_ms: u64, error: String },
    Skipped,
    UnknownJob,
}

struct RegisteredJob {
    job: Arc<dyn ScheduledJob>,
    status: Mutex<JobStatus>,
}

pub struct Scheduler {
    jobs: BTreeMap<&'static str, RegisteredJob>,
    lock: Arc<dyn JobLock>,
    status_repo: Arc<dyn JobStatusRepository>,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(status_repo: Arc<dyn JobStatusRepository>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            jobs: BTreeMap::new(),
            lock: Arc::new(LocalJobLock::new()),
            status_repo,
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_lock(mut self, lock: Arc<dyn JobLock>) -> Self {
        self.lock = lock;
        self
    }

    pub fn register(mut self, job: Arc<dyn ScheduledJob>) -> Self {
        let status = JobStatus {
            name: job.name().to_string(),
            interval_secs: job.interval().as_secs(),
            ..Default::default()
        };
        self.jobs.insert(
            job.name(),
            RegisteredJob {
                job,
                status: Mutex::new(status),
            },
        );
        self
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.keys().copied().collect()
    }

    pub fn status(&self, job_name: &str) -> Option<JobStatus> {
        let registered = self.jobs.get(job_name)?;
        let mut status = registered.status.lock().clone();
        status.is_running = self.lock.is_held(registered.job.name());
        Some(status)
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.jobs
            .keys()
            .filter_map(|name| self.status(name))
            .collect()
    }

    /// Run a job now unless it is already running.
    pub async fn trigger(&self, job_name: &str) -> TriggerResult {
        let Some(registered) = self.jobs.get(job_name) else {
            return TriggerResult::UnknownJob;
        };
        let name = registered.job.name();

        if !self.lock.try_acquire(name) {
            let skipped = {
                let mut status = registered.status.lock();
                status.skip_count += 1;
                status.skip_count
            };
            warn!(job = name, skipped_total = skipped, "Job still running, skipping trigger");
            return TriggerResult::Skipped;
        }
        let _guard = LockGuard {
            lock: Arc::clone(&self.lock),
            job_name: name,
        };

        let started_at = Utc::now();
        let timer = Instant::now();
        info!(job = name, "Job started");

        let result = registered.job.run().await;
        let duration_ms = timer.elapsed().as_millis() as u64;

        {
            let mut status = registered.status.lock();
            status.last_run_at = Some(started_at);
            status.last_duration_ms = Some(duration_ms);
            status.run_count += 1;
            match &result {
                Ok(outcome) => {
                    status.last_error = None;
                    status.last_outcome = Some(outcome.clone());
                }
                Err(e) => {
                    status.last_error = Some(e.to_string());
                    status.failure_count += 1;
                }
            }
        }

        match result {
            Ok(outcome) => {
                info!(job = name, duration_ms = duration_ms, counts = ?outcome.counts, "Job finished");
                if let Err(e) = self.status_repo.record_success(name, started_at).await {
                    warn!(job = name, error = %e, "Failed to record job success");
                }
                TriggerResult::Completed { duration_ms, outcome }
            }
            Err(e) => {
                let error = e.to_string();
                error!(job = name, duration_ms = duration_ms, error = %error, "Job failed");
                if let Err(e) = self.status_repo.record_failure(name, started_at, &error).await {
                    warn!(job = name, error = %e, "Failed to record job failure");
                }
                TriggerResult::Failed { duration_ms, error }
            }
        }
    }

    pub fn is_started(&self) -> bool {
        !self.handles.lock().is_empty()
    }

    /// Spawn one timer task per job. The first tick fires immediately.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            warn!("Scheduler already started");
            return;
        }

        self.shutdown.send_replace(false);

        for (name, registered) in &self.jobs {
            let name: &'static str = *name;
            let mut every = registered.job.interval();
            if every.is_zero() {
                warn!(job = name, "Job interval is zero, using {:?}", MIN_JOB_INTERVAL);
                every = MIN_JOB_INTERVAL;
            }
            let scheduler = Arc::clone(self);
            let mut shutdown = self.shutdown.subscribe();

            info!(job = name, interval_secs = every.as_secs(), "Scheduling job");

            handles.push(tokio::spawn(async move {
                let mut ticker = interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                        _ = ticker.tick() => {
                            scheduler.trigger(name).await;
                        }
                    }
                }

                info!(job = name, "Job timer stopped");
            }));
        }
    }

    /// Signal every timer task to stop and wait for them.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for result in futures_util::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Job timer task ended abnormally: {}", e);
            }
        }

        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PricingError;
    use crate::repository::memory::MemoryJobStatusRepository;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Notify;

    struct BlockingJob {
        runs: AtomicU64,
        release: Notify,
        started: Notify,
    }

    #[async_trait]
    impl ScheduledJob for BlockingJob {
        fn name(&self) -> &'static str {
            "blocking"
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(3600)
        }

        async fn run(&self) -> PricingResult<JobOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(JobOutcome::new().with("processed", 1))
        }
    }

    struct CountingJob {
        name: &'static str,
        every: Duration,
        runs: AtomicU64,
        fail: bool,
    }

    impl CountingJob {
        fn new(name: &'static str, every: Duration, fail: bool) -> Self {
            Self {
                name,
                every,
                runs: AtomicU64::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        fn name(&self) -> &'static str {
            self.name
        }

        fn interval(&self) -> Duration {
            self.every
        }

        async fn run(&self) -> PricingResult<JobOutcome> {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(PricingError::Other("provider exploded".to_string()));
            }
            Ok(JobOutcome::new().with("runs", runs))
        }
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_skipped() {
        let job = Arc::new(BlockingJob {
            runs: AtomicU64::new(0),
            release: Notify::new(),
            started: Notify::new(),
        });
        let scheduler = Arc::new(
            Scheduler::new(Arc::new(MemoryJobStatusRepository::new())).register(job.clone()),
        );

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.trigger("blocking").await })
        };
        job.started.notified().await;

        assert!(scheduler.status("blocking").unwrap().is_running);
        assert_eq!(scheduler.trigger("blocking").await, TriggerResult::Skipped);

        job.release.notify_one();
        let result = first.await.unwrap();

        assert!(matches!(result, TriggerResult::Completed { .. }));
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        let status = scheduler.status("blocking").unwrap();
        assert_eq!(status.skip_count, 1);
        assert_eq!(status.run_count, 1);
        assert!(!status.is_running);
        assert!(status.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_recorded() {
        let repo = Arc::new(MemoryJobStatusRepository::new());
        let good = Arc::new(CountingJob::new("good", Duration::from_secs(60), false));
        let bad = Arc::new(CountingJob::new("bad", Duration::from_secs(60), true));
        let scheduler = Scheduler::new(repo.clone())
            .register(good.clone())
            .register(bad.clone());

        let failed = scheduler.trigger("bad").await;
        assert!(matches!(failed, TriggerResult::Failed { ref error, .. } if error.contains("exploded")));

        let ok = scheduler.trigger("good").await;
        assert!(matches!(ok, TriggerResult::Completed { ref outcome, .. } if outcome.get("runs") == 1));

        // lock released after a failure
        assert!(matches!(scheduler.trigger("bad").await, TriggerResult::Failed { .. }));

        let bad_status = scheduler.status("bad").unwrap();
        assert_eq!(bad_status.failure_count, 2);
        assert!(bad_status.last_error.is_some());
        assert!(scheduler.status("good").unwrap().last_error.is_none());

        let persisted = repo.find("bad").await.unwrap().unwrap();
        assert_eq!(persisted.error_count, 2);
        assert_eq!(repo.find("good").await.unwrap().unwrap().success_count, 1);

        assert_eq!(scheduler.trigger("missing").await, TriggerResult::UnknownJob);
    }

    #[tokio::test]
    async fn test_start_runs_immediately_and_stop_ends_tasks() {
        let job = Arc::new(CountingJob::new("ticker", Duration::from_millis(20), false));
        let scheduler = Arc::new(
            Scheduler::new(Arc::new(MemoryJobStatusRepository::new())).register(job.clone()),
        );

        scheduler.start();
        assert!(scheduler.is_started());
        tokio::time::sleep(Duration::from_millis(70)).await;
        scheduler.stop().await;

        let runs = job.runs.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least two runs, got {}", runs);
        assert!(!scheduler.is_started());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), runs);
    }

    #[tokio::test]
    async fn test_zero_interval_job_still_runs() {
        let job = Arc::new(CountingJob::new("eager", Duration::ZERO, false));
        let scheduler = Arc::new(
            Scheduler::new(Arc::new(MemoryJobStatusRepository::new())).register(job.clone()),
        );

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // first tick is immediate, the next one waits for the minimum interval
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.status("eager").unwrap().run_count, 1);

        scheduler.stop().await;
        assert!(!scheduler.is_started());
    }
}
