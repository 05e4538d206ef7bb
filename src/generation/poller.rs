//! Completion poller for the waiting view.
//!
//! Each tick checks, in order:
//! 1. the local job cache for a terminal status,
//! 2. the backend by plan id, when the watched id or the cached job carries
//!    a real one (404 means still pending, any other error is fatal),
//! 3. otherwise keeps waiting.
//!
//! An overall timeout forces `Failed(Timeout)`. Dropping or cancelling the
//! handle stops the timer; the backend generation call is not affected.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::PlanBackend;
use crate::error::{Error, FailureKind, GenerationError};
use crate::generation::job::{GenerationPhase, JobFailure, JobId, JobStatus};
use crate::generation::orchestrator::Orchestrator;
use crate::routes::Route;

/// Poll cadence and overall budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(180),
        }
    }
}

/// How a poll run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready { plan_id: JobId },
    Failed { failure: JobFailure },
    /// The cache now tracks a different job.
    Superseded { current: JobId },
    Cancelled,
}

impl PollOutcome {
    /// Where the waiting view goes next. Every failure leads back to the
    /// request-configuration step.
    pub fn redirect(&self) -> Option<Route> {
        match self {
            Self::Ready { plan_id } => Some(Route::Plan(plan_id.clone())),
            Self::Failed { .. } => Some(Route::NewPlan),
            Self::Superseded { current } => Some(Route::Waiting(current.clone())),
            Self::Cancelled => None,
        }
    }
}

/// Labels shown while waiting, with how long each stays up.
pub const LOADING_STEPS: &[(&str, Duration)] = &[
    ("Analyzing your profile and preferences...", Duration::from_millis(2000)),
    ("Finding recipes that match your dietary restrictions...", Duration::from_millis(3000)),
    ("Calculating optimal nutrition balance...", Duration::from_millis(2500)),
    ("Checking ingredient availability at nearby stores...", Duration::from_millis(3500)),
    ("Optimizing meal combinations for variety...", Duration::from_millis(2000)),
    ("Generating your personalized grocery list...", Duration::from_millis(2500)),
    ("Finalizing your meal plan...", Duration::from_millis(1500)),
];

/// Progress is capped here until the plan is actually ready.
pub const PROGRESS_CAP: u8 = 90;

/// Snapshot published to the waiting view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollProgress {
    pub phase: GenerationPhase,
    pub elapsed_secs: u64,
    pub percent: u8,
    pub step: &'static str,
}

impl PollProgress {
    /// Animated progress for a job still pending after `elapsed`.
    pub fn pending(phase: GenerationPhase, elapsed: Duration) -> Self {
        let total: Duration = LOADING_STEPS.iter().map(|(_, d)| *d).sum();
        let ratio = elapsed.as_secs_f64() / total.as_secs_f64();
        let percent = (ratio * 100.0).min(f64::from(PROGRESS_CAP)) as u8;

        let mut step = LOADING_STEPS[0].0;
        let mut boundary = Duration::ZERO;
        for (label, duration) in LOADING_STEPS {
            step = *label;
            boundary += *duration;
            if elapsed < boundary {
                break;
            }
        }

        Self {
            phase,
            elapsed_secs: elapsed.as_secs(),
            percent,
            step,
        }
    }

    fn finished(phase: GenerationPhase, elapsed: Duration, percent: u8) -> Self {
        let step = LOADING_STEPS.last().map(|(label, _)| *label).unwrap_or_default();
        Self {
            phase,
            elapsed_secs: elapsed.as_secs(),
            percent,
            step,
        }
    }
}

/// Running poll loop. Cancels itself when dropped.
pub struct PollerHandle {
    job_id: JobId,
    handle: Option<JoinHandle<PollOutcome>>,
    shutdown: Arc<AtomicBool>,
    progress: watch::Receiver<PollProgress>,
}

impl PollerHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn progress(&self) -> watch::Receiver<PollProgress> {
        self.progress.clone()
    }

    /// Stop polling (navigation away from the waiting view).
    pub fn cancel(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(job_id = %self.job_id, "Poller cancelled");
        }
    }

    /// Wait for a terminal outcome.
    pub async fn wait(mut self) -> PollOutcome {
        let Some(handle) = self.handle.take() else {
            return PollOutcome::Cancelled;
        };
        handle.await.unwrap_or(PollOutcome::Cancelled)
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Clone)]
pub struct CompletionPoller {
    orchestrator: Arc<Orchestrator>,
    plans: Arc<dyn PlanBackend>,
    config: PollerConfig,
}

impl CompletionPoller {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        plans: Arc<dyn PlanBackend>,
        config: PollerConfig,
    ) -> Self {
        Self {
            orchestrator,
            plans,
            config,
        }
    }

    /// Start watching `job_id` on a background task.
    pub fn spawn(&self, job_id: JobId) -> PollerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let phase = if job_id.is_provisional() {
            GenerationPhase::PendingProvisional
        } else {
            GenerationPhase::PendingReal
        };
        let (tx, rx) = watch::channel(PollProgress::pending(phase, Duration::ZERO));

        let poller = self.clone();
        let flag = Arc::clone(&shutdown);
        let id = job_id.clone();
        let handle = tokio::spawn(async move { poller.run(id, flag, tx).await });

        PollerHandle {
            job_id,
            handle: Some(handle),
            shutdown,
            progress: rx,
        }
    }

    async fn run(
        &self,
        job_id: JobId,
        shutdown: Arc<AtomicBool>,
        progress: watch::Sender<PollProgress>,
    ) -> PollOutcome {
        info!(job_id = %job_id, "Waiting for meal plan");
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                return PollOutcome::Cancelled;
            }

            let elapsed = started.elapsed();
            match self.tick(&job_id, elapsed).await {
                Some(outcome) => {
                    let last = match &outcome {
                        PollOutcome::Ready { .. } => {
                            PollProgress::finished(GenerationPhase::Complete, elapsed, 100)
                        }
                        PollOutcome::Failed { .. } => PollProgress::finished(
                            GenerationPhase::Failed,
                            elapsed,
                            progress.borrow().percent,
                        ),
                        _ => progress.borrow().clone(),
                    };
                    progress.send_replace(last);
                    info!(job_id = %job_id, outcome = ?outcome, "Stopped waiting");
                    return outcome;
                }
                None => {
                    let phase = progress.borrow().phase;
                    progress.send_replace(PollProgress::pending(phase, elapsed));
                }
            }
        }
    }

    /// One poll step. `None` means keep waiting.
    ///
    /// `elapsed` is this poller's own clock. For a job the cache holds, the
    /// budget is measured from the job's creation instead, so a reload does
    /// not restart it.
    pub async fn tick(&self, job_id: &JobId, elapsed: Duration) -> Option<PollOutcome> {
        let mut spent = elapsed;
        let mut backend_id = (!job_id.is_provisional()).then(|| job_id.clone());

        match self.orchestrator.current_job().await {
            Ok(Some(job)) if job.answers_to(job_id) => match job.status {
                JobStatus::Complete => {
                    return Some(PollOutcome::Ready {
                        plan_id: job.current_id().clone(),
                    });
                }
                JobStatus::Failed => {
                    let failure = job.failure.unwrap_or_else(|| {
                        JobFailure::new(FailureKind::BackendUnavailable, "generation failed")
                    });
                    return Some(PollOutcome::Failed { failure });
                }
                JobStatus::Pending => {
                    spent = spent.max(job.age());
                    if job.real_id.is_some() {
                        backend_id = job.real_id;
                    }
                }
            },
            Ok(Some(job)) if job_id.is_provisional() => {
                warn!(job_id = %job_id, current = %job.provisional_id, "Watched job was superseded");
                return Some(PollOutcome::Superseded {
                    current: job.current_id().clone(),
                });
            }
            Ok(_) => {}
            Err(e) => warn!(job_id = %job_id, "Job cache unreadable, continuing: {e}"),
        }

        if let Some(real_id) = &backend_id {
            match self.plans.get_plan(real_id.as_str()).await {
                Ok(Some(plan)) if plan.is_ready() => {
                    if let Err(e) = self.orchestrator.record_fetched_plan(real_id, plan).await {
                        warn!(plan_id = %real_id, "Could not cache fetched plan: {e}");
                    }
                    return Some(PollOutcome::Ready {
                        plan_id: real_id.clone(),
                    });
                }
                Ok(_) => debug!(plan_id = %real_id, "Plan not ready yet"),
                Err(e) => {
                    let failure = JobFailure::from(&Error::from(e));
                    return Some(self.fail(job_id, failure).await);
                }
            }
        }

        if spent >= self.config.timeout {
            let err = Error::from(GenerationError::Timeout { elapsed: spent });
            return Some(self.fail(job_id, JobFailure::from(&err)).await);
        }

        None
    }

    async fn fail(&self, job_id: &JobId, failure: JobFailure) -> PollOutcome {
        if let Err(e) = self.orchestrator.mark_failed(job_id, failure.clone()).await {
            warn!(job_id = %job_id, "Could not record failure: {e}");
        }
        PollOutcome::Failed { failure }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_capped_until_ready() {
        let early = PollProgress::pending(GenerationPhase::PendingProvisional, Duration::from_secs(1));
        assert_eq!(early.step, LOADING_STEPS[0].0);
        assert!(early.percent < 10);

        let late = PollProgress::pending(GenerationPhase::PendingProvisional, Duration::from_secs(60));
        assert_eq!(late.percent, PROGRESS_CAP);
        assert_eq!(late.step, LOADING_STEPS[LOADING_STEPS.len() - 1].0);
        assert_eq!(late.elapsed_secs, 60);
    }

    #[test]
    fn step_advances_at_boundaries() {
        let p = PollProgress::pending(GenerationPhase::PendingReal, Duration::from_millis(2000));
        assert_eq!(p.step, LOADING_STEPS[1].0);
        let p = PollProgress::pending(GenerationPhase::PendingReal, Duration::from_millis(4999));
        assert_eq!(p.step, LOADING_STEPS[1].0);
    }

    #[test]
    fn every_failure_has_a_way_back() {
        let failed = PollOutcome::Failed {
            failure: JobFailure::new(FailureKind::Timeout, "timed out"),
        };
        assert_eq!(failed.redirect(), Some(Route::NewPlan));
        assert_eq!(
            PollOutcome::Ready {
                plan_id: JobId::new("plan_42")
            }
            .redirect(),
            Some(Route::Plan(JobId::new("plan_42")))
        );
        assert_eq!(PollOutcome::Cancelled.redirect(), None);
    }
}
