//! Generation orchestrator: submits jobs and reconciles backend answers.
//!
//! Submission returns as soon as the provisional job is persisted; the
//! backend call runs on a spawned task. The orchestrator is the only writer
//! of the job cache, and every write that follows a network await first
//! checks that the job it belongs to is still the current one.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{PlanBackend, RegistrationApi};
use crate::error::{Error, GenerationError};
use crate::generation::job::{
    GenerationJob, GenerationPhase, JobFailure, JobId, JobStatus, ProvisionalIdGen,
};
use crate::generation::state::OrchestratorState;
use crate::identity::IdentityProvider;
use crate::model::{GenerateResponse, GenerationRequest, MealPlan};
use crate::routes::Route;

/// What happened to a backend answer once it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Cache now holds the completed job.
    Completed { real_id: JobId },
    /// The backend issued an id but the plan has no days yet; the job stays
    /// pending and the poller reads it by `real_id`.
    AwaitingPlan { real_id: JobId },
    /// Cache now holds the failed job.
    Failed(JobFailure),
    /// The answer belonged to a job that is no longer current.
    Discarded,
}

/// A submitted job. The caller navigates to `redirect` right away.
#[derive(Debug)]
pub struct Submission {
    pub job_id: JobId,
    pub redirect: Route,
    task: JoinHandle<Reconciliation>,
}

impl Submission {
    /// Wait for the backend answer to be reconciled. Views never need this;
    /// the poller observes the cache instead.
    pub async fn reconciled(self) -> Reconciliation {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %self.job_id, "Generation task ended abnormally: {e}");
                Reconciliation::Discarded
            }
        }
    }
}

pub struct Orchestrator {
    state: Arc<dyn OrchestratorState>,
    plans: Arc<dyn PlanBackend>,
    registration: Arc<dyn RegistrationApi>,
    identity: Arc<dyn IdentityProvider>,
    ids: ProvisionalIdGen,
    /// Serializes cache writes from this context.
    write_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        state: Arc<dyn OrchestratorState>,
        plans: Arc<dyn PlanBackend>,
        registration: Arc<dyn RegistrationApi>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            state,
            plans,
            registration,
            identity,
            ids: ProvisionalIdGen::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Replace the provisional id source (tests pin the clock).
    pub fn with_id_source(mut self, ids: ProvisionalIdGen) -> Self {
        self.ids = ids;
        self
    }

    /// Read the current job. Readers must treat the answer as possibly stale.
    pub async fn current_job(&self) -> Result<Option<GenerationJob>, Error> {
        Ok(self.state.load().await?)
    }

    /// Submit a request.
    ///
    /// Clears the previous job, persists a new provisional one, and starts
    /// the backend call in the background. Invalid requests are rejected here
    /// and never reach the backend.
    pub async fn submit(self: &Arc<Self>, request: GenerationRequest) -> Result<Submission, Error> {
        request.validate()?;

        let job_id = {
            let _guard = self.write_lock.lock().await;
            self.state.clear().await?;
            let job_id = self.ids.next();
            self.advance(GenerationPhase::Submitting, &GenerationJob::pending(job_id.clone()))
                .await?;
            job_id
        };

        info!(
            job_id = %job_id,
            start = %request.start_date,
            end = %request.end_date,
            "Submitted meal plan generation"
        );

        let this = Arc::clone(self);
        let task_id = job_id.clone();
        let task = tokio::spawn(async move {
            let result = this.plans.generate(&request).await;
            this.reconcile(&task_id, result.map_err(Error::from)).await
        });

        Ok(Submission {
            redirect: Route::Waiting(job_id.clone()),
            job_id,
            task,
        })
    }

    /// Apply a backend answer to the job it was issued for.
    async fn reconcile(
        &self,
        job_id: &JobId,
        result: Result<GenerateResponse, Error>,
    ) -> Reconciliation {
        let guard = self.write_lock.lock().await;

        let job = match self.state.load().await {
            Ok(Some(job)) if &job.provisional_id == job_id && !job.is_terminal() => job,
            Ok(Some(job)) => {
                warn!(
                    job_id = %job_id,
                    current = %job.provisional_id,
                    "Discarding result for a job that is no longer current"
                );
                return Reconciliation::Discarded;
            }
            Ok(None) => {
                warn!(job_id = %job_id, "Discarding result; no job is current");
                return Reconciliation::Discarded;
            }
            Err(e) => {
                error!(job_id = %job_id, "Cannot read job cache, discarding result: {e}");
                return Reconciliation::Discarded;
            }
        };

        let from = job.phase();
        let answered = match result {
            Ok(response) if response.plan.is_ready() => job
                .clone()
                .complete(JobId::new(response.plan_id), response.plan)
                .map_err(Error::from),
            Ok(response) => job
                .clone()
                .await_plan(JobId::new(response.plan_id))
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        let (updated, outcome) = match answered {
            Ok(next) if next.status == JobStatus::Complete => {
                let real_id = next.current_id().clone();
                info!(job_id = %job_id, plan_id = %real_id, "Meal plan generated");
                (next, Reconciliation::Completed { real_id })
            }
            Ok(next) => {
                let real_id = next.current_id().clone();
                info!(job_id = %job_id, plan_id = %real_id, "Plan id issued, plan not ready yet");
                (next, Reconciliation::AwaitingPlan { real_id })
            }
            Err(e) => {
                let failure = JobFailure::from(&e);
                warn!(job_id = %job_id, kind = %failure.kind, "Meal plan generation failed: {e}");
                (job.fail(failure.clone()), Reconciliation::Failed(failure))
            }
        };

        if let Err(e) = self.advance(from, &updated).await {
            error!(job_id = %job_id, "Failed to persist job outcome: {e}");
            return Reconciliation::Discarded;
        }
        drop(guard);

        if matches!(outcome, Reconciliation::Completed { .. }) {
            self.finalize_registration().await;
        }
        outcome
    }

    /// Persist `next` as the successor of a job in phase `from`.
    ///
    /// Callers hold `write_lock`.
    async fn advance(&self, from: GenerationPhase, next: &GenerationJob) -> Result<(), Error> {
        let to = next.phase();
        if !from.can_transition_to(to) {
            return Err(GenerationError::InvalidTransition { from, to }.into());
        }
        self.state.save(next).await?;
        debug!(job_id = %next.provisional_id, %from, %to, "Job advanced");
        Ok(())
    }

    /// Flip `registration_completed` after a first successful plan.
    ///
    /// Failures are logged only; the resolver asks again on next navigation.
    async fn finalize_registration(&self) {
        match self.identity.current_session().await {
            Ok(Some(session)) if session.is_registered() => {
                debug!(user_id = %session.user_id, "Registration already finalized");
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("No session while finalizing registration");
                return;
            }
            Err(e) => {
                warn!("Could not read session to finalize registration: {e}");
                return;
            }
        }

        if let Err(e) = self.registration.complete_registration().await {
            warn!("Finalize registration failed: {e}");
            return;
        }
        if let Err(e) = self.identity.set_registration_completed(true).await {
            warn!("Registration finalized but session metadata not refreshed: {e}");
            return;
        }
        info!("Registration finalized");
    }

    /// Force the current job into `Failed` if `job_id` still addresses it.
    ///
    /// Returns whether anything was written.
    pub async fn mark_failed(&self, job_id: &JobId, failure: JobFailure) -> Result<bool, Error> {
        let _guard = self.write_lock.lock().await;
        match self.state.load().await? {
            Some(job) if job.answers_to(job_id) && !job.is_terminal() => {
                warn!(job_id = %job_id, kind = %failure.kind, reason = %failure.reason, "Job failed");
                let from = job.phase();
                self.advance(from, &job.fail(failure)).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Store a plan fetched by real id, if that id still belongs to the
    /// current job.
    ///
    /// A pending job completes (and registration is finalized); a completed
    /// job gets its copy refreshed. Failed jobs and plans without days are
    /// left alone. Returns whether anything was written.
    pub async fn record_fetched_plan(&self, real_id: &JobId, plan: MealPlan) -> Result<bool, Error> {
        if real_id.is_provisional() {
            return Err(GenerationError::InvalidPlanId(real_id.to_string()).into());
        }
        if !plan.is_ready() {
            return Ok(false);
        }

        let guard = self.write_lock.lock().await;
        let job = match self.state.load().await? {
            Some(job) if job.answers_to(real_id) => job,
            _ => return Ok(false),
        };
        let status = job.status;
        match status {
            JobStatus::Pending => {
                let from = job.phase();
                self.advance(from, &job.complete(real_id.clone(), plan)?).await?;
                drop(guard);
                info!(plan_id = %real_id, "Recorded plan fetched from backend");
                self.finalize_registration().await;
                Ok(true)
            }
            JobStatus::Complete if job.plan.as_ref() != Some(&plan) => {
                self.state.save(&job.complete(real_id.clone(), plan)?).await?;
                debug!(plan_id = %real_id, "Refreshed cached plan");
                Ok(true)
            }
            JobStatus::Complete | JobStatus::Failed => Ok(false),
        }
    }

    /// Load a plan for the plan view.
    ///
    /// The cache may be stale, so the backend is asked first and its answer
    /// recorded. When the backend cannot be reached the cached copy for the
    /// same real id is served instead. `Ok(None)` means there is nothing to
    /// show; the caller sends the user back to plan creation.
    pub async fn plan_for_display(&self, plan_id: &JobId) -> Result<Option<MealPlan>, Error> {
        if plan_id.is_provisional() {
            return Err(GenerationError::InvalidPlanId(plan_id.to_string()).into());
        }

        match self.plans.get_plan(plan_id.as_str()).await {
            Ok(Some(plan)) if plan.is_ready() => {
                if let Err(e) = self.record_fetched_plan(plan_id, plan.clone()).await {
                    warn!(plan_id = %plan_id, "Could not cache fetched plan: {e}");
                }
                Ok(Some(plan))
            }
            Ok(_) => {
                debug!(plan_id = %plan_id, "No plan to display");
                Ok(None)
            }
            Err(e) => {
                let cached = self
                    .state
                    .load()
                    .await?
                    .filter(|job| job.real_id.as_ref() == Some(plan_id))
                    .and_then(|job| job.plan);
                match cached {
                    Some(plan) => {
                        warn!(plan_id = %plan_id, "Backend read failed, showing cached plan: {e}");
                        Ok(Some(plan))
                    }
                    None => Err(e.into()),
                }
            }
        }
    }

    /// Delete a plan on the backend. Clears the cache when it held that plan.
    pub async fn delete_plan(&self, plan_id: &JobId) -> Result<(), Error> {
        if plan_id.is_provisional() {
            return Err(GenerationError::InvalidPlanId(plan_id.to_string()).into());
        }
        self.plans.delete_plan(plan_id.as_str()).await?;

        let _guard = self.write_lock.lock().await;
        let cached = self.state.load().await?;
        if cached.is_some_and(|job| job.real_id.as_ref() == Some(plan_id)) {
            self.state.clear().await?;
            debug!(plan_id = %plan_id, "Cleared cached job for deleted plan");
        }
        info!(plan_id = %plan_id, "Meal plan deleted");
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").field("ids", &self.ids).finish()
    }
}
