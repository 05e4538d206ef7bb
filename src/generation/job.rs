//! Generation job model: ids, status, and the phase machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, GenerationError};
use crate::model::MealPlan;

/// Reserved prefix of locally generated ids. The backend never issues it.
pub const PROVISIONAL_PREFIX: &str = "temp_";

/// A job identifier: either provisional (`temp_…`) or backend-issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn provisional(token: u64) -> Self {
        Self(format!("{PROVISIONAL_PREFIX}{token}"))
    }

    /// Provisional ids are never backend-addressable.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Source of provisional ids.
///
/// Tokens are wall-clock milliseconds, bumped so that two ids from the same
/// source never collide even within one millisecond.
pub struct ProvisionalIdGen {
    clock: Clock,
    last: AtomicU64,
}

impl ProvisionalIdGen {
    pub fn new() -> Self {
        Self::with_clock(|| {
            u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
        })
    }

    pub fn with_clock(clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            last: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> JobId {
        let now = (self.clock)();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        JobId::provisional(now.max(prev + 1))
    }
}

impl Default for ProvisionalIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProvisionalIdGen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionalIdGen")
            .field("last", &self.last.load(Ordering::Relaxed))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Complete,
    Failed,
}

/// Why a job failed, as shown next to the retry affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<&crate::error::Error> for JobFailure {
    fn from(e: &crate::error::Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

/// The current generation job of one browser context.
///
/// A `Complete` job always carries both `real_id` and `plan`; the
/// constructors are the only way to reach that status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub provisional_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_id: Option<JobId>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<MealPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn pending(provisional_id: JobId) -> Self {
        let now = Utc::now();
        Self {
            provisional_id,
            real_id: None,
            status: JobStatus::Pending,
            plan: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconcile with the backend's answer.
    pub fn complete(mut self, real_id: JobId, plan: MealPlan) -> Result<Self, GenerationError> {
        if real_id.is_provisional() || real_id.as_str().is_empty() {
            return Err(GenerationError::InvalidPlanId(real_id.to_string()));
        }
        self.real_id = Some(real_id);
        self.plan = Some(plan);
        self.status = JobStatus::Complete;
        self.failure = None;
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// Record the backend id of a plan that is not ready yet. The job stays
    /// pending and is polled by that id.
    pub fn await_plan(mut self, real_id: JobId) -> Result<Self, GenerationError> {
        if real_id.is_provisional() || real_id.as_str().is_empty() {
            return Err(GenerationError::InvalidPlanId(real_id.to_string()));
        }
        self.real_id = Some(real_id);
        self.updated_at = Utc::now();
        Ok(self)
    }

    pub fn fail(mut self, failure: JobFailure) -> Self {
        self.status = JobStatus::Failed;
        self.failure = Some(failure);
        self.updated_at = Utc::now();
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Complete | JobStatus::Failed)
    }

    /// Time since submission. Survives restarts, unlike a poller's own clock.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }

    /// Whether `id` addresses this job, by either of its ids.
    pub fn answers_to(&self, id: &JobId) -> bool {
        &self.provisional_id == id || self.real_id.as_ref() == Some(id)
    }

    /// The best id to address this job by: the real one once known.
    pub fn current_id(&self) -> &JobId {
        self.real_id.as_ref().unwrap_or(&self.provisional_id)
    }

    /// False for rows that violate the `Complete` invariant (hand-edited or
    /// written by an older build).
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Complete => {
                self.plan.is_some()
                    && self.real_id.as_ref().is_some_and(|id| !id.is_provisional())
            }
            JobStatus::Pending | JobStatus::Failed => !self.provisional_id.as_str().is_empty(),
        }
    }

    pub fn phase(&self) -> GenerationPhase {
        match (self.status, &self.real_id) {
            (JobStatus::Pending, None) => GenerationPhase::PendingProvisional,
            (JobStatus::Pending, Some(_)) => GenerationPhase::PendingReal,
            (JobStatus::Complete, _) => GenerationPhase::Complete,
            (JobStatus::Failed, _) => GenerationPhase::Failed,
        }
    }
}

/// Phases of one generation flow.
///
/// Idle → Submitting → PendingProvisional → PendingReal → Complete | Failed.
/// A synchronous backend answer may skip `PendingReal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    #[default]
    Idle,
    Submitting,
    PendingProvisional,
    PendingReal,
    Complete,
    Failed,
}

impl GenerationPhase {
    pub fn can_transition_to(&self, target: GenerationPhase) -> bool {
        use GenerationPhase::*;
        matches!(
            (self, target),
            (Idle, Submitting)
                | (Submitting, PendingProvisional)
                | (Submitting, Failed)
                | (PendingProvisional, PendingReal)
                | (PendingProvisional, Complete)
                | (PendingProvisional, Failed)
                | (PendingReal, Complete)
                | (PendingReal, Failed)
        )
    }

    /// No further transition without a new user action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl std::fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::PendingProvisional => "pending_provisional",
            Self::PendingReal => "pending_real",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::plan::tests::plan_with_days;

    #[test]
    fn provisional_ids_use_reserved_prefix() {
        let ids = ProvisionalIdGen::with_clock(|| 1000);
        assert_eq!(ids.next().as_str(), "temp_1000");
        assert!(JobId::provisional(5).is_provisional());
        assert!(!JobId::new("plan_42").is_provisional());
    }

    #[test]
    fn provisional_ids_are_unique_within_one_millisecond() {
        let ids = ProvisionalIdGen::with_clock(|| 1000);
        let a = ids.next();
        let b = ids.next();
        let c = ids.next();
        assert_eq!(a.as_str(), "temp_1000");
        assert_eq!(b.as_str(), "temp_1001");
        assert_eq!(c.as_str(), "temp_1002");
    }

    #[test]
    fn complete_requires_backend_id() {
        let job = GenerationJob::pending(JobId::provisional(1));
        let err = job
            .clone()
            .complete(JobId::new("temp_9"), plan_with_days(7))
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidPlanId(_)));

        let done = job.complete(JobId::new("plan_42"), plan_with_days(7)).unwrap();
        assert_eq!(done.status, JobStatus::Complete);
        assert_eq!(done.current_id().as_str(), "plan_42");
        assert!(done.answers_to(&JobId::new("temp_1")));
        assert!(done.answers_to(&JobId::new("plan_42")));
        assert!(done.is_consistent());
    }

    #[test]
    fn hand_edited_complete_row_is_inconsistent() {
        let mut job = GenerationJob::pending(JobId::provisional(1));
        job.status = JobStatus::Complete;
        assert!(!job.is_consistent());
        assert_eq!(job.phase(), GenerationPhase::Complete);
    }

    #[test]
    fn phase_transitions() {
        use GenerationPhase::*;
        assert!(Idle.can_transition_to(Submitting));
        assert!(Submitting.can_transition_to(PendingProvisional));
        assert!(PendingProvisional.can_transition_to(Complete));
        assert!(PendingReal.can_transition_to(Failed));
        assert!(!Complete.can_transition_to(PendingReal));
        assert!(!Failed.can_transition_to(Submitting));
        assert!(!Idle.can_transition_to(Complete));
        assert!(Complete.is_terminal());
        assert!(!PendingReal.is_terminal());
    }

    #[test]
    fn job_lifecycle_follows_phase_machine() {
        use GenerationPhase::*;
        let pending = GenerationJob::pending(JobId::provisional(1));
        assert!(Submitting.can_transition_to(pending.phase()));

        let awaiting = pending.clone().await_plan(JobId::new("plan_7")).unwrap();
        assert_eq!(awaiting.status, JobStatus::Pending);
        assert_eq!(awaiting.phase(), PendingReal);
        assert!(pending.phase().can_transition_to(awaiting.phase()));

        let done = awaiting.clone().complete(JobId::new("plan_7"), plan_with_days(7)).unwrap();
        assert!(awaiting.phase().can_transition_to(done.phase()));

        let failed = pending.clone().fail(JobFailure::new(FailureKind::Timeout, "late"));
        assert!(pending.phase().can_transition_to(failed.phase()));
        assert!(!done.phase().can_transition_to(failed.phase()));

        assert!(pending.await_plan(JobId::new("temp_2")).is_err());
    }

    #[test]
    fn age_counts_from_creation() {
        let mut job = GenerationJob::pending(JobId::provisional(1));
        assert!(job.age() < Duration::from_secs(5));
        job.created_at = Utc::now() - chrono::Duration::hours(1);
        assert!(job.age() >= Duration::from_secs(3599));
        job.created_at = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(job.age(), Duration::ZERO);
    }

    #[test]
    fn job_json_shape() {
        let job = GenerationJob::pending(JobId::provisional(1000));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["provisional_id"], "temp_1000");
        assert_eq!(json["status"], "pending");
        assert!(json.get("real_id").is_none());

        let back: GenerationJob = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }
}
