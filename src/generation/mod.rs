//! Asynchronous plan generation: job model, cache, orchestrator, poller.

pub mod job;
pub mod orchestrator;
pub mod poller;
pub mod state;

pub use job::{
    GenerationJob, GenerationPhase, JobFailure, JobId, JobStatus, PROVISIONAL_PREFIX,
    ProvisionalIdGen,
};
pub use orchestrator::{Orchestrator, Reconciliation, Submission};
pub use poller::{CompletionPoller, PollOutcome, PollProgress, PollerConfig, PollerHandle};
pub use state::{OrchestratorState, SettingsJobCache};
