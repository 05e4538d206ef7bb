//! Contracts for the external collaborators: profile store, plan-generation
//! backend, registration finalize endpoint, and macro-compute backend.

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{GenerateResponse, GenerationRequest, MealPlan, NutritionTargets, Profile};
use crate::nutrition::MacroInput;

/// `/profiles`: one profile per identity, bearer-authenticated.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the caller's profile. `Ok(None)` when the store answers 404.
    async fn get_profile(&self) -> Result<Option<Profile>, ApiError>;

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, ApiError>;

    async fn update_profile(&self, profile: &Profile) -> Result<Profile, ApiError>;

    async fn delete_profile(&self) -> Result<(), ApiError>;
}

/// `/meal-plans`: generation and retrieval.
#[async_trait]
pub trait PlanBackend: Send + Sync {
    /// Run generation. Resolves once the plan exists.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerateResponse, ApiError>;

    /// Fetch a plan by backend id. `Ok(None)` while the backend answers 404.
    async fn get_plan(&self, plan_id: &str) -> Result<Option<MealPlan>, ApiError>;

    async fn delete_plan(&self, plan_id: &str) -> Result<(), ApiError>;
}

/// `POST /api/complete-registration`. Idempotent.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    async fn complete_registration(&self) -> Result<(), ApiError>;
}

/// `POST /macros/compute`: server-side alternative to the local calculator.
#[async_trait]
pub trait MacroBackend: Send + Sync {
    async fn compute_macros(&self, input: &MacroInput) -> Result<NutritionTargets, ApiError>;
}
