//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal_macros::dec;
use tokio::sync::{Mutex, oneshot};

use nutrigenie::api::{PlanBackend, ProfileStore, RegistrationApi};
use nutrigenie::error::{ApiError, DatabaseError};
use nutrigenie::generation::{
    CompletionPoller, GenerationJob, Orchestrator, OrchestratorState, PollerConfig,
    ProvisionalIdGen, SettingsJobCache,
};
use nutrigenie::identity::{IdentityProvider, MemorySessionProvider, Session};
use nutrigenie::model::{
    ActivityLevel, DayPlan, FitnessGoal, Gender, GenerateResponse, GenerationRequest, Meal,
    MealPlan, MealType, Profile, Recipe,
};
use nutrigenie::store::{Database, MemoryBackend};

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub type GenerateResult = Result<GenerateResponse, ApiError>;

/// Plan backend whose generate calls block until the test releases them.
///
/// Gates are keyed by the request's start date so concurrent submissions
/// can be answered in any order.
#[derive(Default)]
pub struct ScriptedPlans {
    gates: Mutex<HashMap<NaiveDate, oneshot::Receiver<GenerateResult>>>,
    plans: Mutex<HashMap<String, MealPlan>>,
    get_error: Mutex<Option<ApiError>>,
    pub generate_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl ScriptedPlans {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the answer channel for the request starting on `start`.
    pub async fn gate(&self, start: NaiveDate) -> oneshot::Sender<GenerateResult> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(start, rx);
        tx
    }

    /// Make a plan visible to `GET /meal-plans/{id}`.
    pub async fn publish(&self, id: &str, plan: MealPlan) {
        self.plans.lock().await.insert(id.to_string(), plan);
    }

    pub async fn fail_reads_with(&self, error: ApiError) {
        *self.get_error.lock().await = Some(error);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanBackend for ScriptedPlans {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerateResponse, ApiError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().await.remove(&request.start_date);
        let Some(gate) = gate else {
            return Err(ApiError::Unavailable {
                reason: format!("no scripted answer for {}", request.start_date),
            });
        };
        let answer = gate.await.unwrap_or_else(|_| {
            Err(ApiError::Unavailable {
                reason: "gate dropped".to_string(),
            })
        });
        if let Ok(response) = &answer {
            self.publish(&response.plan_id, response.plan.clone()).await;
        }
        answer
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<MealPlan>, ApiError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.get_error.lock().await.clone() {
            return Err(e);
        }
        Ok(self.plans.lock().await.get(plan_id).cloned())
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        match self.plans.lock().await.remove(plan_id) {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound {
                resource: "meal plan".to_string(),
            }),
        }
    }
}

/// Registration endpoint that counts calls and can be told to fail.
#[derive(Default)]
pub struct StubRegistration {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl StubRegistration {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistrationApi for StubRegistration {
    async fn complete_registration(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable {
                reason: "registration endpoint down".to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory profile store.
#[derive(Default)]
pub struct StubProfiles {
    pub profile: Mutex<Option<Profile>>,
    pub error: Mutex<Option<ApiError>>,
    pub creates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl StubProfiles {
    pub fn with_profile(profile: Option<Profile>) -> Arc<Self> {
        Arc::new(Self {
            profile: Mutex::new(profile),
            ..Self::default()
        })
    }

    pub async fn fail_with(&self, error: ApiError) {
        *self.error.lock().await = Some(error);
    }
}

#[async_trait]
impl ProfileStore for StubProfiles {
    async fn get_profile(&self) -> Result<Option<Profile>, ApiError> {
        if let Some(e) = self.error.lock().await.clone() {
            return Err(e);
        }
        Ok(self.profile.lock().await.clone())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, ApiError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut stored = profile.clone();
        stored.user_id = Some("user_1".to_string());
        *self.profile.lock().await = Some(stored.clone());
        Ok(stored)
    }

    async fn update_profile(&self, profile: &Profile) -> Result<Profile, ApiError> {
        *self.profile.lock().await = Some(profile.clone());
        Ok(profile.clone())
    }

    async fn delete_profile(&self) -> Result<(), ApiError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match self.profile.lock().await.take() {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound {
                resource: "profile".to_string(),
            }),
        }
    }
}

/// Job cache that records every write, in order.
pub struct RecordingCache {
    inner: SettingsJobCache,
    pub writes: std::sync::Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn new(db: Arc<dyn Database>, context_id: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: SettingsJobCache::new(db, context_id),
            writes: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrchestratorState for RecordingCache {
    async fn load(&self) -> Result<Option<GenerationJob>, DatabaseError> {
        self.inner.load().await
    }

    async fn save(&self, job: &GenerationJob) -> Result<(), DatabaseError> {
        let status = serde_json::to_value(job.status).unwrap();
        self.writes.lock().unwrap().push(format!(
            "save {} {}",
            job.current_id(),
            status.as_str().unwrap_or_default()
        ));
        self.inner.save(job).await
    }

    async fn clear(&self) -> Result<(), DatabaseError> {
        self.writes.lock().unwrap().push("clear".to_string());
        self.inner.clear().await
    }
}

/// One browser context wired against shared collaborators.
pub struct Context {
    pub orchestrator: Arc<Orchestrator>,
    pub poller: CompletionPoller,
    pub cache: Arc<RecordingCache>,
    pub identity: Arc<MemorySessionProvider>,
}

pub struct Harness {
    pub db: Arc<dyn Database>,
    pub plans: Arc<ScriptedPlans>,
    pub registration: Arc<StubRegistration>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            db: Arc::new(MemoryBackend::new()),
            plans: ScriptedPlans::new(),
            registration: Arc::new(StubRegistration::default()),
        }
    }

    /// A context whose provisional-id clock starts at `clock_ms`.
    pub fn context(&self, context_id: &str, clock_ms: u64) -> Context {
        self.context_with(context_id, clock_ms, fast_poller())
    }

    pub fn context_with(&self, context_id: &str, clock_ms: u64, config: PollerConfig) -> Context {
        let identity = Arc::new(MemorySessionProvider::new(Some(Session::new(
            "user_1", "token_1",
        ))));
        let cache = RecordingCache::new(Arc::clone(&self.db), context_id);
        let identity_dyn: Arc<dyn IdentityProvider> = identity.clone();
        let orchestrator = Arc::new(
            Orchestrator::new(
                cache.clone(),
                self.plans.clone(),
                self.registration.clone(),
                identity_dyn,
            )
            .with_id_source(ProvisionalIdGen::with_clock(move || clock_ms)),
        );
        let poller = CompletionPoller::new(Arc::clone(&orchestrator), self.plans.clone(), config);
        Context {
            orchestrator,
            poller,
            cache,
            identity,
        }
    }
}

pub fn fast_poller() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(3),
    }
}

pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, 1)
        .unwrap()
        .checked_add_days(Days::new(u64::from(n)))
        .unwrap()
}

pub fn request(start: NaiveDate) -> GenerationRequest {
    GenerationRequest {
        start_date: start,
        end_date: start + Days::new(6),
        calories_per_day: 2798,
        protein_per_day: 176,
        carbs_per_day: 379,
        fat_per_day: 64,
        weekly_budget: dec!(120),
        location_zip: "94110".to_string(),
        dietary_restrictions: vec!["vegetarian".to_string()],
        store_place_ids: Vec::new(),
    }
}

pub fn plan(days: u8) -> MealPlan {
    let start = day(0);
    MealPlan {
        start_date: start,
        end_date: start + Days::new(u64::from(days.max(1)) - 1),
        days: (0..days)
            .map(|d| DayPlan {
                day_of_week: d,
                meals: vec![Meal {
                    meal_type: MealType::Lunch,
                    recipe: Recipe {
                        name: format!("Chickpea salad {d}"),
                        description: None,
                        instructions: Vec::new(),
                        prep_time_minutes: 15,
                        cook_time_minutes: 0,
                        servings: 1,
                        calories_per_serving: 620.0,
                        protein_per_serving: 32.0,
                        carbs_per_serving: 74.0,
                        fat_per_serving: 18.0,
                        ingredients: Vec::new(),
                        dietary_tags: vec!["vegetarian".to_string()],
                    },
                    servings: 1,
                }],
            })
            .collect(),
        total_cost: dec!(96.40),
        stores: None,
    }
}

pub fn response(plan_id: &str, days: u8) -> GenerateResult {
    Ok(GenerateResponse {
        plan_id: plan_id.to_string(),
        plan: plan(days),
    })
}

pub fn profile() -> Profile {
    Profile {
        user_id: None,
        age: 30,
        gender: Gender::Male,
        weight_kg: 80.0,
        height_cm: 180.0,
        activity_level: ActivityLevel::Moderate,
        fitness_goal: FitnessGoal::Maintain,
        weekly_budget: dec!(120),
        postal_code: "94110".to_string(),
        dietary_restrictions: vec!["vegetarian".to_string()],
    }
}
