//! REST endpoints for registration status and nutrition previews.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use super::resolver::{RegistrationResolver, RegistrationStep};
use crate::error::{Error, FailureKind};
use crate::model::{ActivityLevel, FitnessGoal, Gender, Profile};
use crate::nutrition::TargetStrategy;

/// Shared state for registration routes.
#[derive(Clone)]
pub struct RegistrationRouteState {
    pub resolver: Arc<RegistrationResolver>,
    pub targets: TargetStrategy,
}

#[derive(Debug, Serialize)]
struct CheckRegistration {
    authenticated: bool,
    registration_completed: bool,
    has_profile: Option<bool>,
    next_step: RegistrationStep,
    redirect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// GET /api/check-registration
///
/// Resolves afresh on every call.
async fn check_registration(State(state): State<RegistrationRouteState>) -> impl IntoResponse {
    let resolution = state.resolver.resolve().await;
    Json(CheckRegistration {
        authenticated: resolution.authenticated,
        registration_completed: resolution.registration_completed,
        has_profile: resolution.has_profile,
        next_step: resolution.step,
        redirect: resolution.step.landing().path(),
        warning: resolution.warning,
    })
}

/// Body metrics needed for a targets preview.
#[derive(Debug, Deserialize)]
struct TargetsPreview {
    age: u32,
    gender: Gender,
    weight_kg: f64,
    height_cm: f64,
    activity_level: ActivityLevel,
    #[serde(default)]
    fitness_goal: FitnessGoal,
}

impl TargetsPreview {
    fn into_profile(self) -> Profile {
        Profile {
            user_id: None,
            age: self.age,
            gender: self.gender,
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            activity_level: self.activity_level,
            fitness_goal: self.fitness_goal,
            weekly_budget: Decimal::ZERO,
            postal_code: String::new(),
            dietary_restrictions: Vec::new(),
        }
    }
}

/// POST /api/nutrition/targets
///
/// Returns the targets the onboarding and plan forms would pre-fill.
async fn preview_targets(
    State(state): State<RegistrationRouteState>,
    Json(body): Json<TargetsPreview>,
) -> Response {
    let profile = body.into_profile();
    match state.targets.targets(&profile, profile.fitness_goal).await {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &Error) -> Response {
    let kind = e.kind();
    let status = match kind {
        FailureKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Auth => StatusCode::UNAUTHORIZED,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::BackendUnavailable => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(serde_json::json!({"error": e.to_string(), "kind": kind})),
    )
        .into_response()
}

/// Build the registration REST routes.
pub fn registration_routes(state: RegistrationRouteState) -> Router {
    Router::new()
        .route("/api/check-registration", get(check_registration))
        .route("/api/nutrition/targets", post(preview_targets))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
