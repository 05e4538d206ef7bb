//! Nutrition targets: local calculator and the server-side alternate flow.

pub mod calculator;
pub mod policy;

pub use calculator::{basal_metabolic_rate, compute_targets, total_energy};
pub use policy::{ActivityTable, GoalAdjustments, NutritionPolicy};

use std::sync::Arc;

use serde::Serialize;

use crate::api::MacroBackend;
use crate::error::Error;
use crate::model::{ActivityLevel, FitnessGoal, Gender, NutritionTargets, Profile};

/// Body of `POST /macros/compute`.
///
/// The macro endpoint predates the canonical activity names and only knows
/// two genders, so this carries its own wire spelling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroInput {
    pub age: u32,
    pub gender: &'static str,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub activity_level: &'static str,
    pub fitness_goal: FitnessGoal,
}

impl MacroInput {
    pub fn new(profile: &Profile, goal: FitnessGoal) -> Self {
        Self {
            age: profile.age,
            gender: match profile.gender {
                Gender::Female => "female",
                Gender::Male | Gender::Other => "male",
            },
            weight_kg: profile.weight_kg,
            height_cm: profile.height_cm,
            activity_level: match profile.activity_level {
                ActivityLevel::Sedentary => "sedentary",
                ActivityLevel::Light => "light",
                ActivityLevel::Moderate => "moderate",
                ActivityLevel::VeryActive => "active",
                ActivityLevel::ExtraActive => "veryActive",
            },
            fitness_goal: goal,
        }
    }
}

/// Where targets come from.
#[derive(Clone)]
pub enum TargetStrategy {
    /// Compute in-process with the given policy.
    Local(NutritionPolicy),
    /// Ask the macro backend. Inputs are still validated locally first.
    Remote(Arc<dyn MacroBackend>),
}

impl TargetStrategy {
    pub async fn targets(
        &self,
        profile: &Profile,
        goal: FitnessGoal,
    ) -> Result<NutritionTargets, Error> {
        match self {
            Self::Local(policy) => Ok(compute_targets(profile, goal, policy)?),
            Self::Remote(backend) => {
                profile.validate_body()?;
                let input = MacroInput::new(profile, goal);
                Ok(backend.compute_macros(&input).await?)
            }
        }
    }
}

impl Default for TargetStrategy {
    fn default() -> Self {
        Self::Local(NutritionPolicy::default())
    }
}

impl std::fmt::Debug for TargetStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(policy) => f.debug_tuple("Local").field(policy).finish(),
            Self::Remote(_) => f.write_str("Remote"),
        }
    }
}
