//! Tunable nutrition policy: activity multipliers, goal adjustments, and
//! per-kilogram macro constants.
//!
//! The product shipped two inconsistent tables over time (a five-tier scale
//! keyed `very_active`/`extra_active` and one keyed `active`/`veryActive`, plus
//! differing lose/gain multipliers). `NutritionPolicy::default()` is the one
//! canonical version; callers wanting another variant build their own.

use serde::{Deserialize, Serialize};

use crate::model::{ActivityLevel, FitnessGoal};

/// Activity multiplier per tier (range 1.2 to 1.9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityTable {
    pub sedentary: f64,
    pub light: f64,
    pub moderate: f64,
    pub very_active: f64,
    pub extra_active: f64,
}

impl ActivityTable {
    pub fn multiplier(&self, level: ActivityLevel) -> f64 {
        match level {
            ActivityLevel::Sedentary => self.sedentary,
            ActivityLevel::Light => self.light,
            ActivityLevel::Moderate => self.moderate,
            ActivityLevel::VeryActive => self.very_active,
            ActivityLevel::ExtraActive => self.extra_active,
        }
    }
}

impl Default for ActivityTable {
    fn default() -> Self {
        Self {
            sedentary: 1.2,
            light: 1.375,
            moderate: 1.55,
            very_active: 1.725,
            extra_active: 1.9,
        }
    }
}

/// Calorie adjustment applied to TDEE per goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalAdjustments {
    pub lose: f64,
    pub maintain: f64,
    pub gain: f64,
}

impl GoalAdjustments {
    pub fn factor(&self, goal: FitnessGoal) -> f64 {
        match goal {
            FitnessGoal::Lose => self.lose,
            FitnessGoal::Maintain => self.maintain,
            FitnessGoal::Gain => self.gain,
        }
    }
}

impl Default for GoalAdjustments {
    fn default() -> Self {
        Self {
            lose: 0.85,
            maintain: 1.0,
            gain: 1.10,
        }
    }
}

/// Complete calculator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionPolicy {
    pub activity: ActivityTable,
    pub goals: GoalAdjustments,
    /// Protein grams per kg of bodyweight.
    pub protein_g_per_kg: f64,
    /// Protein grams per kg while losing weight.
    pub protein_g_per_kg_lose: f64,
    /// Fat grams per kg of bodyweight.
    pub fat_g_per_kg: f64,
}

impl NutritionPolicy {
    pub fn protein_per_kg(&self, goal: FitnessGoal) -> f64 {
        match goal {
            FitnessGoal::Lose => self.protein_g_per_kg_lose,
            FitnessGoal::Maintain | FitnessGoal::Gain => self.protein_g_per_kg,
        }
    }
}

impl Default for NutritionPolicy {
    fn default() -> Self {
        Self {
            activity: ActivityTable::default(),
            goals: GoalAdjustments::default(),
            protein_g_per_kg: 2.2,
            protein_g_per_kg_lose: 2.6,
            fat_g_per_kg: 0.8,
        }
    }
}
