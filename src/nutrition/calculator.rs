//! Mifflin–St Jeor target calculator.
//!
//! Runs both to pre-fill the plan form and to redisplay saved values, so it
//! must stay pure: same inputs, same integers.

use crate::error::ValidationError;
use crate::model::{FitnessGoal, Gender, NutritionTargets, Profile};

use super::policy::NutritionPolicy;

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARBS: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

/// Basal metabolic rate in kcal/day.
pub fn basal_metabolic_rate(profile: &Profile) -> f64 {
    let base = 10.0 * profile.weight_kg + 6.25 * profile.height_cm - 5.0 * f64::from(profile.age);
    match profile.gender {
        Gender::Female => base - 161.0,
        Gender::Male | Gender::Other => base + 5.0,
    }
}

/// Total daily energy expenditure before any goal adjustment.
pub fn total_energy(profile: &Profile, policy: &NutritionPolicy) -> f64 {
    basal_metabolic_rate(profile) * policy.activity.multiplier(profile.activity_level)
}

/// Compute daily targets for `profile` pursuing `goal`.
///
/// The profile's own `fitness_goal` is ignored in favor of `goal`, so the
/// goals screen can preview alternatives without mutating the profile.
pub fn compute_targets(
    profile: &Profile,
    goal: FitnessGoal,
    policy: &NutritionPolicy,
) -> Result<NutritionTargets, ValidationError> {
    profile.validate_body()?;

    let calories = total_energy(profile, policy) * policy.goals.factor(goal);
    let protein = policy.protein_per_kg(goal) * profile.weight_kg;
    let fat = policy.fat_g_per_kg * profile.weight_kg;
    let carbs = ((calories - protein * KCAL_PER_G_PROTEIN - fat * KCAL_PER_G_FAT)
        / KCAL_PER_G_CARBS)
        .max(0.0);

    Ok(NutritionTargets {
        calories: round_grams(calories),
        protein_g: round_grams(protein),
        carbs_g: round_grams(carbs),
        fat_g: round_grams(fat),
    })
}

fn round_grams(value: f64) -> u32 {
    // Inputs are bounded by validation, so the cast cannot truncate.
    value.round().max(0.0) as u32
}
