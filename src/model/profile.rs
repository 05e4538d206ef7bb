//! User profile and derived nutrition targets.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Minimum accepted weekly grocery budget.
pub const MIN_WEEKLY_BUDGET: Decimal = dec!(20);

pub const AGE_RANGE: (u32, u32) = (13, 100);
pub const WEIGHT_KG_RANGE: (f64, f64) = (30.0, 300.0);
pub const HEIGHT_CM_RANGE: (f64, f64) = (100.0, 250.0);

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("valid postal code regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Canonical five-tier activity scale. The alternate spellings used by the
/// goals screen are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    #[serde(alias = "active")]
    VeryActive,
    #[serde(alias = "veryActive")]
    ExtraActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        Self::Sedentary,
        Self::Light,
        Self::Moderate,
        Self::VeryActive,
        Self::ExtraActive,
    ];
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::VeryActive => "very_active",
            Self::ExtraActive => "extra_active",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitnessGoal {
    #[serde(rename = "lose_weight", alias = "lose")]
    Lose,
    #[serde(rename = "maintain")]
    Maintain,
    #[serde(rename = "gain_muscle", alias = "gain")]
    Gain,
}

impl Default for FitnessGoal {
    fn default() -> Self {
        Self::Maintain
    }
}

impl std::fmt::Display for FitnessGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lose => "lose_weight",
            Self::Maintain => "maintain",
            Self::Gain => "gain_muscle",
        };
        write!(f, "{s}")
    }
}

/// Physical and dietary profile submitted during onboarding.
///
/// At most one exists per identity; its presence tells the registration
/// resolver that onboarding is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub age: u32,
    pub gender: Gender,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub fitness_goal: FitnessGoal,
    #[serde(with = "rust_decimal::serde::float")]
    pub weekly_budget: Decimal,
    #[serde(rename = "location_zip")]
    pub postal_code: String,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

impl Profile {
    /// Reject values outside the safe numeric bounds. Never clamps.
    pub fn validate_body(&self) -> Result<(), ValidationError> {
        check_range("age", f64::from(self.age), AGE_RANGE.0.into(), AGE_RANGE.1.into())?;
        check_range("weight_kg", self.weight_kg, WEIGHT_KG_RANGE.0, WEIGHT_KG_RANGE.1)?;
        check_range("height_cm", self.height_cm, HEIGHT_CM_RANGE.0, HEIGHT_CM_RANGE.1)?;
        Ok(())
    }

    /// Full onboarding validation: body metrics, budget, postal code, tags.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_body()?;
        if self.weekly_budget < MIN_WEEKLY_BUDGET {
            return Err(ValidationError::BudgetTooLow {
                value: self.weekly_budget.to_string(),
                min: MIN_WEEKLY_BUDGET.to_string(),
            });
        }
        if !POSTAL_CODE.is_match(self.postal_code.trim()) {
            return Err(ValidationError::InvalidPostalCode(self.postal_code.clone()));
        }
        if self.dietary_restrictions.iter().any(|t| t.trim().is_empty()) {
            return Err(ValidationError::Invalid {
                field: "dietary_restrictions",
                reason: "tags must not be blank".to_string(),
            });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    // NaN fails both comparisons, so test the positive form.
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Daily calorie and macro targets. Derived from a profile, never
/// authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NutritionTargets {
    pub calories: u32,
    pub protein_g: u32,
    pub carbs_g: u32,
    #[serde(alias = "fats_g")]
    pub fat_g: u32,
}
