//! Meal plans and generation requests, in the plan backend's wire format.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::profile::{NutritionTargets, Profile};
use crate::error::ValidationError;

/// Default plan length offered by the creation form.
pub const DEFAULT_PLAN_DAYS: u32 = 7;

/// Longest plan the backend accepts.
pub const MAX_PLAN_DAYS: u32 = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub unit: String,
    pub quantity: f64,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub price_per_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub prep_time_minutes: u32,
    #[serde(default)]
    pub cook_time_minutes: u32,
    pub servings: u32,
    #[serde(default)]
    pub calories_per_serving: f64,
    #[serde(default)]
    pub protein_per_serving: f64,
    #[serde(default)]
    pub carbs_per_serving: f64,
    #[serde(default)]
    pub fat_per_serving: f64,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub meal_type: MealType,
    pub recipe: Recipe,
    pub servings: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day_of_week: u8,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub place_id: String,
    pub name: String,
}

/// A generated plan. Immutable once returned; addressed by its backend id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<DayPlan>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stores: Option<Vec<StoreSummary>>,
}

impl MealPlan {
    /// A plan with no days is treated as not yet generated.
    pub fn is_ready(&self) -> bool {
        !self.days.is_empty()
    }
}

/// Parameters of one generation job. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub calories_per_day: u32,
    pub protein_per_day: u32,
    pub carbs_per_day: u32,
    pub fat_per_day: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub weekly_budget: Decimal,
    pub location_zip: String,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub store_place_ids: Vec<String>,
}

impl GenerationRequest {
    /// Pre-fill a request from the profile and its computed targets.
    ///
    /// The end date is inclusive: a 7-day plan starting Monday ends Sunday.
    pub fn from_profile(
        profile: &Profile,
        targets: NutritionTargets,
        start_date: NaiveDate,
        days: u32,
        store_place_ids: Vec<String>,
    ) -> Result<Self, ValidationError> {
        if days == 0 || days > MAX_PLAN_DAYS {
            return Err(ValidationError::InvalidDateRange(format!(
                "plan length must be 1..={MAX_PLAN_DAYS} days, got {days}"
            )));
        }
        let end_date = start_date
            .checked_add_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| ValidationError::InvalidDateRange("end date overflow".to_string()))?;

        Ok(Self {
            start_date,
            end_date,
            calories_per_day: targets.calories,
            protein_per_day: targets.protein_g,
            carbs_per_day: targets.carbs_g,
            fat_per_day: targets.fat_g,
            weekly_budget: profile.weekly_budget,
            location_zip: profile.postal_code.clone(),
            dietary_restrictions: profile.dietary_restrictions.clone(),
            store_place_ids,
        })
    }

    /// Reject malformed requests before anything is submitted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end_date < self.start_date {
            return Err(ValidationError::InvalidDateRange(format!(
                "{} is before {}",
                self.end_date, self.start_date
            )));
        }
        let span = (self.end_date - self.start_date).num_days() + 1;
        if span > i64::from(MAX_PLAN_DAYS) {
            return Err(ValidationError::InvalidDateRange(format!(
                "{span} days exceeds the {MAX_PLAN_DAYS}-day maximum"
            )));
        }
        if self.calories_per_day == 0 {
            return Err(ValidationError::Invalid {
                field: "calories_per_day",
                reason: "must be positive".to_string(),
            });
        }
        if self.weekly_budget <= Decimal::ZERO {
            return Err(ValidationError::Invalid {
                field: "weekly_budget",
                reason: "must be positive".to_string(),
            });
        }
        if self.location_zip.trim().is_empty() {
            return Err(ValidationError::InvalidPostalCode(self.location_zip.clone()));
        }
        Ok(())
    }

    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Response of `POST /meal-plans/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub plan_id: String,
    pub plan: MealPlan,
}
