//! Domain data shared by the resolver, calculator, and orchestrator.

pub mod plan;
pub mod profile;

pub use plan::{
    DayPlan, GenerateResponse, GenerationRequest, Ingredient, Meal, MealPlan, MealType, Recipe,
    StoreSummary,
};
pub use profile::{ActivityLevel, FitnessGoal, Gender, NutritionTargets, Profile};
