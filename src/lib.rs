//! NutriGenie: onboarding and asynchronous meal-plan generation core.

pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod identity;
pub mod model;
pub mod nutrition;
pub mod registration;
pub mod routes;
pub mod store;
