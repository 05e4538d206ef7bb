//! Registration: resolver, route guard, onboarding, and REST routes.

pub mod onboarding;
pub mod resolver;
pub mod routes;

pub use onboarding::{Onboarded, OnboardingService};
pub use resolver::{GuardDecision, RegistrationResolver, RegistrationStep, Resolution};
pub use routes::{RegistrationRouteState, registration_routes};
