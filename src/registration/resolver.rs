//! Registration state resolver and the route guard built on it.
//!
//! The resolver is read-only and never cached: the guard calls it on every
//! protected-route entry, since a second tab may have changed profile or
//! registration state in the meantime.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::ProfileStore;
use crate::error::ApiError;
use crate::identity::IdentityProvider;
use crate::routes::Route;

/// Where a session stands in registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    Login,
    Onboarding,
    FirstPlan,
    Dashboard,
}

impl RegistrationStep {
    /// The page a session at this step lands on.
    pub fn landing(&self) -> Route {
        match self {
            Self::Login => Route::Login,
            Self::Onboarding => Route::Onboarding,
            Self::FirstPlan => Route::NewPlan,
            Self::Dashboard => Route::Dashboard,
        }
    }

    /// Whether a session at this step may open `route`.
    ///
    /// Plan creation and plan pages open at `FirstPlan` so a completed plan
    /// stays visible even if finalizing registration failed.
    pub fn admits(&self, route: &Route) -> bool {
        match route {
            Route::Login => true,
            Route::Onboarding => *self == Self::Onboarding,
            Route::NewPlan | Route::Waiting(_) | Route::Plan(_) => {
                matches!(self, Self::FirstPlan | Self::Dashboard)
            }
            Route::Dashboard => *self == Self::Dashboard,
        }
    }
}

impl std::fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Login => "login",
            Self::Onboarding => "onboarding",
            Self::FirstPlan => "first_plan",
            Self::Dashboard => "dashboard",
        };
        write!(f, "{s}")
    }
}

/// Resolver answer, with the facts it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub step: RegistrationStep,
    pub authenticated: bool,
    pub registration_completed: bool,
    /// `None` when the profile store was not consulted or not reachable.
    pub has_profile: Option<bool>,
    /// Non-fatal problem worth showing (e.g. profile check failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Resolution {
    fn new(step: RegistrationStep) -> Self {
        Self {
            step,
            authenticated: step != RegistrationStep::Login,
            registration_completed: step == RegistrationStep::Dashboard,
            has_profile: None,
            warning: None,
        }
    }
}

/// Result of a route guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

pub struct RegistrationResolver {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
}

impl RegistrationResolver {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles }
    }

    /// Decide which registration step the current session is in.
    pub async fn resolve(&self) -> Resolution {
        let session = match self.identity.current_session().await {
            Ok(Some(session)) => session,
            Ok(None) => return Resolution::new(RegistrationStep::Login),
            Err(e) => {
                warn!("Session lookup failed, treating as signed out: {e}");
                return Resolution::new(RegistrationStep::Login);
            }
        };

        if session.is_registered() {
            return Resolution::new(RegistrationStep::Dashboard);
        }

        match self.profiles.get_profile().await {
            Ok(Some(_)) => Resolution {
                has_profile: Some(true),
                ..Resolution::new(RegistrationStep::FirstPlan)
            },
            Ok(None) => Resolution {
                has_profile: Some(false),
                ..Resolution::new(RegistrationStep::Onboarding)
            },
            Err(ApiError::Auth { reason }) => {
                debug!(user_id = %session.user_id, "Profile check rejected credentials: {reason}");
                Resolution::new(RegistrationStep::Login)
            }
            Err(e) => {
                warn!(user_id = %session.user_id, "Profile check failed, asking for onboarding: {e}");
                Resolution {
                    warning: Some(format!("Could not check your profile: {e}")),
                    ..Resolution::new(RegistrationStep::Onboarding)
                }
            }
        }
    }

    /// Re-resolve and decide whether `target` may be entered.
    pub async fn guard(&self, target: &Route) -> GuardDecision {
        if !target.is_protected() {
            return GuardDecision::Allow;
        }
        let step = self.resolve().await.step;
        if step.admits(target) {
            GuardDecision::Allow
        } else {
            debug!(target = %target, step = %step, "Redirecting");
            GuardDecision::Redirect(step.landing())
        }
    }
}
