//! Page routes the core redirects to.

use serde::Serialize;

use crate::generation::JobId;
use crate::model::MealPlan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "id", rename_all = "snake_case")]
pub enum Route {
    Login,
    Onboarding,
    /// Request-configuration step; also the retry target after a failure.
    NewPlan,
    Dashboard,
    Waiting(JobId),
    Plan(JobId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Onboarding => "/onboarding".to_string(),
            Self::NewPlan => "/dashboard/meal-plan/new".to_string(),
            Self::Dashboard => "/dashboard".to_string(),
            Self::Waiting(id) => format!("/dashboard/meal-plan/waiting?plan_id={id}"),
            Self::Plan(id) => format!("/dashboard/meal-plan/{id}"),
        }
    }

    /// Where the plan view for `plan_id` ends up: the plan itself, or plan
    /// creation when there is nothing to show.
    pub fn plan_view(plan_id: &JobId, plan: Option<&MealPlan>) -> Self {
        match plan {
            Some(_) => Self::Plan(plan_id.clone()),
            None => Self::NewPlan,
        }
    }

    /// Everything but the login page needs a session.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Login)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}
