//! Onboarding submission and registration cancel.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::api::ProfileStore;
use crate::error::{ApiError, Error, ValidationError};
use crate::identity::IdentityProvider;
use crate::model::plan::DEFAULT_PLAN_DAYS;
use crate::model::{GenerationRequest, NutritionTargets, Profile};
use crate::nutrition::TargetStrategy;
use crate::store::{Database, settings_keys};

/// Result of a completed onboarding form.
#[derive(Debug, Clone, PartialEq)]
pub struct Onboarded {
    pub profile: Profile,
    pub targets: NutritionTargets,
}

pub struct OnboardingService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    targets: TargetStrategy,
    db: Arc<dyn Database>,
    context_id: String,
}

impl OnboardingService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        targets: TargetStrategy,
        db: Arc<dyn Database>,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            profiles,
            targets,
            db,
            context_id: context_id.into(),
        }
    }

    /// Validate, compute targets, create the profile, and remember the
    /// targets for the plan form.
    ///
    /// Targets are computed before the profile is created so bad input
    /// never reaches the store.
    pub async fn submit(&self, profile: Profile) -> Result<Onboarded, Error> {
        profile.validate()?;
        let targets = self.targets.targets(&profile, profile.fitness_goal).await?;
        let profile = self.profiles.create_profile(&profile).await?;

        if let Err(e) = self.save_targets(&targets).await {
            warn!("Could not cache nutrition targets: {e}");
        }
        info!(
            calories = targets.calories,
            protein_g = targets.protein_g,
            "Onboarding profile created"
        );
        Ok(Onboarded { profile, targets })
    }

    /// Targets cached at onboarding, if any.
    pub async fn saved_targets(&self) -> Result<Option<NutritionTargets>, Error> {
        let value = self
            .db
            .get_setting(&self.context_id, settings_keys::NUTRITION_TARGETS)
            .await?;
        Ok(value.and_then(|v| serde_json::from_value(v).ok()))
    }

    async fn save_targets(&self, targets: &NutritionTargets) -> Result<(), Error> {
        let value = serde_json::to_value(targets)
            .map_err(|e| crate::error::DatabaseError::Serialization(e.to_string()))?;
        self.db
            .set_setting(&self.context_id, settings_keys::NUTRITION_TARGETS, &value)
            .await?;
        Ok(())
    }

    /// Pre-filled request for the plan form: the stored profile with freshly
    /// computed targets and the default duration.
    pub async fn plan_defaults(&self, start_date: NaiveDate) -> Result<GenerationRequest, Error> {
        let profile = self
            .profiles
            .get_profile()
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: "profile".to_string(),
            })?;
        let targets = self.targets.targets(&profile, profile.fitness_goal).await?;
        Ok(GenerationRequest::from_profile(
            &profile,
            targets,
            start_date,
            DEFAULT_PLAN_DAYS,
            Vec::new(),
        )?)
    }

    /// Abandon an unfinished registration: delete the profile and sign out.
    ///
    /// Not allowed once registration is complete.
    pub async fn cancel_registration(&self) -> Result<(), Error> {
        let session = self
            .identity
            .current_session()
            .await?
            .ok_or_else(|| ApiError::Auth {
                reason: "no active session".to_string(),
            })?;

        if session.is_registered() {
            return Err(ValidationError::Invalid {
                field: "registration",
                reason: "registration is already complete".to_string(),
            }
            .into());
        }

        // The profile may never have been created.
        if let Err(e) = self.profiles.delete_profile().await {
            warn!(user_id = %session.user_id, "Profile delete during cancel failed: {e}");
        }
        if let Err(e) = self
            .db
            .delete_setting(&self.context_id, settings_keys::NUTRITION_TARGETS)
            .await
        {
            warn!("Could not clear cached targets: {e}");
        }

        self.identity.sign_out().await?;
        info!(user_id = %session.user_id, "Registration cancelled");
        Ok(())
    }
}
