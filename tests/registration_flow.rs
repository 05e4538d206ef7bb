//! Registration resolver, route guard, and onboarding against stub stores.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::NaiveDate;

use nutrigenie::error::{ApiError, FailureKind};
use nutrigenie::generation::JobId;
use nutrigenie::identity::{IdentityProvider, MemorySessionProvider, Session};
use nutrigenie::model::Profile;
use nutrigenie::nutrition::TargetStrategy;
use nutrigenie::registration::{
    GuardDecision, OnboardingService, RegistrationResolver, RegistrationStep,
};
use nutrigenie::routes::Route;
use nutrigenie::store::{Database, MemoryBackend};

use common::{StubProfiles, profile};

fn signed_in(registered: Option<bool>) -> Arc<MemorySessionProvider> {
    let mut session = Session::new("user_1", "token_1");
    session.registration_completed = registered;
    Arc::new(MemorySessionProvider::new(Some(session)))
}

fn resolver(
    identity: &Arc<MemorySessionProvider>,
    profiles: &Arc<StubProfiles>,
) -> RegistrationResolver {
    RegistrationResolver::new(identity.clone(), profiles.clone())
}

#[tokio::test]
async fn no_session_resolves_to_login() {
    let identity = Arc::new(MemorySessionProvider::signed_out());
    let profiles = StubProfiles::with_profile(Some(profile()));
    let resolution = resolver(&identity, &profiles).resolve().await;
    assert_eq!(resolution.step, RegistrationStep::Login);
    assert!(!resolution.authenticated);
}

#[tokio::test]
async fn registered_identity_always_reaches_dashboard() {
    for stored in [None, Some(profile())] {
        let identity = signed_in(Some(true));
        let profiles = StubProfiles::with_profile(stored);
        profiles
            .fail_with(ApiError::Unavailable {
                reason: "down".to_string(),
            })
            .await;
        let resolution = resolver(&identity, &profiles).resolve().await;
        assert_eq!(resolution.step, RegistrationStep::Dashboard);
        assert!(resolution.warning.is_none());
    }
}

#[tokio::test]
async fn unregistered_without_profile_goes_to_onboarding() {
    for flag in [None, Some(false)] {
        let identity = signed_in(flag);
        let profiles = StubProfiles::with_profile(None);
        let resolution = resolver(&identity, &profiles).resolve().await;
        assert_eq!(resolution.step, RegistrationStep::Onboarding);
        assert_eq!(resolution.has_profile, Some(false));
    }
}

#[tokio::test]
async fn unregistered_with_profile_goes_to_first_plan() {
    let identity = signed_in(Some(false));
    let profiles = StubProfiles::with_profile(Some(profile()));
    let resolution = resolver(&identity, &profiles).resolve().await;
    assert_eq!(resolution.step, RegistrationStep::FirstPlan);
    assert_eq!(resolution.has_profile, Some(true));
}

#[tokio::test]
async fn unreachable_profile_store_fails_closed_to_onboarding() {
    let identity = signed_in(None);
    let profiles = StubProfiles::with_profile(Some(profile()));
    profiles
        .fail_with(ApiError::Unavailable {
            reason: "connection refused".to_string(),
        })
        .await;

    let resolution = resolver(&identity, &profiles).resolve().await;
    assert_eq!(resolution.step, RegistrationStep::Onboarding);
    assert!(resolution.warning.is_some());
    assert_eq!(resolution.has_profile, None);
}

#[tokio::test]
async fn rejected_credentials_resolve_to_login() {
    let identity = signed_in(None);
    let profiles = StubProfiles::with_profile(None);
    profiles
        .fail_with(ApiError::Auth {
            reason: "expired".to_string(),
        })
        .await;
    let resolution = resolver(&identity, &profiles).resolve().await;
    assert_eq!(resolution.step, RegistrationStep::Login);
}

#[tokio::test]
async fn guard_re_resolves_on_every_entry() {
    let identity = signed_in(None);
    let profiles = StubProfiles::with_profile(None);
    let resolver = resolver(&identity, &profiles);

    assert_eq!(
        resolver.guard(&Route::NewPlan).await,
        GuardDecision::Redirect(Route::Onboarding)
    );

    // Another tab finishes onboarding.
    *profiles.profile.lock().await = Some(profile());
    assert_eq!(resolver.guard(&Route::NewPlan).await, GuardDecision::Allow);
    assert_eq!(
        resolver.guard(&Route::Dashboard).await,
        GuardDecision::Redirect(Route::NewPlan)
    );
    assert_eq!(
        resolver.guard(&Route::Plan(JobId::new("plan_42"))).await,
        GuardDecision::Allow
    );

    identity.set_registration_completed(true).await.unwrap();
    assert_eq!(resolver.guard(&Route::Dashboard).await, GuardDecision::Allow);
    assert_eq!(
        resolver.guard(&Route::Onboarding).await,
        GuardDecision::Redirect(Route::Dashboard)
    );

    identity.sign_out().await.unwrap();
    assert_eq!(
        resolver.guard(&Route::Dashboard).await,
        GuardDecision::Redirect(Route::Login)
    );
    assert_eq!(resolver.guard(&Route::Login).await, GuardDecision::Allow);
}

fn onboarding(
    identity: &Arc<MemorySessionProvider>,
    profiles: &Arc<StubProfiles>,
    db: &Arc<dyn Database>,
) -> OnboardingService {
    OnboardingService::new(
        identity.clone(),
        profiles.clone(),
        TargetStrategy::default(),
        Arc::clone(db),
        "tab",
    )
}

#[tokio::test]
async fn onboarding_creates_profile_and_caches_targets() {
    let identity = signed_in(None);
    let profiles = StubProfiles::with_profile(None);
    let db: Arc<dyn Database> = Arc::new(MemoryBackend::new());
    let service = onboarding(&identity, &profiles, &db);

    let onboarded = service.submit(profile()).await.unwrap();
    assert_eq!(onboarded.targets.calories, 2798);
    assert_eq!(onboarded.profile.user_id.as_deref(), Some("user_1"));
    assert_eq!(profiles.creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        service.saved_targets().await.unwrap(),
        Some(onboarded.targets)
    );

    let resolution = RegistrationResolver::new(identity.clone(), profiles.clone())
        .resolve()
        .await;
    assert_eq!(resolution.step, RegistrationStep::FirstPlan);

    let start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let defaults = service.plan_defaults(start).await.unwrap();
    assert_eq!(defaults.days(), 7);
    assert_eq!(defaults.calories_per_day, 2798);
    assert_eq!(defaults.location_zip, "94110");
}

#[tokio::test]
async fn invalid_profile_never_reaches_the_store() {
    let identity = signed_in(None);
    let profiles = StubProfiles::with_profile(None);
    let db: Arc<dyn Database> = Arc::new(MemoryBackend::new());
    let service = onboarding(&identity, &profiles, &db);

    let bad = Profile {
        height_cm: 20.0,
        ..profile()
    };
    let err = service.submit(bad).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);

    let bad_zip = Profile {
        postal_code: "ABCDE".to_string(),
        ..profile()
    };
    assert!(service.submit(bad_zip).await.is_err());
    assert_eq!(profiles.creates.load(Ordering::SeqCst), 0);
    assert_eq!(service.saved_targets().await.unwrap(), None);
}

#[tokio::test]
async fn cancel_registration_deletes_profile_and_signs_out() {
    let identity = signed_in(Some(false));
    let profiles = StubProfiles::with_profile(Some(profile()));
    let db: Arc<dyn Database> = Arc::new(MemoryBackend::new());
    let service = onboarding(&identity, &profiles, &db);

    service.cancel_registration().await.unwrap();
    assert_eq!(profiles.deletes.load(Ordering::SeqCst), 1);
    assert!(profiles.profile.lock().await.is_none());
    assert!(identity.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn cancel_tolerates_missing_profile() {
    let identity = signed_in(None);
    let profiles = StubProfiles::with_profile(None);
    let db: Arc<dyn Database> = Arc::new(MemoryBackend::new());
    let service = onboarding(&identity, &profiles, &db);

    service.cancel_registration().await.unwrap();
    assert!(identity.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn completed_registration_cannot_be_cancelled() {
    let identity = signed_in(Some(true));
    let profiles = StubProfiles::with_profile(Some(profile()));
    let db: Arc<dyn Database> = Arc::new(MemoryBackend::new());
    let service = onboarding(&identity, &profiles, &db);

    let err = service.cancel_registration().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);
    assert_eq!(profiles.deletes.load(Ordering::SeqCst), 0);
    assert!(identity.current_session().await.unwrap().is_some());
}
