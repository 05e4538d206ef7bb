use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use secrecy::ExposeSecret;
use tokio_stream::StreamExt;

use nutrigenie::api::{HttpBackend, PlanBackend};
use nutrigenie::config::{AppConfig, TargetSource};
use nutrigenie::generation::{
    CompletionPoller, GenerationPhase, JobId, Orchestrator, OrchestratorState, PollOutcome,
    SettingsJobCache,
};
use nutrigenie::identity::{IdentityProvider, MemorySessionProvider, Session, auth_changes};
use nutrigenie::nutrition::{NutritionPolicy, TargetStrategy};
use nutrigenie::registration::{
    OnboardingService, RegistrationResolver, RegistrationRouteState, registration_routes,
};
use nutrigenie::routes::Route;
use nutrigenie::store::{Database, LibSqlBackend};

const USAGE: &str = "usage: nutrigenie [serve | status | generate [YYYY-MM-DD] | wait <plan_id> | show <plan_id> | delete <plan_id> | cancel-registration]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("serve");

    eprintln!("NutriGenie v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.api_url);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Context: {}", config.context_id);

    // ── Session ──────────────────────────────────────────────────────────
    let session = match (&config.user_id, &config.access_token) {
        (Some(user_id), Some(token)) => Some(Session::new(
            user_id.clone(),
            token.expose_secret().to_string(),
        )),
        _ => None,
    };
    let identity: Arc<dyn IdentityProvider> = Arc::new(MemorySessionProvider::new(session));

    let mut changes = auth_changes(identity.as_ref());
    tokio::spawn(async move {
        while let Some(event) = changes.next().await {
            tracing::info!(event = ?event, "Auth state changed");
        }
    });

    // ── Collaborators ────────────────────────────────────────────────────
    let backend = Arc::new(HttpBackend::new(
        config.api_url.clone(),
        config.app_url.clone(),
        config.http_timeout,
        Arc::clone(&identity),
    )?);
    let targets = match config.targets {
        TargetSource::Local => TargetStrategy::Local(NutritionPolicy::default()),
        TargetSource::Remote => TargetStrategy::Remote(backend.clone()),
    };

    // ── Local cache ──────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );
    let cache: Arc<dyn OrchestratorState> =
        Arc::new(SettingsJobCache::new(Arc::clone(&db), config.context_id.clone()));

    let resolver = Arc::new(RegistrationResolver::new(
        Arc::clone(&identity),
        backend.clone(),
    ));
    let onboarding = OnboardingService::new(
        Arc::clone(&identity),
        backend.clone(),
        targets.clone(),
        Arc::clone(&db),
        config.context_id.clone(),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        backend.clone(),
        backend.clone(),
        Arc::clone(&identity),
    ));
    let plans: Arc<dyn PlanBackend> = backend.clone();
    let poller = CompletionPoller::new(Arc::clone(&orchestrator), plans, config.poller);

    match command {
        "serve" => {
            let app = registration_routes(RegistrationRouteState {
                resolver: Arc::clone(&resolver),
                targets,
            });
            let listener = tokio::net::TcpListener::bind(config.bind)
                .await
                .with_context(|| format!("binding {}", config.bind))?;
            eprintln!("   Listening: http://{}\n", config.bind);
            tracing::info!(addr = %config.bind, "Registration API started");
            axum::serve(listener, app).await?;
        }
        "status" => {
            let resolution = resolver.resolve().await;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
            match orchestrator.current_job().await? {
                Some(job) => println!("current job: {} ({})", job.current_id(), job.phase()),
                None => println!("current job: none ({})", GenerationPhase::Idle),
            }
        }
        "generate" => {
            let start = match args.get(1) {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("invalid start date `{raw}`"))?,
                None => Utc::now().date_naive(),
            };
            let request = onboarding.plan_defaults(start).await?;
            let submission = orchestrator.submit(request).await?;
            println!("-> {}", submission.redirect);

            let handle = poller.spawn(submission.job_id.clone());
            let mut progress = handle.progress();
            tokio::spawn(async move {
                while progress.changed().await.is_ok() {
                    let p = progress.borrow().clone();
                    eprintln!("   [{:>3}%] {}s {}", p.percent, p.elapsed_secs, p.step);
                }
            });
            report(handle.wait().await);
            // Let the background reconcile (and registration finalize) settle.
            submission.reconciled().await;
        }
        "wait" => {
            let Some(id) = args.get(1) else {
                bail!(USAGE);
            };
            report(poller.spawn(JobId::new(id.as_str())).wait().await);
        }
        "show" => {
            let Some(id) = args.get(1) else {
                bail!(USAGE);
            };
            let plan_id = JobId::new(id.as_str());
            let plan = orchestrator.plan_for_display(&plan_id).await?;
            if let Some(plan) = &plan {
                println!("{}", serde_json::to_string_pretty(plan)?);
            }
            println!("-> {}", Route::plan_view(&plan_id, plan.as_ref()));
        }
        "delete" => {
            let Some(id) = args.get(1) else {
                bail!(USAGE);
            };
            orchestrator.delete_plan(&JobId::new(id.as_str())).await?;
            println!("deleted {id}");
        }
        "cancel-registration" => {
            onboarding.cancel_registration().await?;
            println!("registration cancelled");
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

fn report(outcome: PollOutcome) {
    match &outcome {
        PollOutcome::Ready { plan_id } => println!("plan ready: {plan_id}"),
        PollOutcome::Failed { failure } => {
            println!("generation failed ({}): {}", failure.kind, failure.reason)
        }
        PollOutcome::Superseded { current } => println!("superseded by {current}"),
        PollOutcome::Cancelled => println!("cancelled"),
    }
    if let Some(route) = outcome.redirect() {
        println!("-> {route}");
    }
}
