/*
 * Responsibility
 * - Load Config → build services → assemble Router
 * - Apply middleware (HTTP / CORS / security headers)
 * - Serve with axum::serve() until ctrl-c / SIGTERM
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::{
    analysis::AnalysisService,
    auth::{HttpJwksFetcher, JwksFetcher, KeyCachePolicy, KeyResolver, TokenVerifier},
    usage::{InMemoryUsageLedger, QuotaGate, QuotaPolicy, UsageLedger},
    vision::{OpenAiVisionClient, VisionModel},
};
use crate::state::AppState;

const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,vision_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash loudly. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting vision gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let fetcher = HttpJwksFetcher::new(config.jwks_url.clone(), JWKS_FETCH_TIMEOUT)
        .context("building JWKS client")?;
    let vision = OpenAiVisionClient::new(&config.vision).context("building vision client")?;

    let state = build_state(&config, Arc::new(fetcher), Arc::new(vision));
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

/// Wire the services together.
///
/// The ledger is created here, once, and shared by the quota gate (reads)
/// and the analysis service (commits).
pub fn build_state(
    config: &Config,
    jwks: Arc<dyn JwksFetcher>,
    vision: Arc<dyn VisionModel>,
) -> AppState {
    let ledger: Arc<dyn UsageLedger> = Arc::new(InMemoryUsageLedger::new());
    tracing::debug!(backend = ledger.backend_name(), "usage ledger ready");

    let keys = KeyResolver::new(
        jwks,
        KeyCachePolicy {
            ttl: config.jwks_cache_ttl,
            refresh_cooldown: config.jwks_refresh_cooldown,
        },
    );
    let auth = TokenVerifier::new(Arc::new(keys), config.token_leeway_seconds);

    let quota_policy = QuotaPolicy::new(config.free_tier_limit);
    let quota = QuotaGate::new(Arc::clone(&ledger), quota_policy);

    let analysis = AnalysisService::new(
        vision,
        ledger,
        config.upload_policy.clone(),
        quota_policy,
        config.vision.prompt.clone(),
        config.vision.timeout,
    );

    AppState::new(Arc::new(auth), Arc::new(quota), Arc::new(analysis))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api", api::routes(state.clone()))
        .with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
