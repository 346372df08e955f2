use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stock_picker_core::crew::{Crew, CrewConfig};
use stock_picker_core::handler::{AnalysisReport, AnalysisService, LogProgress};
use stock_picker_core::notify::SendGridClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stock_picker_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    settings.log_presence();

    let crew_config = match CrewConfig::load(settings.crew_config_dir.as_deref()) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "crew configuration invalid");
            return Err(e);
        }
    };
    let crew = Crew::from_settings(&settings, crew_config);
    let email = SendGridClient::from_settings(&settings)?;

    let state = AppState {
        service: Arc::new(AnalysisService::new(Arc::new(crew), Arc::new(email))),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/analysis", post(run_analysis))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(7860);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    service: Arc<AnalysisService>,
}

#[derive(Debug, Deserialize)]
struct AnalysisBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    sector: String,
}

/// Always answers 200; invalid input and pipeline failures are described in the report itself.
async fn run_analysis(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Json<AnalysisReport> {
    let report = state
        .service
        .run_analysis(&body.email, &body.sector, &LogProgress)
        .await;
    Json(report)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(
    settings: &stock_picker_core::config::Settings,
) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
