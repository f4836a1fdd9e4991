use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adpulse_core::analytics::{benchmark, patterns, recommend, verify};
use adpulse_core::config::EngineConfig;
use adpulse_core::domain::metrics::Benchmark;
use adpulse_core::domain::pattern::MinedPatterns;
use adpulse_core::domain::prediction::Prediction;
use adpulse_core::domain::recommendation::Recommendation;
use adpulse_core::storage;
use adpulse_core::time::reporting;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = adpulse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<SqlitePool> = match settings.require_database_url() {
        Ok(db_url) => match adpulse_core::storage::connect(db_url).await {
            Ok(pool) => match adpulse_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    let err = anyhow::Error::new(e);
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = %err, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        pool,
        cfg: EngineConfig::from_env(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/clients/:client_id/benchmarks/:platform",
            get(get_benchmark),
        )
        .route("/clients/:client_id/patterns", get(get_patterns))
        .route(
            "/clients/:client_id/recommendations",
            get(get_recommendations),
        )
        .route("/clients/:client_id/predictions", get(get_predictions))
        .route("/clients/:client_id/accuracy", get(get_accuracy))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
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

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<SqlitePool>,
    cfg: EngineConfig,
}

impl AppState {
    fn pool(&self) -> Result<&SqlitePool, StatusCode> {
        self.pool.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }

    fn today(&self) -> Result<chrono::NaiveDate, StatusCode> {
        reporting::current_date(chrono::Utc::now(), self.cfg.reporting_tz_offset_hours)
            .map_err(internal_error)
    }
}

#[derive(Debug, Deserialize)]
struct BenchmarkQuery {
    days: Option<i64>,
}

async fn get_benchmark(
    State(state): State<AppState>,
    Path((client_id, platform)): Path<(String, String)>,
    Query(query): Query<BenchmarkQuery>,
) -> Result<Json<Benchmark>, StatusCode> {
    let pool = state.pool()?;
    let today = state.today()?;

    let benchmark = benchmark::compute(pool, &state.cfg, &client_id, &platform, query.days, today)
        .await
        .map_err(storage_error)?;
    Ok(Json(benchmark))
}

async fn get_patterns(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<MinedPatterns>, StatusCode> {
    let pool = state.pool()?;
    let today = state.today()?;

    let history = storage::history::load_client_or_empty(
        pool,
        &client_id,
        state.cfg.pattern_lookback_days,
        today,
    )
    .await
    .map_err(storage_error)?;

    Ok(Json(patterns::mine(&history, &state.cfg)))
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    platform: Option<String>,
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<Vec<Recommendation>>, StatusCode> {
    let pool = state.pool()?;
    let today = state.today()?;

    let recommendations = recommend::recommend_for_client(
        pool,
        &state.cfg,
        &client_id,
        query.platform.as_deref(),
        today,
    )
    .await
    .map_err(storage_error)?;
    Ok(Json(recommendations))
}

async fn get_predictions(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<Prediction>>, StatusCode> {
    let pool = state.pool()?;
    let predictions = storage::predictions::load_for_client(pool, &client_id)
        .await
        .map_err(storage_error)?;
    Ok(Json(predictions))
}

async fn get_accuracy(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<verify::AccuracyReport>, StatusCode> {
    let pool = state.pool()?;
    let predictions = storage::predictions::load_for_client(pool, &client_id)
        .await
        .map_err(storage_error)?;
    Ok(Json(verify::accuracy_of(&predictions)))
}

fn storage_error(e: storage::StorageError) -> StatusCode {
    internal_error(anyhow::Error::new(e))
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &adpulse_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
