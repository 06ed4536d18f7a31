// Aurora Visibility API v0.1
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::prediction::AppState;
use services::aggregator::{AggregateResult, DataAggregator, SourcedReading};
use services::cache::TtlCache;
use services::sources::{
    build_aurora_providers, build_weather_providers, AuroraReading, WeatherReading,
};

/// Aurora Visibility API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Aurora Visibility Prediction API",
        version = "0.1.0",
        description = "Predicts aurora borealis visibility for any location. \
            Aggregates aurora activity (NOAA SWPC, Auroras.live) and weather \
            (met.no, SMHI, Open-Meteo) with per-source fallback and caching, \
            deducts moonlight and twilight penalties, and returns a single \
            0\u{2013}100 score with a recommendation.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Prediction", description = "Visibility score and hourly outlook"),
        (name = "Aurora", description = "Aurora source comparison"),
        (name = "Weather", description = "Weather source comparison"),
    ),
    paths(
        routes::health::health_check,
        routes::prediction::get_current_prediction,
        routes::prediction::get_forecast,
        routes::aurora::get_aurora_sources,
        routes::weather::get_weather_sources,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::prediction::PredictionResponse,
            routes::prediction::ForecastResponse,
            routes::prediction::ForecastItem,
            routes::prediction::Location,
            services::score::ScoreBreakdown,
            services::astro::MoonPenalty,
            services::astro::SunPenalty,
            services::astro::TwilightPhase,
            AuroraReading,
            WeatherReading,
            SourcedReading<AuroraReading>,
            SourcedReading<WeatherReading>,
            AggregateResult<AuroraReading>,
            AggregateResult<WeatherReading>,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aurora_visibility_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // One HTTP client shared by all source adapters
    let http = reqwest::Client::builder()
        .build()
        .expect("Failed to build HTTP client");

    let aurora_providers = build_aurora_providers(&config, &http);
    let weather_providers = build_weather_providers(&config, &http);
    tracing::info!(
        "source chains: aurora={:?}, weather={:?}",
        config.aurora_sources,
        config.weather_sources
    );

    // Process-wide caches, one per signal family, injected into the aggregator
    let aggregator = Arc::new(DataAggregator::new(
        aurora_providers,
        weather_providers,
        TtlCache::new(config.cache_ttl_aurora_secs),
        TtlCache::new(config.cache_ttl_weather_secs),
    ));

    let app_state = AppState {
        aggregator,
        config: config.clone(),
    };

    // CORS — read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    // Build router
    let api_routes = Router::new()
        .route(
            "/api/v1/prediction/current",
            get(routes::prediction::get_current_prediction),
        )
        .route(
            "/api/v1/prediction/forecast",
            get(routes::prediction::get_forecast),
        )
        .route("/api/v1/aurora/sources", get(routes::aurora::get_aurora_sources))
        .route(
            "/api/v1/weather/sources",
            get(routes::weather::get_weather_sources),
        )
        .with_state(app_state);

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
