use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    middleware as axum_middleware,
    routing::get,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::server::config::ServerConfig;
use crate::services::activation::ActivationService;
use crate::services::bind_code::BindCodeService;
use crate::services::grant_manager::GrantManager;
use crate::services::rate_limiter::{InMemoryRateLimiter, RateLimiter};
use crate::services::voucher_manager::VoucherManager;
use crate::version::VERSION;
use crate::web::middleware::router_auth;
use crate::web::models::router_models::HealthResponse;
use crate::web::routes::*;

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub bind_codes: Arc<BindCodeService>,
    pub grant_manager: Arc<GrantManager>,
    pub activation_service: Arc<ActivationService>,
    pub voucher_manager: Arc<VoucherManager>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires the services around one database handle, with an in-process
    /// rate limiter.
    pub fn new(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Self {
        let window = Duration::from_secs(config.rate_limit_window_seconds);
        Self::with_rate_limiter(db_pool, config, Arc::new(InMemoryRateLimiter::new(window)))
    }

    pub fn with_rate_limiter(
        db_pool: DatabaseConnection,
        config: Arc<ServerConfig>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let db = Arc::new(db_pool.clone());
        let bind_codes = Arc::new(BindCodeService::from_config(&config));
        Self {
            grant_manager: Arc::new(GrantManager::new(db.clone())),
            activation_service: Arc::new(ActivationService::new(
                db.clone(),
                bind_codes.clone(),
                config.activate_cooldown_seconds,
            )),
            voucher_manager: Arc::new(VoucherManager::new(db)),
            bind_codes,
            rate_limiter,
            config,
            db_pool,
            started_at: Instant::now(),
        }
    }
}

async fn health_check_handler(
    State(app_state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = match app_state.db_pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database.");
            false
        }
    };
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            ok: db_ok,
            db: if db_ok { "ok" } else { "down" },
            uptime_sec: app_state.started_at.elapsed().as_secs(),
            version: VERSION,
        }),
    )
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let protected = Router::new()
        .nest("/grants", grant_routes::create_grants_router())
        .nest("/vouchers", voucher_routes::create_vouchers_router())
        .merge(router_routes::create_router_ops_router())
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            router_auth::router_auth,
        ));

    let any_status = activation_routes::create_any_status_router().route_layer(
        axum_middleware::from_fn_with_state(app_state.clone(), router_auth::router_auth_any_status),
    );

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest(
            "/api/router",
            activation_routes::create_public_router()
                .merge(any_status)
                .merge(protected),
        )
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
