use axum::{
    Json, Router,
    extract::{Extension, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use std::sync::Arc;

use crate::db::entities::router;
use crate::services::client_identity::ClientIdentity;
use crate::services::grant_manager::GrantContext;
use crate::services::rate_card::{RouterProfile, positive_number};
use crate::web::models::grant_models::{
    GrantClientRequest, GrantStateQuery, GrantStateResponse, TopUpRequest, TopUpResponse,
};
use crate::web::models::{AuthenticatedRouter, ClientInfo};
use crate::web::{AppError, AppState};

const TOP_UP_ACTION: &str = "grant_topup";

fn grant_context(
    router: &router::Model,
    client: Option<ClientInfo>,
) -> Result<GrantContext, AppError> {
    let client = client.unwrap_or_default();
    let identity = ClientIdentity::resolve(client.ip.as_deref(), client.mac.as_deref())?;
    Ok(GrantContext::for_router(router, identity))
}

// --- Route Handlers ---

async fn top_up_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<TopUpRequest>,
) -> Result<Json<TopUpResponse>, AppError> {
    let profile = RouterProfile::sanitize(&router.profile);
    let allowed = app_state
        .rate_limiter
        .try_acquire(&router.router_id, TOP_UP_ACTION, profile.limits.max_create_per_minute)
        .await;
    if !allowed {
        return Err(AppError::rate_limited());
    }

    let rate = profile
        .resolve_rate(
            positive_number(payload.amount.as_ref()),
            positive_number(payload.minutes.as_ref()),
        )
        .ok_or_else(|| AppError::InvalidInput("Rate not found".to_string()))?;

    let ctx = grant_context(&router, payload.client)?;
    let receipt = app_state
        .grant_manager
        .top_up(&ctx, rate, payload.device_id, Utc::now())
        .await?;
    Ok(Json(receipt.into()))
}

async fn probe(
    app_state: &AppState,
    router: &router::Model,
    client: Option<ClientInfo>,
) -> Result<Json<GrantStateResponse>, AppError> {
    let ctx = grant_context(router, client)?;
    let state = app_state.grant_manager.probe(&ctx, Utc::now()).await?;
    Ok(Json(GrantStateResponse::new(state, &ctx.client)))
}

async fn grant_state_query_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<GrantStateQuery>,
) -> Result<Json<GrantStateResponse>, AppError> {
    probe(&app_state, &router, Some(query.into())).await
}

async fn grant_state_body_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GrantClientRequest>,
) -> Result<Json<GrantStateResponse>, AppError> {
    probe(&app_state, &router, payload.client).await
}

async fn pause_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GrantClientRequest>,
) -> Result<Json<GrantStateResponse>, AppError> {
    let ctx = grant_context(&router, payload.client)?;
    let state = app_state.grant_manager.pause(&ctx, Utc::now()).await?;
    Ok(Json(GrantStateResponse::new(state, &ctx.client)))
}

async fn resume_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GrantClientRequest>,
) -> Result<Json<GrantStateResponse>, AppError> {
    let ctx = grant_context(&router, payload.client)?;
    let state = app_state.grant_manager.resume(&ctx, Utc::now()).await?;
    Ok(Json(GrantStateResponse::new(state, &ctx.client)))
}

pub fn create_grants_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/topup", post(top_up_handler))
        .route("/state", get(grant_state_query_handler).post(grant_state_body_handler))
        .route("/pause", post(pause_handler))
        .route("/resume", post(resume_handler))
}
