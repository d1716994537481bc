use axum::{
    Json, Router,
    extract::{Extension, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use std::sync::Arc;

use crate::web::models::AuthenticatedRouter;
use crate::web::models::activation_models::{
    ActivateRequest, ActivateResponse, BindCodeQuery, BindCodeResponse,
};
use crate::web::models::router_models::RouterStateResponse;
use crate::web::{AppError, AppState};

// --- Route Handlers ---

/// Current bind code for the router's local registration page. Public: the
/// router has no credential yet.
async fn bind_code_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<BindCodeQuery>,
) -> Result<Json<BindCodeResponse>, AppError> {
    let router_id = query
        .router_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidInput("routerId required".to_string()))?;

    let now = Utc::now();
    let bind_code = app_state.bind_codes.code_at(router_id, now.timestamp());
    Ok(Json(BindCodeResponse {
        ok: true,
        router_id: router_id.to_string(),
        display_code: bind_code.clone(),
        bind_code,
        expires_in_seconds: app_state.bind_codes.seconds_until_rotation(now),
    }))
}

async fn activate_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>, AppError> {
    let activation = app_state
        .activation_service
        .activate(payload.into(), Utc::now())
        .await?;
    Ok(Json(activation.into()))
}

async fn router_state_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
) -> Json<RouterStateResponse> {
    Json(RouterStateResponse::from(&router))
}

// --- Routers ---

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bindcode", get(bind_code_handler))
        .route("/activate", post(activate_handler))
}

/// Routes open to disabled and revoked routers.
pub fn create_any_status_router() -> Router<Arc<AppState>> {
    Router::new().route("/state", get(router_state_handler))
}
