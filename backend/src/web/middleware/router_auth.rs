use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::db::enums::RouterStatus;
use crate::db::services;
use crate::services::credentials::verify_api_key;
use crate::web::models::AuthenticatedRouter;
use crate::web::{AppState, error::AppError};

pub const ROUTER_ID_HEADER: &str = "x-router-id";

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedRouter, AppError> {
    let token = bearer_token(headers).ok_or_else(AppError::invalid_router_credentials)?;
    let router_id = headers
        .get(ROUTER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(AppError::invalid_router_credentials)?;

    let router = services::find_router(&state.db_pool, router_id)
        .await?
        .ok_or_else(AppError::invalid_router_credentials)?;

    let Some(stored_hash) = router.router_api_key_hash.as_deref() else {
        return Err(AppError::invalid_router_credentials());
    };
    if !verify_api_key(token, stored_hash) {
        warn!(router_id, "Router presented a wrong API key.");
        return Err(AppError::invalid_router_credentials());
    }

    Ok(AuthenticatedRouter(router))
}

/// Authenticates a router by `Authorization: Bearer <key>` and `X-Router-ID`.
/// Disabled and revoked routers are refused with the same message as a wrong key.
pub async fn router_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let authenticated = authenticate(&state, req.headers()).await?;
    if authenticated.0.status != RouterStatus::Active {
        return Err(AppError::invalid_router_credentials());
    }
    req.extensions_mut().insert(authenticated);
    Ok(next.run(req).await)
}

/// Like [`router_auth`] but lets disabled and revoked routers through, for
/// endpoints that report why a router is not serving.
pub async fn router_auth_any_status(
    State(state): State<Arc<AppState>>,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let authenticated = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(authenticated);
    Ok(next.run(req).await)
}
