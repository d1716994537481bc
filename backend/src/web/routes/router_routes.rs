use axum::{
    Json, Router,
    extract::{Extension, State},
    routing::{get, post},
};
use chrono::Utc;
use sea_orm::TransactionTrait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::services;
use crate::services::rate_card::{RouterProfile, positive_number};
use crate::web::models::router_models::{
    HeartbeatRequest, HeartbeatResponse, RouterConfigResponse, RouterMeta, SaleEventRequest,
    SalesSyncRequest, SalesSyncResponse, SessionEndRequest, SessionEndResponse, SyncedSale,
    sale_timestamp,
};
use crate::web::models::{AuthenticatedRouter, OkResponse};
use crate::web::{AppError, AppState};

async fn heartbeat_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, AppError> {
    let now = Utc::now();
    let meta = serde_json::to_value(RouterMeta::from(payload))?;
    services::record_heartbeat(&app_state.db_pool, &router.router_id, meta, now).await?;
    debug!(router_id = %router.router_id, "Heartbeat recorded.");
    Ok(Json(HeartbeatResponse {
        ok: true,
        server_time: now,
    }))
}

async fn config_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
) -> Json<RouterConfigResponse> {
    Json(RouterConfigResponse {
        ok: true,
        profile: RouterProfile::sanitize(&router.profile),
        router_id: router.router_id,
        status: router.status,
        license_key: router.license_key,
    })
}

async fn sale_event_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SaleEventRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let amount = positive_number(payload.amount.as_ref())
        .ok_or_else(|| AppError::InvalidInput("Invalid amount".to_string()))?;
    let ts = sale_timestamp(payload.ts.as_ref(), Utc::now())
        .ok_or_else(|| AppError::InvalidInput("Invalid timestamp".to_string()))?;
    let voucher_code = payload
        .voucher_code
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty());

    services::record_sale(
        &app_state.db_pool,
        &router.router_id,
        payload.device_id,
        amount,
        voucher_code,
        ts,
    )
    .await?;
    info!(router_id = %router.router_id, amount, "Sale event recorded.");
    Ok(Json(OkResponse::ok()))
}

const MAX_SYNC_ITEMS: usize = 100;

/// Uploads sales a router recorded while offline. Items with a bad amount or
/// timestamp are skipped; the rest are stored together.
async fn sales_sync_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SalesSyncRequest>,
) -> Result<Json<SalesSyncResponse>, AppError> {
    let items = payload
        .items
        .as_ref()
        .and_then(|items| items.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    if items.len() > MAX_SYNC_ITEMS {
        return Err(AppError::InvalidInput(format!(
            "Max {MAX_SYNC_ITEMS} items per sync"
        )));
    }

    let now = Utc::now();
    let sales: Vec<SyncedSale> = items
        .iter()
        .filter_map(|item| SyncedSale::parse(item, now))
        .collect();
    if sales.is_empty() {
        return Ok(Json(SalesSyncResponse { ok: true, synced: 0 }));
    }

    let txn = app_state.db_pool.begin().await?;
    for sale in &sales {
        services::record_sale(
            &txn,
            &router.router_id,
            sale.device_id.clone(),
            sale.amount,
            sale.voucher_code.clone(),
            sale.ts,
        )
        .await?;
    }
    txn.commit().await?;

    if sales.len() < items.len() {
        debug!(
            router_id = %router.router_id,
            skipped = items.len() - sales.len(),
            "Skipped malformed offline sales."
        );
    }
    info!(router_id = %router.router_id, synced = sales.len(), "Offline sales synced.");
    Ok(Json(SalesSyncResponse {
        ok: true,
        synced: sales.len(),
    }))
}

async fn session_end_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SessionEndRequest>,
) -> Result<Json<SessionEndResponse>, AppError> {
    let client_ip = payload.client_ip.or(payload.ip);
    let client_mac = payload.client_mac.or(payload.mac);
    let voucher_code = payload
        .voucher_code
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty());
    if client_ip.is_none() && client_mac.is_none() && voucher_code.is_none() {
        return Err(AppError::InvalidInput(
            "Provide clientIp, clientMac, or voucherCode".to_string(),
        ));
    }

    let ended = services::end_sessions(
        &app_state.db_pool,
        &router.router_id,
        client_ip.as_deref(),
        client_mac.as_deref(),
        voucher_code.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(SessionEndResponse { ok: true, ended }))
}

pub fn create_router_ops_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/heartbeat", post(heartbeat_handler))
        .route("/config", get(config_handler))
        .route("/sales/event", post(sale_event_handler))
        .route("/sales/sync", post(sales_sync_handler))
        .route("/sessions/end", post(session_end_handler))
}
