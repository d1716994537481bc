use axum::{
    Json, Router,
    extract::{Extension, State},
    routing::post,
};
use chrono::Utc;
use std::sync::Arc;

use crate::services::rate_card::{RouterProfile, positive_number};
use crate::web::models::AuthenticatedRouter;
use crate::web::models::voucher_models::{
    VoucherBatchRequest, VoucherBatchResponse, VoucherCreateRequest, VoucherCreateResponse,
    VoucherRedeemRequest, VoucherRedeemResponse,
};
use crate::web::{AppError, AppState};

async fn create_voucher_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<VoucherCreateRequest>,
) -> Result<Json<VoucherCreateResponse>, AppError> {
    let profile = RouterProfile::sanitize(&router.profile);
    if !app_state
        .rate_limiter
        .try_acquire(&router.router_id, "create", profile.limits.max_create_per_minute)
        .await
    {
        return Err(AppError::rate_limited());
    }

    let rate = profile
        .resolve_rate(
            positive_number(payload.amount.as_ref()),
            positive_number(payload.minutes.as_ref()),
        )
        .ok_or_else(|| AppError::InvalidInput("Rate not found".to_string()))?;

    let voucher = app_state
        .voucher_manager
        .create(&router, rate, profile.voucher_length, payload.device_id, Utc::now())
        .await?;
    Ok(Json(voucher.into()))
}

/// Pool vouchers the router hands out while it cannot reach the cloud.
async fn batch_vouchers_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<VoucherBatchRequest>,
) -> Result<Json<VoucherBatchResponse>, AppError> {
    let profile = RouterProfile::sanitize(&router.profile);
    let rate = profile
        .batch_rate(positive_number(payload.amount.as_ref()))
        .ok_or_else(|| AppError::InvalidInput("No rate configured".to_string()))?;

    let vouchers = app_state
        .voucher_manager
        .create_batch(
            &router,
            rate,
            payload.batch_size(),
            profile.voucher_length,
            payload.device_id,
            Utc::now(),
        )
        .await?;
    Ok(Json(vouchers.into()))
}

async fn redeem_voucher_handler(
    Extension(AuthenticatedRouter(router)): Extension<AuthenticatedRouter>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<VoucherRedeemRequest>,
) -> Result<Json<VoucherRedeemResponse>, AppError> {
    let profile = RouterProfile::sanitize(&router.profile);
    if !app_state
        .rate_limiter
        .try_acquire(&router.router_id, "redeem", profile.limits.max_redeem_per_minute)
        .await
    {
        return Err(AppError::rate_limited());
    }

    let client = payload.client.unwrap_or_default();
    let redemption = app_state
        .voucher_manager
        .redeem(
            &router,
            payload.code.as_deref().unwrap_or_default(),
            client.ip,
            client.mac,
            Utc::now(),
        )
        .await?;
    Ok(Json(redemption.voucher.into()))
}

pub fn create_vouchers_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create_voucher_handler))
        .route("/batch", post(batch_vouchers_handler))
        .route("/redeem", post(redeem_voucher_handler))
}
