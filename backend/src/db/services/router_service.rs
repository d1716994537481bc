use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    Set, SqlErr,
};

use crate::db::entities::router;
use crate::db::enums::RouterStatus;

// --- Router Service Functions ---

/// Retrieves a router by its hardware fingerprint (`router_id`).
pub async fn find_router<C: ConnectionTrait>(
    conn: &C,
    router_id: &str,
) -> Result<Option<router::Model>, DbErr> {
    router::Entity::find()
        .filter(router::Column::RouterId.eq(router_id))
        .one(conn)
        .await
}

/// Number of routers currently bound to a license.
pub async fn count_routers_for_license<C: ConnectionTrait>(
    conn: &C,
    license_key: &str,
) -> Result<u64, DbErr> {
    router::Entity::find()
        .filter(router::Column::LicenseKey.eq(license_key))
        .count(conn)
        .await
}

/// Creates an activated router. Returns `Ok(None)` when a router with the same
/// `router_id` was created concurrently.
pub async fn create_activated_router<C: ConnectionTrait>(
    conn: &C,
    router_id: &str,
    name: &str,
    license_key: &str,
    tenant_id: Option<String>,
    api_key_hash: String,
    now: DateTime<Utc>,
) -> Result<Option<router::Model>, DbErr> {
    let new_router = router::ActiveModel {
        router_id: Set(router_id.to_owned()),
        tenant_id: Set(tenant_id),
        license_key: Set(Some(license_key.to_owned())),
        name: Set(name.to_owned()),
        router_api_key_hash: Set(Some(api_key_hash)),
        status: Set(RouterStatus::Active),
        profile: Set(serde_json::json!({})),
        meta: Set(None),
        created_at: Set(now),
        last_activated_at: Set(Some(now)),
        last_seen_at: Set(None),
        ..Default::default()
    };

    match new_router.insert(conn).await {
        Ok(model) => Ok(Some(model)),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Replaces the credential hash of an existing router and re-activates it, but
/// only if nobody activated it since `existing` was read. The router name is
/// left alone since owners may have renamed it. Returns whether the rotation
/// was applied.
pub async fn rotate_credential_if_unchanged<C: ConnectionTrait>(
    conn: &C,
    existing: &router::Model,
    api_key_hash: String,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let mut update = router::Entity::update_many()
        .set(router::ActiveModel {
            router_api_key_hash: Set(Some(api_key_hash)),
            status: Set(RouterStatus::Active),
            last_activated_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(router::Column::Id.eq(existing.id));

    update = match existing.last_activated_at {
        Some(previous) => update.filter(router::Column::LastActivatedAt.eq(previous)),
        None => update.filter(router::Column::LastActivatedAt.is_null()),
    };

    let result = update.exec(conn).await?;
    Ok(result.rows_affected == 1)
}

/// Stores heartbeat telemetry for a router.
pub async fn record_heartbeat<C: ConnectionTrait>(
    conn: &C,
    router_id: &str,
    meta: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = router::Entity::update_many()
        .set(router::ActiveModel {
            meta: Set(Some(meta)),
            last_seen_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(router::Column::RouterId.eq(router_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
