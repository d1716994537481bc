use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};

use crate::db::entities::voucher;
use crate::db::enums::VoucherStatus;

// --- Voucher Service Functions ---

/// Inserts a voucher. Returns `Ok(None)` if its code collides with an existing
/// voucher of the same router.
pub async fn insert_voucher<C: ConnectionTrait>(
    conn: &C,
    new_voucher: voucher::ActiveModel,
) -> Result<Option<voucher::Model>, DbErr> {
    match new_voucher.insert(conn).await {
        Ok(model) => Ok(Some(model)),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Vouchers a router may redeem: its own, plus any voucher of its tenant.
fn redeemable_by(router_id: &str, tenant_id: Option<&str>) -> Condition {
    match tenant_id {
        Some(tenant_id) => Condition::any()
            .add(voucher::Column::TenantId.eq(tenant_id))
            .add(voucher::Column::RouterId.eq(router_id)),
        None => Condition::all().add(voucher::Column::RouterId.eq(router_id)),
    }
}

/// Looks up a voucher code visible to the router regardless of its state.
pub async fn find_visible_voucher<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    router_id: &str,
    tenant_id: Option<&str>,
) -> Result<Option<voucher::Model>, DbErr> {
    voucher::Entity::find()
        .filter(voucher::Column::Code.eq(code))
        .filter(redeemable_by(router_id, tenant_id))
        .one(conn)
        .await
}

/// Marks an unused, unexpired voucher as redeemed by this router in a single
/// conditional update. Returns `Ok(None)` when no such voucher exists or a
/// concurrent redemption won.
#[allow(clippy::too_many_arguments)]
pub async fn redeem_voucher<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    router_id: &str,
    tenant_id: Option<&str>,
    client_ip: Option<String>,
    client_mac: Option<String>,
    now: DateTime<Utc>,
) -> Result<Option<voucher::Model>, DbErr> {
    let candidate = voucher::Entity::find()
        .filter(voucher::Column::Code.eq(code))
        .filter(voucher::Column::Status.eq(VoucherStatus::Unused))
        .filter(voucher::Column::ExpiresAt.gt(now))
        .filter(redeemable_by(router_id, tenant_id))
        .one(conn)
        .await?;

    let Some(candidate) = candidate else {
        return Ok(None);
    };

    let result = voucher::Entity::update_many()
        .set(voucher::ActiveModel {
            status: Set(VoucherStatus::Redeemed),
            redeemed_at: Set(Some(now)),
            redeemed_router_id: Set(Some(router_id.to_owned())),
            redeemed_client_ip: Set(client_ip),
            redeemed_client_mac: Set(client_mac),
            ..Default::default()
        })
        .filter(voucher::Column::Id.eq(candidate.id))
        .filter(voucher::Column::Status.eq(VoucherStatus::Unused))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(None);
    }

    voucher::Entity::find_by_id(candidate.id).one(conn).await
}
