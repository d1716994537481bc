use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};

use crate::db::entities::sale_event;

/// Records a settled sale for revenue reporting.
pub async fn record_sale<C: ConnectionTrait>(
    conn: &C,
    router_id: &str,
    device_id: Option<String>,
    amount: f64,
    voucher_code: Option<String>,
    ts: DateTime<Utc>,
) -> Result<sale_event::Model, DbErr> {
    sale_event::ActiveModel {
        router_id: Set(router_id.to_owned()),
        device_id: Set(device_id),
        amount: Set(amount),
        voucher_code: Set(voucher_code),
        ts: Set(ts),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
}
