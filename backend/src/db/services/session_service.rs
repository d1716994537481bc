use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::db::entities::session;
use crate::db::enums::SessionStatus;

/// Values for a freshly opened session record.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub router_id: String,
    pub voucher_id: Option<i32>,
    pub voucher_code: Option<String>,
    pub client_ip: Option<String>,
    pub client_mac: Option<String>,
    pub device_id: Option<String>,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// Minutes reported for a session covering `seconds`: rounded up, at least one.
pub fn minutes_for_seconds(seconds: i64) -> i64 {
    ((seconds.max(0) + 59) / 60).max(1)
}

/// Opens a session record for a client on a router.
pub async fn open_session<C: ConnectionTrait>(
    conn: &C,
    new_session: NewSession,
) -> Result<session::Model, DbErr> {
    let expires_at = new_session.started_at + chrono::Duration::seconds(new_session.duration_seconds);
    session::ActiveModel {
        router_id: Set(new_session.router_id),
        voucher_id: Set(new_session.voucher_id),
        voucher_code: Set(new_session.voucher_code),
        client_ip: Set(new_session.client_ip),
        client_mac: Set(new_session.client_mac),
        device_id: Set(new_session.device_id),
        minutes_granted: Set(minutes_for_seconds(new_session.duration_seconds)),
        download_kbps: Set(new_session.download_kbps),
        upload_kbps: Set(new_session.upload_kbps),
        started_at: Set(new_session.started_at),
        expires_at: Set(expires_at),
        ended_at: Set(None),
        status: Set(SessionStatus::Active),
        ..Default::default()
    }
    .insert(conn)
    .await
}

/// Ends every open session on `router_id` that belongs to the client, matched
/// by IP or MAC. Keeps at most one open session per client per router when
/// called before `open_session`.
pub async fn close_client_sessions<C: ConnectionTrait>(
    conn: &C,
    router_id: &str,
    client_ip: Option<&str>,
    client_mac: Option<&str>,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let mut client = Condition::any();
    if let Some(ip) = client_ip {
        client = client.add(session::Column::ClientIp.eq(ip));
    }
    if let Some(mac) = client_mac {
        client = client.add(session::Column::ClientMac.eq(mac));
    }
    if client.is_empty() {
        return Ok(0);
    }

    end_matching(
        conn,
        Condition::all()
            .add(session::Column::RouterId.eq(router_id))
            .add(session::Column::Status.eq(SessionStatus::Active))
            .add(client),
        now,
    )
    .await
}

/// Ends open sessions on a router matching every supplied criterion, as
/// reported by the router when a client disconnects.
pub async fn end_sessions<C: ConnectionTrait>(
    conn: &C,
    router_id: &str,
    client_ip: Option<&str>,
    client_mac: Option<&str>,
    voucher_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let mut condition = Condition::all()
        .add(session::Column::RouterId.eq(router_id))
        .add(session::Column::Status.eq(SessionStatus::Active));
    if let Some(ip) = client_ip {
        condition = condition.add(session::Column::ClientIp.eq(ip));
    }
    if let Some(mac) = client_mac {
        condition = condition.add(session::Column::ClientMac.eq(mac));
    }
    if let Some(code) = voucher_code {
        condition = condition.add(session::Column::VoucherCode.eq(code));
    }
    end_matching(conn, condition, now).await
}

async fn end_matching<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = session::Entity::update_many()
        .set(session::ActiveModel {
            status: Set(SessionStatus::Ended),
            ended_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(condition)
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
