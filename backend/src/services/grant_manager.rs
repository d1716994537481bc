//! Portable time grants.
//!
//! A grant holds a client's purchased seconds within a scope (a tenant or a
//! lone router) so the client can pause on one router and resume on another.
//! The server clock is authoritative: elapsed time is charged from
//! `state_changed_at` whenever the grant is active.
//!
//! Every transition is read, decide, conditional write. The write only lands
//! if the row still has the version that was read (or, for a first top-up, if
//! no row was inserted meanwhile); otherwise the whole attempt is rolled back
//! and re-run against fresh state. No locks are held in process.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, Set, TransactionTrait,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::entities::{portable_grant, router};
use crate::db::enums::GrantStatus;
use crate::db::services::{self as store, NewSession};
use crate::services::client_identity::{ClientIdentity, GrantScope};
use crate::services::rate_card::Rate;

/// Attempts per operation before giving up with [`GrantError::Contended`].
pub const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Error, Debug)]
pub enum GrantError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("No time left")]
    NoTimeLeft,
    #[error("Grant was modified concurrently, please retry")]
    Contended,
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

/// Who is asking: the requesting router and the client it acts for.
#[derive(Debug, Clone)]
pub struct GrantContext {
    pub router_id: String,
    pub scope: GrantScope,
    pub client: ClientIdentity,
}

impl GrantContext {
    pub fn new(router_id: &str, tenant_id: Option<&str>, client: ClientIdentity) -> Self {
        Self {
            router_id: router_id.to_string(),
            scope: GrantScope::for_router(router_id, tenant_id),
            client,
        }
    }

    pub fn for_router(router: &router::Model, client: ClientIdentity) -> Self {
        Self::new(&router.router_id, router.tenant_id.as_deref(), client)
    }
}

/// What a router needs to enforce a live grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantSnapshot {
    pub remaining_seconds: i64,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    pub download_quota_kb: i64,
    pub upload_quota_kb: i64,
    pub client_ip: Option<String>,
    pub client_mac: Option<String>,
}

impl GrantSnapshot {
    fn new(grant: &portable_grant::Model, remaining_seconds: i64, client: &ClientIdentity) -> Self {
        Self {
            remaining_seconds,
            download_kbps: grant.download_kbps,
            upload_kbps: grant.upload_kbps,
            download_quota_kb: grant.download_quota_kb,
            upload_quota_kb: grant.upload_quota_kb,
            client_ip: client.ip.clone().or_else(|| grant.client_ip.clone()),
            client_mac: client.mac.clone().or_else(|| grant.client_mac.clone()),
        }
    }
}

/// A grant as seen from the requesting router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantState {
    /// No grant, or no time left on it.
    Disconnected,
    /// Running on the requesting router, or not pinned to any router.
    Connected(GrantSnapshot),
    Paused(GrantSnapshot),
    /// Running on another router of the same scope.
    DisconnectedWithTime(GrantSnapshot),
}

impl GrantState {
    fn of(grant: &portable_grant::Model, remaining_seconds: i64, ctx: &GrantContext) -> Self {
        if grant.status == GrantStatus::Ended || remaining_seconds <= 0 {
            return GrantState::Disconnected;
        }
        let snapshot = GrantSnapshot::new(grant, remaining_seconds, &ctx.client);
        match (&grant.status, &grant.active_router_id) {
            (GrantStatus::Paused, _) => GrantState::Paused(snapshot),
            (_, Some(active)) if *active != ctx.router_id => GrantState::DisconnectedWithTime(snapshot),
            _ => GrantState::Connected(snapshot),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopUpReceipt {
    pub amount: f64,
    pub added_minutes: i64,
    pub remaining_seconds: i64,
    pub grant: portable_grant::Model,
}

enum Attempt<T> {
    Done(T),
    Stale,
}

#[derive(Clone, Debug)]
pub struct GrantManager {
    db: Arc<DatabaseConnection>,
}

impl GrantManager {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, GrantError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>, GrantError>>,
    {
        for n in 1..=MAX_WRITE_ATTEMPTS {
            match attempt().await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Stale => debug!(operation, attempt = n, "Grant changed underneath us, retrying."),
            }
        }
        warn!(operation, attempts = MAX_WRITE_ATTEMPTS, "Giving up on contended grant.");
        Err(GrantError::Contended)
    }

    /// Adds the seconds of `rate` to the client's grant (creating it on first
    /// purchase) and starts it on the requesting router. The sale and the
    /// session bookkeeping commit together with the grant.
    pub async fn top_up(
        &self,
        ctx: &GrantContext,
        rate: &Rate,
        device_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TopUpReceipt, GrantError> {
        let receipt = self
            .with_retries("top_up", move || self.try_top_up(ctx, rate, device_id.clone(), now))
            .await?;
        info!(
            router_id = %ctx.router_id,
            scope = %ctx.scope,
            client = %ctx.client.key,
            added_minutes = receipt.added_minutes,
            remaining_seconds = receipt.remaining_seconds,
            "Grant topped up."
        );
        Ok(receipt)
    }

    async fn try_top_up(
        &self,
        ctx: &GrantContext,
        rate: &Rate,
        device_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Attempt<TopUpReceipt>, GrantError> {
        let txn = self.db.begin().await?;
        let existing = store::find_grant(&txn, &ctx.scope.to_string(), &ctx.client.key).await?;
        write_top_up(txn, ctx, rate, device_id, existing, now).await
    }

    /// Reports the client's grant relative to the requesting router. A grant
    /// found out of time is marked ended before returning.
    pub async fn probe(&self, ctx: &GrantContext, now: DateTime<Utc>) -> Result<GrantState, GrantError> {
        self.with_retries("probe", move || self.try_probe(ctx, now)).await
    }

    async fn try_probe(&self, ctx: &GrantContext, now: DateTime<Utc>) -> Result<Attempt<GrantState>, GrantError> {
        let scope_id = ctx.scope.to_string();
        let Some(grant) = store::find_grant(self.db.as_ref(), &scope_id, &ctx.client.key).await? else {
            return Ok(Attempt::Done(GrantState::Disconnected));
        };

        let remaining = grant.remaining_at(now);
        if remaining == 0 && grant.status != GrantStatus::Ended {
            let txn = self.db.begin().await?;
            if expire(&txn, &grant, now).await?.is_none() {
                txn.rollback().await?;
                return Ok(Attempt::Stale);
            }
            txn.commit().await?;
            debug!(scope = %ctx.scope, client = %ctx.client.key, "Grant ran out of time.");
            return Ok(Attempt::Done(GrantState::Disconnected));
        }

        Ok(Attempt::Done(GrantState::of(&grant, remaining, ctx)))
    }

    /// Freezes the client's remaining time and releases it from any router.
    pub async fn pause(&self, ctx: &GrantContext, now: DateTime<Utc>) -> Result<GrantState, GrantError> {
        let state = self.with_retries("pause", move || self.try_pause(ctx, now)).await?;
        info!(router_id = %ctx.router_id, client = %ctx.client.key, "Grant paused.");
        Ok(state)
    }

    async fn try_pause(&self, ctx: &GrantContext, now: DateTime<Utc>) -> Result<Attempt<GrantState>, GrantError> {
        let txn = self.db.begin().await?;
        let Some(current) = store::find_grant(&txn, &ctx.scope.to_string(), &ctx.client.key).await? else {
            return Err(GrantError::NotFound("No active session found"));
        };
        write_pause(txn, ctx, current, now).await
    }

    /// Starts the client's remaining time on the requesting router. Also used
    /// to take over a grant running on another router of the same scope.
    pub async fn resume(&self, ctx: &GrantContext, now: DateTime<Utc>) -> Result<GrantState, GrantError> {
        let state = self.with_retries("resume", move || self.try_resume(ctx, now)).await?;
        info!(router_id = %ctx.router_id, client = %ctx.client.key, "Grant resumed.");
        Ok(state)
    }

    async fn try_resume(&self, ctx: &GrantContext, now: DateTime<Utc>) -> Result<Attempt<GrantState>, GrantError> {
        let txn = self.db.begin().await?;
        let Some(current) = store::find_grant(&txn, &ctx.scope.to_string(), &ctx.client.key).await? else {
            return Err(GrantError::NotFound("No paused session found"));
        };

        let remaining = current.remaining_at(now);
        if remaining == 0 || current.status == GrantStatus::Ended {
            return end_without_time(txn, &current, now).await;
        }

        let changes = portable_grant::ActiveModel {
            client_mac: Set(ctx.client.mac.clone()),
            client_ip: Set(ctx.client.ip.clone()),
            status: Set(GrantStatus::Active),
            remaining_seconds: Set(remaining),
            active_router_id: Set(Some(ctx.router_id.clone())),
            last_router_id: Set(Some(ctx.router_id.clone())),
            state_changed_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let Some(grant) = store::update_grant_if_unchanged(&txn, &current, changes).await? else {
            txn.rollback().await?;
            return Ok(Attempt::Stale);
        };
        restart_session(&txn, ctx, &grant, remaining, now).await?;
        txn.commit().await?;

        Ok(Attempt::Done(GrantState::of(&grant, remaining, ctx)))
    }
}

/// Writes a top-up decided from `existing`. The write is refused as stale if
/// the grant changed, or was first created, after `existing` was read.
async fn write_top_up(
    txn: DatabaseTransaction,
    ctx: &GrantContext,
    rate: &Rate,
    device_id: Option<String>,
    existing: Option<portable_grant::Model>,
    now: DateTime<Utc>,
) -> Result<Attempt<TopUpReceipt>, GrantError> {
    let scope_id = ctx.scope.to_string();
    let carried = existing.as_ref().map_or(0, |grant| grant.remaining_at(now));
    let remaining_seconds = carried.saturating_add(rate.seconds());

    let changes = portable_grant::ActiveModel {
        client_mac: Set(ctx.client.mac.clone()),
        client_ip: Set(ctx.client.ip.clone()),
        status: Set(GrantStatus::Active),
        remaining_seconds: Set(remaining_seconds),
        active_router_id: Set(Some(ctx.router_id.clone())),
        last_router_id: Set(Some(ctx.router_id.clone())),
        device_id: Set(device_id.clone()),
        download_kbps: Set(rate.download_kbps),
        upload_kbps: Set(rate.upload_kbps),
        download_quota_kb: Set(rate.download_quota_kb),
        upload_quota_kb: Set(rate.upload_quota_kb),
        state_changed_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let written = match existing {
        Some(current) => store::update_grant_if_unchanged(&txn, &current, changes).await?,
        None => {
            let fresh = portable_grant::ActiveModel {
                scope_id: Set(scope_id),
                tenant_id: Set(ctx.scope.tenant_id().map(str::to_string)),
                client_key: Set(ctx.client.key.clone()),
                version: Set(0),
                created_at: Set(now),
                ..changes
            };
            store::insert_grant(&txn, fresh).await?
        }
    };

    let Some(grant) = written else {
        txn.rollback().await?;
        return Ok(Attempt::Stale);
    };

    store::record_sale(&txn, &ctx.router_id, device_id.clone(), rate.amount, None, now).await?;
    restart_session(&txn, ctx, &grant, remaining_seconds, now).await?;
    txn.commit().await?;

    Ok(Attempt::Done(TopUpReceipt {
        amount: rate.amount,
        added_minutes: rate.minutes,
        remaining_seconds,
        grant,
    }))
}

/// Writes a pause decided from `current`, refused as stale if the grant
/// changed since it was read.
async fn write_pause(
    txn: DatabaseTransaction,
    ctx: &GrantContext,
    current: portable_grant::Model,
    now: DateTime<Utc>,
) -> Result<Attempt<GrantState>, GrantError> {
    let remaining = current.remaining_at(now);
    if remaining == 0 || current.status == GrantStatus::Ended {
        return end_without_time(txn, &current, now).await;
    }

    let changes = portable_grant::ActiveModel {
        client_mac: Set(ctx.client.mac.clone()),
        client_ip: Set(ctx.client.ip.clone()),
        status: Set(GrantStatus::Paused),
        remaining_seconds: Set(remaining),
        active_router_id: Set(None),
        last_router_id: Set(Some(ctx.router_id.clone())),
        state_changed_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let Some(grant) = store::update_grant_if_unchanged(&txn, &current, changes).await? else {
        txn.rollback().await?;
        return Ok(Attempt::Stale);
    };
    txn.commit().await?;

    Ok(Attempt::Done(GrantState::of(&grant, remaining, ctx)))
}

/// Persists the ended state of a grant that ran out of time.
async fn expire<C: ConnectionTrait>(
    conn: &C,
    current: &portable_grant::Model,
    now: DateTime<Utc>,
) -> Result<Option<portable_grant::Model>, DbErr> {
    let changes = portable_grant::ActiveModel {
        status: Set(GrantStatus::Ended),
        remaining_seconds: Set(0),
        active_router_id: Set(None),
        state_changed_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    store::update_grant_if_unchanged(conn, current, changes).await
}

/// Records that a grant has no time left and reports it. An already ended
/// grant is left untouched.
async fn end_without_time<T>(
    txn: DatabaseTransaction,
    current: &portable_grant::Model,
    now: DateTime<Utc>,
) -> Result<Attempt<T>, GrantError> {
    if current.status != GrantStatus::Ended && expire(&txn, current, now).await?.is_none() {
        txn.rollback().await?;
        return Ok(Attempt::Stale);
    }
    txn.commit().await?;
    Err(GrantError::NoTimeLeft)
}

/// Replaces the client's open session on the requesting router with one sized
/// to `remaining_seconds`.
async fn restart_session<C: ConnectionTrait>(
    conn: &C,
    ctx: &GrantContext,
    grant: &portable_grant::Model,
    remaining_seconds: i64,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    store::close_client_sessions(
        conn,
        &ctx.router_id,
        ctx.client.ip.as_deref(),
        ctx.client.mac.as_deref(),
        now,
    )
    .await?;

    store::open_session(
        conn,
        NewSession {
            router_id: ctx.router_id.clone(),
            voucher_id: None,
            voucher_code: None,
            client_ip: ctx.client.ip.clone(),
            client_mac: ctx.client.mac.clone(),
            device_id: grant.device_id.clone(),
            download_kbps: grant.download_kbps,
            upload_kbps: grant.upload_kbps,
            started_at: now,
            duration_seconds: remaining_seconds,
        },
    )
    .await?;
    Ok(())
}
