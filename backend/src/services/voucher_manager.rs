use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sea_orm::{DatabaseConnection, DbErr, Set, TransactionTrait};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::entities::{router, session, voucher};
use crate::db::enums::VoucherStatus;
use crate::db::services::{self as store, NewSession};
use crate::services::rate_card::Rate;

const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODE_ATTEMPTS: usize = 8;
const VOUCHER_VALIDITY_HOURS: i64 = 12;
const POOL_VOUCHER_VALIDITY_HOURS: i64 = 24;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const MAX_BATCH_SIZE: usize = 20;
/// Device id recorded on pool vouchers when the router names none.
pub const POOL_DEVICE_ID: &str = "pool";

#[derive(Error, Debug)]
pub enum VoucherError {
    #[error("Voucher code is required")]
    MissingCode,
    #[error("Voucher not found")]
    NotFound,
    #[error("Voucher already redeemed")]
    AlreadyRedeemed,
    #[error("Voucher expired")]
    Expired,
    #[error("Failed to generate unique voucher code")]
    CodeSpaceExhausted,
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

#[derive(Debug, Clone)]
pub struct Redemption {
    pub voucher: voucher::Model,
    pub session: session::Model,
}

fn random_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

#[derive(Clone, Debug)]
pub struct VoucherManager {
    db: Arc<DatabaseConnection>,
}

impl VoucherManager {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Issues an unused voucher for `rate`, valid for twelve hours.
    pub async fn create(
        &self,
        router: &router::Model,
        rate: &Rate,
        code_length: usize,
        device_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<voucher::Model, VoucherError> {
        let expires_at = now + Duration::hours(VOUCHER_VALIDITY_HOURS);
        let created = self.issue(router, rate, code_length, device_id, now, expires_at).await?;
        info!(router_id = %router.router_id, minutes = created.minutes, "Voucher created.");
        Ok(created)
    }

    /// Issues `count` vouchers (clamped to `1..=MAX_BATCH_SIZE`) that a router
    /// keeps in its offline pool. They stay valid for a day.
    pub async fn create_batch(
        &self,
        router: &router::Model,
        rate: &Rate,
        count: usize,
        code_length: usize,
        device_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<voucher::Model>, VoucherError> {
        let count = count.clamp(1, MAX_BATCH_SIZE);
        let device_id = device_id.unwrap_or_else(|| POOL_DEVICE_ID.to_string());
        let expires_at = now + Duration::hours(POOL_VOUCHER_VALIDITY_HOURS);

        let mut vouchers = Vec::with_capacity(count);
        for _ in 0..count {
            let created = self
                .issue(router, rate, code_length, Some(device_id.clone()), now, expires_at)
                .await?;
            vouchers.push(created);
        }
        info!(router_id = %router.router_id, count, minutes = rate.minutes, "Pool vouchers created.");
        Ok(vouchers)
    }

    async fn issue(
        &self,
        router: &router::Model,
        rate: &Rate,
        code_length: usize,
        device_id: Option<String>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<voucher::Model, VoucherError> {
        for _ in 0..CODE_ATTEMPTS {
            let candidate = voucher::ActiveModel {
                router_id: Set(router.router_id.clone()),
                tenant_id: Set(router.tenant_id.clone()),
                code: Set(random_code(code_length)),
                minutes: Set(rate.minutes),
                amount: Set(rate.amount),
                download_kbps: Set(rate.download_kbps),
                upload_kbps: Set(rate.upload_kbps),
                download_quota_kb: Set(rate.download_quota_kb),
                upload_quota_kb: Set(rate.upload_quota_kb),
                device_id: Set(device_id.clone()),
                status: Set(VoucherStatus::Unused),
                expires_at: Set(expires_at),
                redeemed_at: Set(None),
                redeemed_router_id: Set(None),
                redeemed_client_ip: Set(None),
                redeemed_client_mac: Set(None),
                created_at: Set(now),
                ..Default::default()
            };

            if let Some(created) = store::insert_voucher(self.db.as_ref(), candidate).await? {
                return Ok(created);
            }
        }

        warn!(router_id = %router.router_id, code_length, "Voucher code space exhausted.");
        Err(VoucherError::CodeSpaceExhausted)
    }

    /// Redeems a voucher on `router` and opens the client's session. The
    /// unused to redeemed transition is a single conditional update, so a code
    /// is redeemed at most once.
    pub async fn redeem(
        &self,
        router: &router::Model,
        code: &str,
        client_ip: Option<String>,
        client_mac: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Redemption, VoucherError> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(VoucherError::MissingCode);
        }
        let tenant_id = router.tenant_id.as_deref();

        let txn = self.db.begin().await?;
        let redeemed = store::redeem_voucher(
            &txn,
            &code,
            &router.router_id,
            tenant_id,
            client_ip.clone(),
            client_mac.clone(),
            now,
        )
        .await?;

        let Some(voucher) = redeemed else {
            txn.rollback().await?;
            return Err(self.classify_unredeemable(&code, router, now).await?);
        };

        let session = store::open_session(
            &txn,
            NewSession {
                router_id: router.router_id.clone(),
                voucher_id: Some(voucher.id),
                voucher_code: Some(voucher.code.clone()),
                client_ip,
                client_mac,
                device_id: voucher.device_id.clone(),
                download_kbps: voucher.download_kbps,
                upload_kbps: voucher.upload_kbps,
                started_at: now,
                duration_seconds: voucher.minutes.saturating_mul(60),
            },
        )
        .await?;
        txn.commit().await?;

        info!(router_id = %router.router_id, code = %voucher.code, "Voucher redeemed.");
        Ok(Redemption { voucher, session })
    }

    async fn classify_unredeemable(
        &self,
        code: &str,
        router: &router::Model,
        now: DateTime<Utc>,
    ) -> Result<VoucherError, DbErr> {
        let existing =
            store::find_visible_voucher(self.db.as_ref(), code, &router.router_id, router.tenant_id.as_deref())
                .await?;
        Ok(match existing {
            None => VoucherError::NotFound,
            Some(v) if v.status == VoucherStatus::Redeemed => VoucherError::AlreadyRedeemed,
            Some(v) if v.expires_at <= now => VoucherError::Expired,
            Some(_) => VoucherError::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::{RouterStatus, SessionStatus};
    use crate::db::test_support::memory_db;
    use crate::services::rate_card::RouterProfile;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn router(router_id: &str, tenant_id: Option<&str>) -> router::Model {
        router::Model {
            id: 0,
            router_id: router_id.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            license_key: Some("LIC".to_string()),
            name: router_id.to_string(),
            router_api_key_hash: None,
            status: RouterStatus::Active,
            profile: serde_json::json!({}),
            meta: None,
            created_at: t0(),
            last_activated_at: None,
            last_seen_at: None,
        }
    }

    fn rate() -> Rate {
        RouterProfile::default().rates[1].clone()
    }

    #[test]
    fn test_random_code_uses_alphabet() {
        let code = random_code(12);
        assert_eq!(code.len(), 12);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn test_create_then_redeem_once() {
        let manager = VoucherManager::new(Arc::new(memory_db().await));
        let r1 = router("R1", None);

        let created = manager.create(&r1, &rate(), 8, None, t0()).await.unwrap();
        assert_eq!(created.code.len(), 8);
        assert_eq!(created.minutes, 35);
        assert_eq!(created.expires_at, t0() + Duration::hours(12));

        let code = created.code.to_lowercase();
        let redemption = manager
            .redeem(&r1, &code, Some("10.0.0.9".into()), None, t0() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(redemption.voucher.status, VoucherStatus::Redeemed);
        assert_eq!(redemption.session.status, SessionStatus::Active);
        assert_eq!(redemption.session.minutes_granted, 35);

        let again = manager.redeem(&r1, &created.code, None, None, t0() + Duration::minutes(6)).await;
        assert!(matches!(again, Err(VoucherError::AlreadyRedeemed)));
    }

    #[tokio::test]
    async fn test_redeem_scope_and_expiry() {
        let manager = VoucherManager::new(Arc::new(memory_db().await));
        let r1 = router("R1", Some("T1"));
        let r2_same_tenant = router("R2", Some("T1"));
        let r3_alone = router("R3", None);

        let first = manager.create(&r1, &rate(), 8, None, t0()).await.unwrap();
        let second = manager.create(&r1, &rate(), 8, None, t0()).await.unwrap();

        assert!(matches!(
            manager.redeem(&r3_alone, &first.code, None, None, t0()).await,
            Err(VoucherError::NotFound)
        ));
        manager.redeem(&r2_same_tenant, &first.code, None, None, t0()).await.unwrap();

        let late = t0() + Duration::hours(13);
        assert!(matches!(
            manager.redeem(&r1, &second.code, None, None, late).await,
            Err(VoucherError::Expired)
        ));
        assert!(matches!(manager.redeem(&r1, "  ", None, None, t0()).await, Err(VoucherError::MissingCode)));
    }

    #[tokio::test]
    async fn test_batch_creates_pool_vouchers() {
        let manager = VoucherManager::new(Arc::new(memory_db().await));
        let owner = router("R1", Some("T1"));

        let pool = manager.create_batch(&owner, &rate(), 3, 6, None, t0()).await.unwrap();
        assert_eq!(pool.len(), 3);
        for v in &pool {
            assert_eq!(v.code.len(), 6);
            assert_eq!(v.device_id.as_deref(), Some(POOL_DEVICE_ID));
            assert_eq!(v.expires_at, t0() + Duration::hours(24));
            assert_eq!(v.status, VoucherStatus::Unused);
        }
        assert_ne!(pool[0].code, pool[1].code);
    }

    #[tokio::test]
    async fn test_batch_size_is_clamped() {
        let manager = VoucherManager::new(Arc::new(memory_db().await));
        let owner = router("R1", None);

        let pool = manager.create_batch(&owner, &rate(), 50, 8, Some("esp-1".into()), t0()).await.unwrap();
        assert_eq!(pool.len(), MAX_BATCH_SIZE);
        assert_eq!(pool[0].device_id.as_deref(), Some("esp-1"));

        let pool = manager.create_batch(&owner, &rate(), 0, 8, None, t0()).await.unwrap();
        assert_eq!(pool.len(), 1);
    }
}
