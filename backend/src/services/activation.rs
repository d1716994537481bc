//! Router activation handshake.
//!
//! An unauthenticated router proves possession with the current bind code and
//! presents a license key; in return it gets a fresh API key. Re-activating a
//! known router rotates its key. Only the SHA-256 of a key is stored, and the
//! plaintext is returned exactly once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::entities::router;
use crate::db::services as store;
use crate::services::bind_code::BindCodeService;
use crate::services::credentials::{generate_router_api_key, hash_api_key};

#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Invalid bind code")]
    InvalidBindCode,
    #[error("License not found")]
    LicenseNotFound,
    #[error("License inactive")]
    LicenseInactive,
    #[error("License expired")]
    LicenseExpired,
    #[error("License mismatch")]
    LicenseMismatch,
    #[error("No seats available")]
    NoSeatsAvailable,
    #[error("Activation cooldown")]
    Cooldown { retry_after_seconds: u64 },
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

#[derive(Debug, Clone, Default)]
pub struct ActivationRequest {
    pub router_name: String,
    pub router_id: String,
    pub bind_code: String,
    pub license_key: String,
}

#[derive(Debug, Clone)]
pub struct Activation {
    pub router_id: String,
    pub router_api_key: String,
    /// `true` when an existing router got a new key.
    pub rotated: bool,
}

#[derive(Clone, Debug)]
pub struct ActivationService {
    db: Arc<DatabaseConnection>,
    bind_codes: Arc<BindCodeService>,
    cooldown: Duration,
}

/// Whole seconds, rounded up, until `cooldown` has passed since `last_activated_at`.
pub fn retry_after_seconds(
    last_activated_at: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> u64 {
    let Some(last) = last_activated_at else {
        return 0;
    };
    if cooldown <= Duration::zero() {
        return 0;
    }
    let remaining_ms = (last + cooldown - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    (remaining_ms as u64).div_ceil(1000)
}

impl ActivationService {
    pub fn new(db: Arc<DatabaseConnection>, bind_codes: Arc<BindCodeService>, cooldown_seconds: u64) -> Self {
        Self {
            db,
            bind_codes,
            cooldown: Duration::seconds(i64::try_from(cooldown_seconds).unwrap_or(i64::MAX / 1000)),
        }
    }

    fn cooldown_seconds(&self) -> u64 {
        u64::try_from(self.cooldown.num_seconds()).unwrap_or(0)
    }

    pub async fn activate(
        &self,
        request: ActivationRequest,
        now: DateTime<Utc>,
    ) -> Result<Activation, ActivationError> {
        let router_id = request.router_id.trim();
        let router_name = request.router_name.trim();
        let bind_code = request.bind_code.trim();
        let license_key = request.license_key.trim();
        if router_id.is_empty() || router_name.is_empty() || bind_code.is_empty() || license_key.is_empty() {
            return Err(ActivationError::MissingFields);
        }

        if !self.bind_codes.verify_at(router_id, bind_code, now.timestamp()) {
            warn!(router_id, "Activation rejected: invalid bind code.");
            return Err(ActivationError::InvalidBindCode);
        }

        let db = self.db.as_ref();
        let license = store::find_license(db, license_key)
            .await?
            .ok_or(ActivationError::LicenseNotFound)?;
        if !license.is_active {
            return Err(ActivationError::LicenseInactive);
        }
        if license.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(ActivationError::LicenseExpired);
        }

        if let Some(existing) = store::find_router(db, router_id).await? {
            return self.rotate(existing, license_key, now).await;
        }

        let used = store::count_routers_for_license(db, &license.key).await?;
        if used >= u64::try_from(license.seats_routers.max(0)).unwrap_or(0) {
            return Err(ActivationError::NoSeatsAvailable);
        }

        let router_api_key = generate_router_api_key();
        let created = store::create_activated_router(
            db,
            router_id,
            router_name,
            &license.key,
            license.assigned_tenant_id.clone(),
            hash_api_key(&router_api_key),
            now,
        )
        .await?;

        let Some(created) = created else {
            // Someone activated the same router a moment ago.
            return Err(ActivationError::Cooldown {
                retry_after_seconds: self.cooldown_seconds().max(1),
            });
        };

        info!(router_id = %created.router_id, license = %license.key, "Router activated.");
        Ok(Activation {
            router_id: created.router_id,
            router_api_key,
            rotated: false,
        })
    }

    async fn rotate(
        &self,
        existing: router::Model,
        license_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Activation, ActivationError> {
        if existing.license_key.as_deref() != Some(license_key) {
            return Err(ActivationError::LicenseMismatch);
        }

        let retry_after_seconds = retry_after_seconds(existing.last_activated_at, self.cooldown, now);
        if retry_after_seconds > 0 {
            return Err(ActivationError::Cooldown { retry_after_seconds });
        }

        let router_api_key = generate_router_api_key();
        let rotated =
            store::rotate_credential_if_unchanged(self.db.as_ref(), &existing, hash_api_key(&router_api_key), now)
                .await?;
        if !rotated {
            return Err(ActivationError::Cooldown {
                retry_after_seconds: self.cooldown_seconds().max(1),
            });
        }

        info!(router_id = %existing.router_id, "Router credential rotated.");
        Ok(Activation {
            router_id: existing.router_id,
            router_api_key,
            rotated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::license;
    use crate::db::test_support::memory_db;
    use crate::services::credentials::verify_api_key;
    use sea_orm::{ActiveModelTrait, Set};

    const SECRET: &[u8] = b"activation-secret";

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_750_000_020, 0).unwrap()
    }

    async fn seed_license(
        db: &DatabaseConnection,
        key: &str,
        seats: i32,
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
    ) {
        license::ActiveModel {
            key: Set(key.to_string()),
            seats_routers: Set(seats),
            is_active: Set(is_active),
            assigned_tenant_id: Set(Some("T1".to_string())),
            assigned_at: Set(None),
            expires_at: Set(expires_at),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    async fn service() -> (ActivationService, Arc<BindCodeService>) {
        let db = Arc::new(memory_db().await);
        seed_license(&db, "LIC-1", 1, true, None).await;
        seed_license(&db, "LIC-OFF", 5, false, None).await;
        seed_license(&db, "LIC-OLD", 5, true, Some(t0() - Duration::days(1))).await;
        let codes = Arc::new(BindCodeService::new(SECRET, 60, 1));
        (ActivationService::new(db, codes.clone(), 30), codes)
    }

    fn request(codes: &BindCodeService, router_id: &str, license_key: &str, now: DateTime<Utc>) -> ActivationRequest {
        ActivationRequest {
            router_name: "Lobby".to_string(),
            router_id: router_id.to_string(),
            bind_code: codes.code_at(router_id, now.timestamp()),
            license_key: license_key.to_string(),
        }
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let cooldown = Duration::seconds(30);
        assert_eq!(retry_after_seconds(None, cooldown, t0()), 0);
        assert_eq!(retry_after_seconds(Some(t0()), cooldown, t0()), 30);
        assert_eq!(
            retry_after_seconds(Some(t0()), cooldown, t0() + Duration::milliseconds(10_500)),
            20
        );
        assert_eq!(retry_after_seconds(Some(t0()), cooldown, t0() + Duration::seconds(30)), 0);
        assert_eq!(retry_after_seconds(Some(t0()), Duration::zero(), t0()), 0);
    }

    #[tokio::test]
    async fn test_first_activation_creates_router() {
        let (service, codes) = service().await;
        let activation = service.activate(request(&codes, "R1", "LIC-1", t0()), t0()).await.unwrap();
        assert_eq!(activation.router_id, "R1");
        assert!(!activation.rotated);

        let stored = store::find_router(service.db.as_ref(), "R1").await.unwrap().unwrap();
        assert_eq!(stored.tenant_id.as_deref(), Some("T1"));
        assert_eq!(stored.license_key.as_deref(), Some("LIC-1"));
        let hash = stored.router_api_key_hash.unwrap();
        assert_ne!(hash, activation.router_api_key);
        assert!(verify_api_key(&activation.router_api_key, &hash));
    }

    #[tokio::test]
    async fn test_reactivation_respects_cooldown_then_rotates() {
        let (service, codes) = service().await;
        let first = service.activate(request(&codes, "R1", "LIC-1", t0()), t0()).await.unwrap();

        let soon = t0() + Duration::seconds(10);
        let err = service.activate(request(&codes, "R1", "LIC-1", soon), soon).await.unwrap_err();
        assert!(matches!(err, ActivationError::Cooldown { retry_after_seconds: 20 }));

        let later = t0() + Duration::seconds(31);
        let second = service.activate(request(&codes, "R1", "LIC-1", later), later).await.unwrap();
        assert!(second.rotated);
        assert_ne!(first.router_api_key, second.router_api_key);

        let stored = store::find_router(service.db.as_ref(), "R1").await.unwrap().unwrap();
        let hash = stored.router_api_key_hash.unwrap();
        assert!(verify_api_key(&second.router_api_key, &hash));
        assert!(!verify_api_key(&first.router_api_key, &hash));
    }

    #[tokio::test]
    async fn test_rejections() {
        let (service, codes) = service().await;

        let mut bad_code = request(&codes, "R1", "LIC-1", t0());
        bad_code.bind_code = codes.code_at("R1", t0().timestamp() + 600);
        assert!(matches!(
            service.activate(bad_code, t0()).await,
            Err(ActivationError::InvalidBindCode)
        ));

        let mut missing = request(&codes, "R1", "LIC-1", t0());
        missing.router_name = "  ".to_string();
        assert!(matches!(service.activate(missing, t0()).await, Err(ActivationError::MissingFields)));

        assert!(matches!(
            service.activate(request(&codes, "R1", "NOPE", t0()), t0()).await,
            Err(ActivationError::LicenseNotFound)
        ));
        assert!(matches!(
            service.activate(request(&codes, "R1", "LIC-OFF", t0()), t0()).await,
            Err(ActivationError::LicenseInactive)
        ));
        assert!(matches!(
            service.activate(request(&codes, "R1", "LIC-OLD", t0()), t0()).await,
            Err(ActivationError::LicenseExpired)
        ));
    }

    #[tokio::test]
    async fn test_seats_and_license_binding() {
        let (service, codes) = service().await;
        service.activate(request(&codes, "R1", "LIC-1", t0()), t0()).await.unwrap();

        // LIC-1 has a single seat.
        assert!(matches!(
            service.activate(request(&codes, "R2", "LIC-1", t0()), t0()).await,
            Err(ActivationError::NoSeatsAvailable)
        ));

        // R1 is bound to LIC-1; LIC-OLD is rejected earlier, so use a second valid license.
        seed_license(service.db.as_ref(), "LIC-2", 3, true, None).await;
        let later = t0() + Duration::seconds(60);
        assert!(matches!(
            service.activate(request(&codes, "R1", "LIC-2", later), later).await,
            Err(ActivationError::LicenseMismatch)
        ));
    }
}
