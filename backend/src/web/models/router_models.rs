use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::loose_string;
use crate::db::entities::router;
use crate::db::enums::RouterStatus;
use crate::services::rate_card::{RouterProfile, positive_number};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub uptime_sec: Option<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    pub fw_version: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub wan_ip: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub lan_ip: Option<String>,
}

/// Telemetry stored on the router row by the latest heartbeat.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterMeta {
    pub uptime_sec: Option<f64>,
    pub fw_version: Option<String>,
    pub wan_ip: Option<String>,
    pub lan_ip: Option<String>,
}

impl From<HeartbeatRequest> for RouterMeta {
    fn from(body: HeartbeatRequest) -> Self {
        let uptime_sec = match body.uptime_sec {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite());

        Self {
            uptime_sec,
            fw_version: body.fw_version,
            wan_ip: body.wan_ip,
            lan_ip: body.lan_ip,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub ok: bool,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleEventRequest {
    #[serde(default)]
    pub amount: Option<Value>,
    /// RFC 3339 text or epoch milliseconds.
    #[serde(default)]
    pub ts: Option<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub voucher_code: Option<String>,
}

/// When a sale happened. Missing, empty and zero values mean `now`; anything
/// else must be RFC 3339 text or epoch milliseconds.
pub fn sale_timestamp(ts: Option<&Value>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match ts {
        None | Some(Value::Null) => Some(now),
        Some(Value::String(raw)) if raw.trim().is_empty() => Some(now),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Some(Value::Number(n)) => {
            let millis = n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                    .map(|f| f.trunc() as i64)
            })?;
            if millis == 0 {
                return Some(now);
            }
            DateTime::from_timestamp_millis(millis)
        }
        Some(_) => None,
    }
}

/// Offline sales uploaded in bulk. Malformed items are skipped, not rejected.
#[derive(Debug, Default, Deserialize)]
pub struct SalesSyncRequest {
    #[serde(default)]
    pub items: Option<Value>,
}

/// One uploaded sale that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedSale {
    pub amount: f64,
    pub ts: DateTime<Utc>,
    pub device_id: Option<String>,
    pub voucher_code: Option<String>,
}

impl SyncedSale {
    pub fn parse(item: &Value, now: DateTime<Utc>) -> Option<Self> {
        let amount = positive_number(item.get("amount"))?;
        let ts = sale_timestamp(item.get("ts"), now)?;
        let text = |key: &str| match item.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Some(Self {
            amount,
            ts,
            device_id: text("deviceId"),
            voucher_code: text("voucherCode"),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SalesSyncResponse {
    pub ok: bool,
    pub synced: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub client_ip: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub client_mac: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub voucher_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionEndResponse {
    pub ok: bool,
    pub ended: u64,
}

/// Whether a router may serve clients, as shown on its local status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterState {
    NoLicense,
    Inactive,
    Active,
}

impl RouterState {
    pub fn of(router: &router::Model) -> Self {
        let licensed = router
            .license_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !licensed {
            return RouterState::NoLicense;
        }
        match router.status {
            RouterStatus::Active => RouterState::Active,
            RouterStatus::Disabled | RouterStatus::Revoked => RouterState::Inactive,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStateResponse {
    pub ok: bool,
    pub router_id: String,
    pub router_name: String,
    pub status: RouterStatus,
    pub state: RouterState,
    pub license_key: Option<String>,
    pub tenant_id: Option<String>,
}

impl From<&router::Model> for RouterStateResponse {
    fn from(router: &router::Model) -> Self {
        Self {
            ok: true,
            router_id: router.router_id.clone(),
            router_name: router.name.clone(),
            status: router.status,
            state: RouterState::of(router),
            license_key: router.license_key.clone(),
            tenant_id: router.tenant_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfigResponse {
    pub ok: bool,
    pub router_id: String,
    pub status: RouterStatus,
    pub license_key: Option<String>,
    pub profile: RouterProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub db: &'static str,
    pub uptime_sec: u64,
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router(license_key: Option<&str>, status: RouterStatus) -> router::Model {
        router::Model {
            id: 1,
            router_id: "R1".to_string(),
            tenant_id: None,
            license_key: license_key.map(str::to_string),
            name: "Lobby".to_string(),
            router_api_key_hash: None,
            status,
            profile: serde_json::json!({}),
            meta: None,
            created_at: Utc::now(),
            last_activated_at: None,
            last_seen_at: None,
        }
    }

    #[test]
    fn test_router_state() {
        assert_eq!(RouterState::of(&router(None, RouterStatus::Active)), RouterState::NoLicense);
        assert_eq!(RouterState::of(&router(Some(" "), RouterStatus::Active)), RouterState::NoLicense);
        assert_eq!(RouterState::of(&router(Some("LIC"), RouterStatus::Revoked)), RouterState::Inactive);
        assert_eq!(RouterState::of(&router(Some("LIC"), RouterStatus::Active)), RouterState::Active);
        assert_eq!(
            serde_json::to_value(RouterState::NoLicense).unwrap(),
            serde_json::json!("no_license")
        );
    }

    #[test]
    fn test_sale_timestamp_formats() {
        let now = DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap();
        let expected = DateTime::<Utc>::from_timestamp(1_767_323_045, 0).unwrap();

        assert_eq!(sale_timestamp(None, now), Some(now));
        assert_eq!(sale_timestamp(Some(&json!("")), now), Some(now));
        assert_eq!(sale_timestamp(Some(&json!(0)), now), Some(now));
        assert_eq!(sale_timestamp(Some(&json!("2026-01-02T03:04:05Z")), now), Some(expected));
        assert_eq!(sale_timestamp(Some(&json!(1_767_323_045_000_i64)), now), Some(expected));
        assert_eq!(sale_timestamp(Some(&json!(1_767_323_045_000.0)), now), Some(expected));
        assert_eq!(sale_timestamp(Some(&json!("yesterday")), now), None);
        assert_eq!(sale_timestamp(Some(&json!(true)), now), None);
    }

    #[test]
    fn test_synced_sale_skips_bad_items() {
        let now = DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap();

        let sale = SyncedSale::parse(&json!({ "amount": "5", "voucherCode": "ABCD2345", "deviceId": 7 }), now).unwrap();
        assert_eq!(sale.amount, 5.0);
        assert_eq!(sale.ts, now);
        assert_eq!(sale.device_id.as_deref(), Some("7"));
        assert_eq!(sale.voucher_code.as_deref(), Some("ABCD2345"));

        assert_eq!(SyncedSale::parse(&json!({ "amount": -1 }), now), None);
        assert_eq!(SyncedSale::parse(&json!({ "amount": 5, "ts": "nope" }), now), None);
        assert_eq!(SyncedSale::parse(&json!("5"), now), None);
    }
}
