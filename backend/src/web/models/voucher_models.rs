use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientInfo, loose_string};
use crate::db::entities::voucher;
use crate::db::enums::VoucherStatus;
use crate::services::voucher_manager::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherCreateRequest {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub minutes: Option<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    pub device_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherBatchRequest {
    #[serde(default)]
    pub count: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    pub device_id: Option<String>,
}

impl VoucherBatchRequest {
    /// Requested pool size. Missing, zero and unreadable counts fall back to
    /// the default; fractions round up.
    pub fn batch_size(&self) -> usize {
        let requested = match &self.count {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite() && *n != 0.0);

        match requested {
            None => DEFAULT_BATCH_SIZE,
            Some(n) if n < 1.0 => 1,
            Some(n) => (n.ceil() as usize).min(MAX_BATCH_SIZE),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolVoucher {
    pub code: String,
    pub minutes: i64,
    pub amount: f64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct VoucherBatchResponse {
    pub ok: bool,
    pub vouchers: Vec<PoolVoucher>,
}

impl From<Vec<voucher::Model>> for VoucherBatchResponse {
    fn from(vouchers: Vec<voucher::Model>) -> Self {
        Self {
            ok: true,
            vouchers: vouchers
                .into_iter()
                .map(|v| PoolVoucher {
                    code: v.code,
                    minutes: v.minutes,
                    amount: v.amount,
                    expires_at: v.expires_at,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherSummary {
    pub code: String,
    pub minutes: i64,
    pub amount: f64,
    pub expires_at: DateTime<Utc>,
    pub status: VoucherStatus,
}

impl From<&voucher::Model> for VoucherSummary {
    fn from(v: &voucher::Model) -> Self {
        Self {
            code: v.code.clone(),
            minutes: v.minutes,
            amount: v.amount,
            expires_at: v.expires_at,
            status: v.status,
        }
    }
}

/// The summary is repeated at the top level for older router scripts.
#[derive(Debug, Serialize)]
pub struct VoucherCreateResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub summary: VoucherSummary,
    pub voucher: VoucherSummary,
}

impl From<voucher::Model> for VoucherCreateResponse {
    fn from(v: voucher::Model) -> Self {
        let summary = VoucherSummary::from(&v);
        Self {
            ok: true,
            summary: summary.clone(),
            voucher: summary,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VoucherRedeemRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub client: Option<ClientInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherGrant {
    pub minutes: i64,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    #[serde(rename = "downloadQuotaKB")]
    pub download_quota_kb: i64,
    #[serde(rename = "uploadQuotaKB")]
    pub upload_quota_kb: i64,
}

#[derive(Debug, Serialize)]
pub struct RedeemedVoucher {
    pub code: String,
    pub status: VoucherStatus,
}

#[derive(Debug, Serialize)]
pub struct VoucherRedeemResponse {
    pub ok: bool,
    pub grant: VoucherGrant,
    pub voucher: RedeemedVoucher,
}

impl From<voucher::Model> for VoucherRedeemResponse {
    fn from(v: voucher::Model) -> Self {
        Self {
            ok: true,
            grant: VoucherGrant {
                minutes: v.minutes,
                download_kbps: v.download_kbps,
                upload_kbps: v.upload_kbps,
                download_quota_kb: v.download_quota_kb,
                upload_quota_kb: v.upload_quota_kb,
            },
            voucher: RedeemedVoucher {
                code: v.code,
                status: v.status,
            },
        }
    }
}
