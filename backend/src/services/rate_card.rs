//! Router selling profile: what a router charges and how it shapes clients.
//!
//! Profiles are stored as free-form JSON edited by owners, so every read goes
//! through [`RouterProfile::sanitize`], which never fails and falls back to
//! defaults field by field.

use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_DOWNLOAD_KBPS: i32 = 10_000;
pub const DEFAULT_UPLOAD_KBPS: i32 = 10_000;
pub const DEFAULT_VOUCHER_LENGTH: usize = 8;
pub const MIN_VOUCHER_LENGTH: usize = 4;
pub const DEFAULT_MAX_CREATE_PER_MINUTE: u32 = 60;
pub const DEFAULT_MAX_REDEEM_PER_MINUTE: u32 = 120;

const DEFAULT_RATES: [(f64, i64); 3] = [(5.0, 15), (10.0, 35), (20.0, 90)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SellingMode {
    Vendo,
    Voucher,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    pub amount: f64,
    pub minutes: i64,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    #[serde(rename = "downloadQuotaKB")]
    pub download_quota_kb: i64,
    #[serde(rename = "uploadQuotaKB")]
    pub upload_quota_kb: i64,
}

impl Rate {
    fn with_defaults(amount: f64, minutes: i64) -> Self {
        Self {
            amount,
            minutes,
            download_kbps: DEFAULT_DOWNLOAD_KBPS,
            upload_kbps: DEFAULT_UPLOAD_KBPS,
            download_quota_kb: 0,
            upload_quota_kb: 0,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.minutes.saturating_mul(60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub max_create_per_minute: u32,
    pub max_redeem_per_minute: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedCalibration {
    pub download_percent: u32,
    pub upload_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterProfile {
    pub mode: SellingMode,
    pub currency: String,
    pub timezone: String,
    pub voucher_length: usize,
    pub rates: Vec<Rate>,
    pub speed_calibration: SpeedCalibration,
    pub limits: Limits,
}

impl Default for RouterProfile {
    fn default() -> Self {
        Self::sanitize(&Value::Null)
    }
}

/// A positive, finite number, given either as a JSON number or numeric string.
pub fn positive_number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (parsed.is_finite() && parsed > 0.0).then_some(parsed)
}

fn positive_integer(value: Option<&Value>) -> Option<u64> {
    value?.as_u64().filter(|n| *n > 0)
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn percent(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(p) if p.is_finite() => p.round().clamp(50.0, 150.0) as u32,
        _ => 100,
    }
}

fn sanitize_rate(raw: &Value) -> Option<Rate> {
    let amount = positive_number(raw.get("amount"))?;
    let minutes = positive_number(raw.get("minutes"))?;
    // Whole minutes only; fractional rates are dropped.
    if minutes.fract() != 0.0 || minutes > i64::MAX as f64 {
        return None;
    }

    let kbps = |key: &str, fallback: i32| {
        positive_number(raw.get(key))
            .map(|v| v.min(i32::MAX as f64) as i32)
            .filter(|v| *v > 0)
            .unwrap_or(fallback)
    };
    let quota = |key: &str| {
        raw.get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.min(i64::MAX as f64) as i64)
            .unwrap_or(0)
    };

    Some(Rate {
        amount,
        minutes: minutes as i64,
        download_kbps: kbps("downloadKbps", DEFAULT_DOWNLOAD_KBPS),
        upload_kbps: kbps("uploadKbps", DEFAULT_UPLOAD_KBPS),
        download_quota_kb: quota("downloadQuotaKB"),
        upload_quota_kb: quota("uploadQuotaKB"),
    })
}

impl RouterProfile {
    pub fn sanitize(raw: &Value) -> Self {
        let mode = match raw.get("mode").and_then(Value::as_str) {
            Some("vendo") => SellingMode::Vendo,
            Some("voucher") => SellingMode::Voucher,
            _ => SellingMode::Hybrid,
        };

        let voucher_length = raw
            .get("voucherLength")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n >= MIN_VOUCHER_LENGTH)
            .unwrap_or(DEFAULT_VOUCHER_LENGTH);

        let mut rates: Vec<Rate> = raw
            .get("rates")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(sanitize_rate).collect())
            .unwrap_or_default();
        if rates.is_empty() {
            rates = DEFAULT_RATES
                .iter()
                .map(|(amount, minutes)| Rate::with_defaults(*amount, *minutes))
                .collect();
        }

        let limits = raw.get("limits");
        let limit = |key: &str, fallback: u32| {
            positive_integer(limits.and_then(|l| l.get(key)))
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(fallback)
        };

        let calibration = raw.get("speedCalibration");

        Self {
            mode,
            currency: non_empty_string(raw.get("currency")).unwrap_or_else(|| "PHP".to_string()),
            timezone: non_empty_string(raw.get("timezone"))
                .unwrap_or_else(|| "Asia/Manila".to_string()),
            voucher_length,
            rates,
            speed_calibration: SpeedCalibration {
                download_percent: percent(calibration.and_then(|c| c.get("downloadPercent"))),
                upload_percent: percent(calibration.and_then(|c| c.get("uploadPercent"))),
            },
            limits: Limits {
                max_create_per_minute: limit("maxCreatePerMinute", DEFAULT_MAX_CREATE_PER_MINUTE),
                max_redeem_per_minute: limit("maxRedeemPerMinute", DEFAULT_MAX_REDEEM_PER_MINUTE),
            },
        }
    }

    /// Finds the rate a purchase refers to.
    ///
    /// With both `amount` and `minutes` the rate must match both; with one of
    /// them the first rate matching it wins. Non-positive inputs count as
    /// absent.
    pub fn resolve_rate(&self, amount: Option<f64>, minutes: Option<f64>) -> Option<&Rate> {
        let amount = amount.filter(|a| a.is_finite() && *a > 0.0);
        let minutes = minutes.filter(|m| m.is_finite() && *m > 0.0);

        match (amount, minutes) {
            (Some(a), Some(m)) => self
                .rates
                .iter()
                .find(|rate| rate.amount == a && rate.minutes as f64 == m),
            (Some(a), None) => self.rates.iter().find(|rate| rate.amount == a),
            (None, Some(m)) => self.rates.iter().find(|rate| rate.minutes as f64 == m),
            (None, None) => None,
        }
    }

    /// Rate for a batch of pool vouchers: the rate priced at `amount`, else
    /// the first rate on the card.
    pub fn batch_rate(&self, amount: Option<f64>) -> Option<&Rate> {
        amount
            .and_then(|a| self.rates.iter().find(|rate| rate.amount == a))
            .or_else(|| self.rates.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_profile_uses_defaults() {
        let profile = RouterProfile::sanitize(&json!({}));
        assert_eq!(profile.mode, SellingMode::Hybrid);
        assert_eq!(profile.currency, "PHP");
        assert_eq!(profile.timezone, "Asia/Manila");
        assert_eq!(profile.voucher_length, 8);
        assert_eq!(profile.limits.max_create_per_minute, 60);
        assert_eq!(profile.limits.max_redeem_per_minute, 120);
        assert_eq!(profile.speed_calibration.download_percent, 100);

        let minutes: Vec<i64> = profile.rates.iter().map(|r| r.minutes).collect();
        assert_eq!(minutes, vec![15, 35, 90]);
        assert!(profile.rates.iter().all(|r| r.download_kbps == DEFAULT_DOWNLOAD_KBPS));
    }

    #[test]
    fn test_invalid_rates_are_dropped() {
        let profile = RouterProfile::sanitize(&json!({
            "rates": [
                { "amount": 0, "minutes": 10 },
                { "amount": 1, "minutes": 1.5 },
                { "amount": "3", "minutes": 5, "downloadKbps": 2048, "downloadQuotaKB": -4 },
                { "minutes": 60 }
            ]
        }));
        assert_eq!(profile.rates.len(), 1);
        let rate = &profile.rates[0];
        assert_eq!(rate.amount, 3.0);
        assert_eq!(rate.minutes, 5);
        assert_eq!(rate.download_kbps, 2048);
        assert_eq!(rate.upload_kbps, DEFAULT_UPLOAD_KBPS);
        assert_eq!(rate.download_quota_kb, 0);
    }

    #[test]
    fn test_out_of_range_fields_fall_back() {
        let profile = RouterProfile::sanitize(&json!({
            "mode": "arcade",
            "voucherLength": 3,
            "currency": "",
            "limits": { "maxCreatePerMinute": 0, "maxRedeemPerMinute": 7 },
            "speedCalibration": { "downloadPercent": 10, "uploadPercent": 420 }
        }));
        assert_eq!(profile.mode, SellingMode::Hybrid);
        assert_eq!(profile.voucher_length, 8);
        assert_eq!(profile.currency, "PHP");
        assert_eq!(profile.limits.max_create_per_minute, 60);
        assert_eq!(profile.limits.max_redeem_per_minute, 7);
        assert_eq!(profile.speed_calibration.download_percent, 50);
        assert_eq!(profile.speed_calibration.upload_percent, 150);
    }

    #[test]
    fn test_resolve_rate() {
        let profile = RouterProfile::default();

        assert_eq!(profile.resolve_rate(Some(10.0), None).map(|r| r.minutes), Some(35));
        assert_eq!(profile.resolve_rate(None, Some(90.0)).map(|r| r.amount), Some(20.0));
        assert_eq!(profile.resolve_rate(Some(5.0), Some(15.0)).map(|r| r.minutes), Some(15));

        assert!(profile.resolve_rate(Some(5.0), Some(35.0)).is_none());
        assert!(profile.resolve_rate(Some(7.0), None).is_none());
        assert!(profile.resolve_rate(Some(-5.0), None).is_none());
        assert!(profile.resolve_rate(None, None).is_none());
    }

    #[test]
    fn test_batch_rate_falls_back_to_first() {
        let profile = RouterProfile::default();
        assert_eq!(profile.batch_rate(Some(10.0)).map(|r| r.minutes), Some(35));
        assert_eq!(profile.batch_rate(Some(7.0)).map(|r| r.minutes), Some(15));
        assert_eq!(profile.batch_rate(None).map(|r| r.minutes), Some(15));
    }

    #[test]
    fn test_profile_serializes_in_camel_case() {
        let value = serde_json::to_value(RouterProfile::default()).unwrap();
        assert_eq!(value["voucherLength"], 8);
        assert_eq!(value["rates"][0]["downloadQuotaKB"], 0);
        assert_eq!(value["limits"]["maxRedeemPerMinute"], 120);
        assert_eq!(value["mode"], "hybrid");
    }
}
