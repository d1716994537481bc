//! Time-windowed bind codes.
//!
//! A router that has no credential yet proves possession during activation by
//! presenting the 6-digit code the cloud shows for its id. The code is an
//! HMAC-SHA256 of `"<router_id>:<window>"` truncated to six decimal digits,
//! where `window = floor(unix_seconds / window_seconds)`.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::server::config::ServerConfig;

type HmacSha256 = Hmac<Sha256>;

const CODE_DIGITS: usize = 6;
const CODE_MODULUS: u32 = 1_000_000;

#[derive(Clone)]
pub struct BindCodeService {
    mac: HmacSha256,
    window_seconds: i64,
    drift_windows: i64,
}

impl fmt::Debug for BindCodeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindCodeService")
            .field("mac", &"<redacted>")
            .field("window_seconds", &self.window_seconds)
            .field("drift_windows", &self.drift_windows)
            .finish()
    }
}

impl BindCodeService {
    /// `window_seconds` of zero is treated as one second.
    pub fn new(secret: &[u8], window_seconds: u64, drift_windows: u32) -> Self {
        // HMAC accepts keys of any length; the fallback is never taken in practice.
        let mac = HmacSha256::new_from_slice(secret)
            .unwrap_or_else(|_| HmacSha256::new(&Default::default()));
        Self {
            mac,
            window_seconds: i64::try_from(window_seconds.max(1)).unwrap_or(i64::MAX),
            drift_windows: i64::from(drift_windows),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.bind_master_secret.as_bytes(),
            config.bind_window_seconds,
            config.bind_drift_windows,
        )
    }

    pub fn window_seconds(&self) -> i64 {
        self.window_seconds
    }

    pub fn window_at(&self, unix_seconds: i64) -> i64 {
        unix_seconds.div_euclid(self.window_seconds)
    }

    /// The code of `router_id` for an absolute window number.
    pub fn code_for_window(&self, router_id: &str, window: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{router_id}:{window}").as_bytes());
        let digest = mac.finalize().into_bytes();

        let tail: [u8; 4] = [digest[28], digest[29], digest[30], digest[31]];
        let value = u32::from_be_bytes(tail) % CODE_MODULUS;
        format!("{value:0width$}", width = CODE_DIGITS)
    }

    pub fn code_at(&self, router_id: &str, unix_seconds: i64) -> String {
        self.code_for_window(router_id, self.window_at(unix_seconds))
    }

    pub fn current_code(&self, router_id: &str) -> String {
        self.code_at(router_id, Utc::now().timestamp())
    }

    /// Checks `candidate` against every window within the drift tolerance.
    /// Short numeric candidates are left-padded, so `"63311"` matches
    /// `"063311"`. Any failure is a plain `false`.
    pub fn verify_at(&self, router_id: &str, candidate: &str, unix_seconds: i64) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() || candidate.len() > CODE_DIGITS {
            return false;
        }
        let padded = format!("{candidate:0>width$}", width = CODE_DIGITS);

        let current = self.window_at(unix_seconds);
        let mut matched = false;
        for window in (current - self.drift_windows)..=(current + self.drift_windows) {
            let expected = self.code_for_window(router_id, window);
            // Every window is checked so timing does not reveal which one matched.
            matched |= bool::from(expected.as_bytes().ct_eq(padded.as_bytes()));
        }
        matched
    }

    pub fn verify(&self, router_id: &str, candidate: &str) -> bool {
        self.verify_at(router_id, candidate, Utc::now().timestamp())
    }

    /// Seconds until the code shown at `now` is replaced by the next window's.
    pub fn seconds_until_rotation(&self, now: DateTime<Utc>) -> i64 {
        let unix = now.timestamp();
        self.window_seconds - unix.rem_euclid(self.window_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Window 29_000_000 at 60 s windows starts at this instant.
    const WINDOW_START: i64 = 1_740_000_000;

    fn service() -> BindCodeService {
        BindCodeService::new(b"test-secret", 60, 1)
    }

    #[test]
    fn test_known_codes() {
        let codes = service();
        assert_eq!(codes.code_for_window("ROUTER-A", 29_000_000), "198491");
        assert_eq!(codes.code_for_window("ROUTER-A", 29_000_001), "910640");
        assert_eq!(codes.code_for_window("ROUTER-B", 29_000_000), "906320");
        assert_eq!(codes.code_at("ROUTER-A", WINDOW_START + 59), "198491");
    }

    #[test]
    fn test_codes_are_zero_padded() {
        let codes = service();
        let code = codes.code_for_window("ROUTER-A", 29_000_004);
        assert_eq!(code, "063311");
        assert!(codes.verify_at("ROUTER-A", "63311", (29_000_004) * 60));
        assert!(codes.verify_at("ROUTER-A", " 063311 ", (29_000_004) * 60));
    }

    #[test]
    fn test_empty_secret_still_produces_codes() {
        let codes = BindCodeService::new(b"", 60, 1);
        assert_eq!(codes.code_for_window("ROUTER-A", 29_000_000), "519236");
    }

    #[test]
    fn test_verify_accepts_drift_windows() {
        let codes = service();
        let code = codes.code_at("ROUTER-A", WINDOW_START);

        assert!(codes.verify_at("ROUTER-A", &code, WINDOW_START));
        assert!(codes.verify_at("ROUTER-A", &code, WINDOW_START + 60));
        assert!(codes.verify_at("ROUTER-A", &code, WINDOW_START + 119));
        assert!(codes.verify_at("ROUTER-A", &code, WINDOW_START - 60));

        assert!(!codes.verify_at("ROUTER-A", &code, WINDOW_START + 120));
        assert!(!codes.verify_at("ROUTER-A", &code, WINDOW_START - 61));
    }

    #[test]
    fn test_verify_rejects_wrong_router_and_garbage() {
        let codes = service();
        let code = codes.code_at("ROUTER-A", WINDOW_START);

        assert!(!codes.verify_at("ROUTER-B", &code, WINDOW_START));
        assert!(!codes.verify_at("ROUTER-A", "", WINDOW_START));
        assert!(!codes.verify_at("ROUTER-A", "1984910", WINDOW_START));
        assert!(!codes.verify_at("ROUTER-A", "abcdef", WINDOW_START));
    }

    #[test]
    fn test_zero_drift_only_accepts_current_window() {
        let codes = BindCodeService::new(b"test-secret", 60, 0);
        assert!(codes.verify_at("ROUTER-A", "198491", WINDOW_START + 30));
        assert!(!codes.verify_at("ROUTER-A", "198491", WINDOW_START + 60));
    }

    #[test]
    fn test_seconds_until_rotation() {
        let codes = service();
        let at = |unix| DateTime::<Utc>::from_timestamp(unix, 0).unwrap();
        assert_eq!(codes.seconds_until_rotation(at(WINDOW_START)), 60);
        assert_eq!(codes.seconds_until_rotation(at(WINDOW_START + 45)), 15);
        assert_eq!(codes.seconds_until_rotation(at(WINDOW_START + 59)), 1);
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", service());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("test-secret"));
    }
}
