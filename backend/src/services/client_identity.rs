use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Client MAC or IP is required")]
    Missing,
}

/// Normalizes a MAC address to `AA:BB:CC:DD:EE:FF`.
///
/// Separators (`:`, `-`, `.`) and whitespace are ignored, so Cisco-style
/// `aabb.ccdd.eeff` is accepted. Anything that is not exactly twelve hex
/// digits afterwards yields `None`.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let pairs: Vec<&str> = (0..12).step_by(2).map(|i| &digits[i..i + 2]).collect();
    Some(pairs.join(":"))
}

/// Who a grant belongs to within a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// `mac:<MAC>` when a valid MAC was given, else `ip:<ip>`.
    pub key: String,
    pub mac: Option<String>,
    pub ip: Option<String>,
}

impl ClientIdentity {
    pub fn resolve(ip: Option<&str>, mac: Option<&str>) -> Result<Self, IdentityError> {
        let mac = mac.and_then(normalize_mac);
        let ip = ip
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);

        let key = match (&mac, &ip) {
            (Some(mac), _) => format!("mac:{mac}"),
            (None, Some(ip)) => format!("ip:{ip}"),
            (None, None) => return Err(IdentityError::Missing),
        };

        Ok(Self { key, mac, ip })
    }
}

/// The namespace grants are portable within: every router of a tenant, or a
/// single router when it belongs to no tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantScope {
    Tenant(String),
    Router(String),
}

impl GrantScope {
    pub fn for_router(router_id: &str, tenant_id: Option<&str>) -> Self {
        match tenant_id.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tenant_id) => GrantScope::Tenant(tenant_id.to_string()),
            None => GrantScope::Router(router_id.to_string()),
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            GrantScope::Tenant(tenant_id) => Some(tenant_id),
            GrantScope::Router(_) => None,
        }
    }
}

impl fmt::Display for GrantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantScope::Tenant(tenant_id) => write!(f, "tenant:{tenant_id}"),
            GrantScope::Router(router_id) => write!(f, "router:{router_id}"),
        }
    }
}
