use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::db::entities::router;

pub mod activation_models;
pub mod grant_models;
pub mod router_models;
pub mod voucher_models;

/// The router a request was authenticated as, passed as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedRouter(pub router::Model);

/// Client details as routers report them. Either field may be missing or malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientInfo {
    #[serde(default, deserialize_with = "loose_string")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mac: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Accepts strings, numbers and booleans as text. Empty strings, `null` and
/// structured values read as absent.
pub fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_info_is_lenient() {
        let client: ClientInfo = serde_json::from_value(serde_json::json!({ "ip": "", "mac": 42 })).unwrap();
        assert_eq!(client.ip, None);
        assert_eq!(client.mac.as_deref(), Some("42"));

        let client: ClientInfo = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(client.ip.is_none() && client.mac.is_none());
    }
}
