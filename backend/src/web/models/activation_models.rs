use serde::{Deserialize, Serialize};

use super::loose_string;
use crate::services::activation::{Activation, ActivationRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindCodeQuery {
    #[serde(default)]
    pub router_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindCodeResponse {
    pub ok: bool,
    pub router_id: String,
    pub bind_code: String,
    pub display_code: String,
    pub expires_in_seconds: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub router_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub router_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub bind_code: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub license_key: Option<String>,
}

impl From<ActivateRequest> for ActivationRequest {
    fn from(body: ActivateRequest) -> Self {
        ActivationRequest {
            router_name: body.router_name.unwrap_or_default(),
            router_id: body.router_id.unwrap_or_default(),
            bind_code: body.bind_code.unwrap_or_default(),
            license_key: body.license_key.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    pub ok: bool,
    pub router_id: String,
    pub router_api_key: String,
    pub rotated: bool,
}

impl From<Activation> for ActivateResponse {
    fn from(activation: Activation) -> Self {
        Self {
            ok: true,
            router_id: activation.router_id,
            router_api_key: activation.router_api_key,
            rotated: activation.rotated,
        }
    }
}
