use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientInfo, loose_string};
use crate::db::services::minutes_for_seconds;
use crate::services::client_identity::ClientIdentity;
use crate::services::grant_manager::{GrantState, TopUpReceipt};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub minutes: Option<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub client: Option<ClientInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantDetails {
    pub minutes: i64,
    pub remaining_seconds: i64,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    #[serde(rename = "downloadQuotaKB")]
    pub download_quota_kb: i64,
    #[serde(rename = "uploadQuotaKB")]
    pub upload_quota_kb: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpResponse {
    pub ok: bool,
    pub method: &'static str,
    pub amount: f64,
    pub added_minutes: i64,
    pub grant: GrantDetails,
}

impl From<TopUpReceipt> for TopUpResponse {
    fn from(receipt: TopUpReceipt) -> Self {
        Self {
            ok: true,
            method: "portable_grant",
            amount: receipt.amount,
            added_minutes: receipt.added_minutes,
            grant: GrantDetails {
                minutes: minutes_for_seconds(receipt.remaining_seconds),
                remaining_seconds: receipt.remaining_seconds,
                download_kbps: receipt.grant.download_kbps,
                upload_kbps: receipt.grant.upload_kbps,
                download_quota_kb: receipt.grant.download_quota_kb,
                upload_quota_kb: receipt.grant.upload_quota_kb,
            },
        }
    }
}

/// Body of `POST /grants/state`, `/grants/pause` and `/grants/resume`.
#[derive(Debug, Default, Deserialize)]
pub struct GrantClientRequest {
    #[serde(default)]
    pub client: Option<ClientInfo>,
}

/// Query of `GET /grants/state`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantStateQuery {
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub client_mac: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
}

impl From<GrantStateQuery> for ClientInfo {
    fn from(query: GrantStateQuery) -> Self {
        ClientInfo {
            ip: query.client_ip.or(query.ip),
            mac: query.client_mac.or(query.mac),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantStateResponse {
    pub ok: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected_with_time: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_kbps: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_kbps: Option<i32>,
    pub client_ip: Option<String>,
    pub client_mac: Option<String>,
}

impl GrantStateResponse {
    pub fn new(state: GrantState, client: &ClientIdentity) -> Self {
        let (snapshot, connected, paused, roaming) = match state {
            GrantState::Disconnected => {
                return Self {
                    ok: true,
                    connected: false,
                    paused: None,
                    disconnected_with_time: None,
                    minutes_left: None,
                    remaining_seconds: None,
                    download_kbps: None,
                    upload_kbps: None,
                    client_ip: client.ip.clone(),
                    client_mac: client.mac.clone(),
                };
            }
            GrantState::Connected(s) => (s, true, None, None),
            GrantState::Paused(s) => (s, false, Some(true), None),
            GrantState::DisconnectedWithTime(s) => (s, false, None, Some(true)),
        };

        Self {
            ok: true,
            connected,
            paused,
            disconnected_with_time: roaming,
            minutes_left: Some(snapshot.remaining_seconds / 60),
            remaining_seconds: Some(snapshot.remaining_seconds),
            download_kbps: Some(snapshot.download_kbps),
            upload_kbps: Some(snapshot.upload_kbps),
            client_ip: snapshot.client_ip,
            client_mac: snapshot.client_mac,
        }
    }
}
