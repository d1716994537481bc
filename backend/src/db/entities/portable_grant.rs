use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::GrantStatus;

/// A client's balance of connectable seconds within one scope.
///
/// `remaining_seconds` is exact only at `state_changed_at`; while `status` is
/// `Active` the elapsed wall-clock time since then has to be subtracted on read.
/// `version` is bumped by every write and used as the precondition of
/// conditional updates. `(scope_id, client_key)` is unique (see `db::schema`).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "portable_grants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub scope_id: String,
    pub tenant_id: Option<String>,
    pub client_key: String,
    pub client_mac: Option<String>,
    pub client_ip: Option<String>,
    pub status: GrantStatus,
    pub remaining_seconds: i64,
    pub active_router_id: Option<String>,
    pub last_router_id: Option<String>,
    pub device_id: Option<String>,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    pub download_quota_kb: i64,
    pub upload_quota_kb: i64,
    pub state_changed_at: ChronoDateTimeUtc,
    pub version: i64,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
