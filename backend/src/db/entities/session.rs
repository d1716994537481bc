use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::SessionStatus;

/// Accounting record of one connected stretch of a client on one router.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub router_id: String,
    pub voucher_id: Option<i32>,
    pub voucher_code: Option<String>,
    pub client_ip: Option<String>,
    pub client_mac: Option<String>,
    pub device_id: Option<String>,
    pub minutes_granted: i64,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    pub started_at: ChronoDateTimeUtc,
    pub expires_at: ChronoDateTimeUtc,
    pub ended_at: Option<ChronoDateTimeUtc>,
    pub status: SessionStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
