use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::VoucherStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vouchers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub router_id: String,
    pub tenant_id: Option<String>,
    pub code: String,
    pub minutes: i64,
    pub amount: f64,
    pub download_kbps: i32,
    pub upload_kbps: i32,
    pub download_quota_kb: i64,
    pub upload_quota_kb: i64,
    pub device_id: Option<String>,
    pub status: VoucherStatus,
    pub expires_at: ChronoDateTimeUtc,
    pub redeemed_at: Option<ChronoDateTimeUtc>,
    pub redeemed_router_id: Option<String>,
    pub redeemed_client_ip: Option<String>,
    pub redeemed_client_mac: Option<String>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
