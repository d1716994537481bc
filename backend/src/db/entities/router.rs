use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::RouterStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "routers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub router_id: String,
    pub tenant_id: Option<String>,
    #[sea_orm(indexed)]
    pub license_key: Option<String>,
    pub name: String,
    pub router_api_key_hash: Option<String>,
    pub status: RouterStatus,
    /// Raw rate profile as edited by the owner; sanitized on every read.
    pub profile: Json,
    pub meta: Option<Json>,
    pub created_at: ChronoDateTimeUtc,
    pub last_activated_at: Option<ChronoDateTimeUtc>,
    pub last_seen_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
