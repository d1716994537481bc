use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};

use crate::db::entities::license;

/// Retrieves a license by its key.
pub async fn find_license<C: ConnectionTrait>(
    conn: &C,
    key: &str,
) -> Result<Option<license::Model>, DbErr> {
    license::Entity::find()
        .filter(license::Column::Key.eq(key))
        .one(conn)
        .await
}
