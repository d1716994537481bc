use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};

use crate::db::entities::portable_grant;

// --- Portable Grant Store Functions ---

/// Fetches the grant for a `(scope, client)` pair.
pub async fn find_grant<C: ConnectionTrait>(
    conn: &C,
    scope_id: &str,
    client_key: &str,
) -> Result<Option<portable_grant::Model>, DbErr> {
    portable_grant::Entity::find()
        .filter(portable_grant::Column::ScopeId.eq(scope_id))
        .filter(portable_grant::Column::ClientKey.eq(client_key))
        .one(conn)
        .await
}

/// Inserts a first grant for a `(scope, client)` pair.
///
/// Returns `Ok(None)` when another writer created the row first (unique key
/// violation). On Postgres the surrounding transaction is unusable afterwards
/// and must be rolled back before retrying.
pub async fn insert_grant<C: ConnectionTrait>(
    conn: &C,
    grant: portable_grant::ActiveModel,
) -> Result<Option<portable_grant::Model>, DbErr> {
    match grant.insert(conn).await {
        Ok(model) => Ok(Some(model)),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Applies `changes` only if the row still carries the version `current` was
/// read at, bumping the version. Returns the fresh row, or `Ok(None)` when a
/// concurrent writer got there first.
pub async fn update_grant_if_unchanged<C: ConnectionTrait>(
    conn: &C,
    current: &portable_grant::Model,
    mut changes: portable_grant::ActiveModel,
) -> Result<Option<portable_grant::Model>, DbErr> {
    changes.version = Set(current.version + 1);

    let result = portable_grant::Entity::update_many()
        .set(changes)
        .filter(portable_grant::Column::Id.eq(current.id))
        .filter(portable_grant::Column::Version.eq(current.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(None);
    }

    portable_grant::Entity::find_by_id(current.id).one(conn).await
}
